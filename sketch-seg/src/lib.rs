pub mod config;
pub mod data;
pub mod logging;
pub mod model;
pub mod schedule;
pub mod training;
pub mod utils;

use burn::backend::Autodiff;

#[cfg(feature = "tch")]
pub type TrainBackend = burn::backend::LibTorch<f32>;
#[cfg(not(feature = "tch"))]
pub type TrainBackend = burn::backend::NdArray<f32>;

pub type TrainAutodiffBackend = Autodiff<TrainBackend>;

#[cfg(feature = "tch")]
pub fn train_device() -> burn::backend::libtorch::LibTorchDevice {
    burn::backend::libtorch::LibTorchDevice::Cuda(0)
}

#[cfg(not(feature = "tch"))]
pub fn train_device() -> burn::backend::ndarray::NdArrayDevice {
    burn::backend::ndarray::NdArrayDevice::Cpu
}
