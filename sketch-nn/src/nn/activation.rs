use burn::{
    config::Config,
    module::{ConstantRecord, Module},
    nn::ReLU,
    tensor::{backend::Backend, Tensor},
};
use derive_new::new;

macro_rules! impl_activation {
    ($name:ident, $fn:expr) => {
        #[derive(Debug, Module, Clone, Copy, new)]
        pub struct $name;

        impl $name {
            pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
                $fn(x)
            }
        }
    };
}

impl_activation!(Gelu, burn::tensor::activation::gelu);

macro_rules! impl_activation_config {
    ($config_name:ident, $activation:ident) => {
        #[derive(Debug, Config)]
        pub struct $config_name {}

        impl $config_name {
            pub fn init(&self) -> $activation {
                $activation::new()
            }

            pub fn init_with(&self, _record: ConstantRecord) -> $activation {
                $activation::new()
            }
        }
    };
}

impl_activation_config!(ReLUConfig, ReLU);
impl_activation_config!(GeluConfig, Gelu);
