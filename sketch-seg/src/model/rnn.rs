use burn::{
    config::Config,
    module::Module,
    nn::{
        lstm::{Lstm, LstmConfig},
        Linear, LinearConfig,
    },
    tensor::{backend::Backend, Data, Int, Tensor},
};
use itertools::Itertools;
use sketch_nn::nn::mask_features;

use super::{to_log_probs, SegHead, SegHeadConfig, SegmentationModel};
use crate::data::POINT_CHANNELS;

/// Bidirectional LSTM over the flat point stream.
#[derive(Debug, Module)]
pub struct SketchRnn<B: Backend> {
    embed: Linear<B>,
    lstm_fwd: Lstm<B>,
    lstm_bwd: Lstm<B>,
    head: SegHead<B>,
}

#[derive(Config)]
pub struct SketchRnnConfig {
    pub n_classes: usize,
    #[config(default = 64)]
    pub d_embed: usize,
    #[config(default = 128)]
    pub d_hidden: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl SketchRnnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SketchRnn<B> {
        SketchRnn {
            embed: LinearConfig::new(POINT_CHANNELS, self.d_embed).init(device),
            lstm_fwd: LstmConfig::new(self.d_embed, self.d_hidden, true).init(device),
            lstm_bwd: LstmConfig::new(self.d_embed, self.d_hidden, true).init(device),
            head: SegHeadConfig::new(2 * self.d_hidden, self.n_classes)
                .with_dropout(self.dropout)
                .init(device),
        }
    }
}

/// Reverses the sequence axis of `[b, seq, d]`.
fn reverse_seq<B: Backend>(x: Tensor<B, 3>) -> Tensor<B, 3> {
    let seq = x.dims()[1];
    let indices = Data::<i64, 1>::new((0..seq as i64).rev().collect_vec(), [seq].into());
    let indices = Tensor::<B, 1, Int>::from_data(indices.convert::<B::IntElem>(), &x.device());
    x.select(1, indices)
}

impl<B: Backend> SegmentationModel<B> for SketchRnn<B> {
    fn forward_seg(&self, points: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let x = self.embed.forward(mask_features(points, mask));

        let (_, fwd) = self.lstm_fwd.forward(x.clone(), None);
        let (_, bwd) = self.lstm_bwd.forward(reverse_seq(x), None);
        let x = Tensor::cat(vec![fwd, reverse_seq(bwd)], 2);

        to_log_probs(self.head.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_seq_flips_points() {
        type B = burn::backend::NdArray;
        let device = burn::backend::ndarray::NdArrayDevice::Cpu;

        let x = Tensor::<B, 3>::from_data(
            Data::<f32, 3>::from([[[1.0f32, 10.0], [2.0, 20.0], [3.0, 30.0]]]).convert::<f32>(),
            &device,
        );
        let out = reverse_seq(x).into_data().convert::<f32>().value;
        assert_eq!(out, vec![3.0, 30.0, 2.0, 20.0, 1.0, 10.0]);
    }
}
