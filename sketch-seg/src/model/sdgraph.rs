//! Stroke–dot graph U-Net.
//!
//! Every block keeps two views of a sketch: dots (points, convolved along their
//! stroke) and strokes (max-pooled from their dots, convolved across
//! neighbouring strokes). The stroke view is broadcast back onto its dots and
//! fused. The encoder halves the dots per stroke twice; the decoder restores
//! them with skip connections.

use burn::{
    config::Config,
    module::Module,
    nn::conv::Conv1d,
    tensor::{activation::log_softmax, backend::Backend, Tensor},
};
use sketch_nn::{
    conv_1d,
    nn::{mask_channels, masked_downsample_max, masked_group_max, repeat_interleave, Gelu, GeluConfig},
};

use super::SegmentationModel;
use crate::data::{N_STK, POINT_CHANNELS};

/// Dots are pooled in pairs at each encoder level.
const POOL: usize = 2;

#[derive(Debug, Module)]
pub struct SdBlock<B: Backend> {
    dot_conv: Conv1d<B>,
    stroke_conv: Conv1d<B>,
    fuse: Conv1d<B>,
    act: Gelu,
}

#[derive(Config)]
pub struct SdBlockConfig {
    pub c_in: usize,
    pub c_out: usize,
}

impl SdBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SdBlock<B> {
        SdBlock {
            dot_conv: conv_1d!(self.c_in, self.c_out, kernel_size = 3, padding = 1).init(device),
            stroke_conv: conv_1d!(self.c_out, self.c_out, kernel_size = 3, padding = 1).init(device),
            fuse: conv_1d!(2 * self.c_out, self.c_out, kernel_size = 1).init(device),
            act: GeluConfig::new().init(),
        }
    }
}

impl<B: Backend> SdBlock<B> {
    /// `x [b, c_in, len]`, `mask [b, len]`, dots stored stroke after stroke.
    pub fn forward(&self, x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let [_, len] = mask.dims();

        let dots = self.act.forward(per_stroke(&self.dot_conv, x));
        let dots = mask_channels(dots, mask.clone());

        let (strokes, stroke_mask) = masked_group_max(dots.clone(), mask.clone(), N_STK);
        let strokes = self.act.forward(self.stroke_conv.forward(strokes));
        let strokes = repeat_interleave(mask_channels(strokes, stroke_mask), len / N_STK);

        let x = self.fuse.forward(Tensor::cat(vec![dots, strokes], 1));
        mask_channels(self.act.forward(x), mask)
    }
}

/// Runs `conv` on every stroke separately so kernels never span two strokes.
fn per_stroke<B: Backend>(conv: &Conv1d<B>, x: Tensor<B, 3>) -> Tensor<B, 3> {
    let [batch, channels, len] = x.dims();
    let n = len / N_STK;
    let x = x
        .reshape([batch, channels, N_STK, n])
        .swap_dims(1, 2)
        .reshape([batch * N_STK, channels, n]);
    let x = conv.forward(x);
    let channels = x.dims()[1];
    x.reshape([batch, N_STK, channels, n])
        .swap_dims(1, 2)
        .reshape([batch, channels, len])
}

#[derive(Debug, Module)]
pub struct SdGraph<B: Backend> {
    enc_0: SdBlock<B>,
    enc_1: SdBlock<B>,
    bottleneck: SdBlock<B>,
    dec_1: SdBlock<B>,
    dec_0: SdBlock<B>,
    head: Conv1d<B>,
}

#[derive(Config)]
pub struct SdGraphConfig {
    pub n_classes: usize,
    #[config(default = "POINT_CHANNELS")]
    pub channels_in: usize,
    #[config(default = 32)]
    pub width: usize,
}

impl SdGraphConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SdGraph<B> {
        let w = self.width;
        SdGraph {
            enc_0: SdBlockConfig::new(self.channels_in, w).init(device),
            enc_1: SdBlockConfig::new(w, 2 * w).init(device),
            bottleneck: SdBlockConfig::new(2 * w, 4 * w).init(device),
            dec_1: SdBlockConfig::new(4 * w + 2 * w, 2 * w).init(device),
            dec_0: SdBlockConfig::new(2 * w + w, w).init(device),
            head: conv_1d!(w, self.n_classes, kernel_size = 1).init(device),
        }
    }
}

impl<B: Backend> SegmentationModel<B> for SdGraph<B> {
    fn forward_seg(&self, points: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let x = mask_channels(points.swap_dims(1, 2), mask.clone());

        let d0 = self.enc_0.forward(x, mask.clone());
        let (x, mask_1) = masked_downsample_max(d0.clone(), mask.clone(), POOL);
        let d1 = self.enc_1.forward(x, mask_1.clone());
        let (x, mask_2) = masked_downsample_max(d1.clone(), mask_1.clone(), POOL);
        let x = self.bottleneck.forward(x, mask_2);

        let x = Tensor::cat(vec![repeat_interleave(x, POOL), d1], 1);
        let x = self.dec_1.forward(x, mask_1);
        let x = Tensor::cat(vec![repeat_interleave(x, POOL), d0], 1);
        let x = self.dec_0.forward(x, mask);

        log_softmax(self.head.forward(x), 1)
    }
}
