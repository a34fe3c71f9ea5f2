//! Pooling and upsampling along the point axis of `[batch, channels, len]`
//! tensors whose points are stored stroke after stroke.

use burn::tensor::{backend::Backend, Tensor};

use crate::nn::mask::fill_padding_low;

/// Max over consecutive windows of `factor` points: `[b, c, l] -> [b, c, l / factor]`.
///
/// When every stroke holds a multiple of `factor` points the windows never
/// straddle two strokes.
pub fn downsample_max<B: Backend>(x: Tensor<B, 3>, factor: usize) -> Tensor<B, 3> {
    let [batch, channels, len] = x.dims();
    x.reshape([batch, channels, len / factor, factor])
        .max_dim(3)
        .reshape([batch, channels, len / factor])
}

/// Like [`downsample_max`] but ignores padding, and downsamples the mask along.
pub fn masked_downsample_max<B: Backend>(
    x: Tensor<B, 3>,
    mask: Tensor<B, 2>,
    factor: usize,
) -> (Tensor<B, 3>, Tensor<B, 2>) {
    let [batch, len] = mask.dims();
    let mask_out = downsample_max(mask.clone().reshape([batch, 1, len]), factor)
        .reshape([batch, len / factor]);
    let x = downsample_max(fill_padding_low(x, mask), factor);
    (crate::nn::mask_channels(x, mask_out.clone()), mask_out)
}

/// Repeats every position `factor` times: `[b, c, l] -> [b, c, l * factor]`.
pub fn repeat_interleave<B: Backend>(x: Tensor<B, 3>, factor: usize) -> Tensor<B, 3> {
    let [batch, channels, len] = x.dims();
    x.reshape([batch, channels, len, 1])
        .repeat(3, factor)
        .reshape([batch, channels, len * factor])
}

/// Max over each of `groups` equally sized groups, ignoring padding.
///
/// Returns the pooled features `[b, c, groups]` and a `[b, groups]` mask that is
/// `1.0` for every group holding at least one real point.
pub fn masked_group_max<B: Backend>(
    x: Tensor<B, 3>,
    mask: Tensor<B, 2>,
    groups: usize,
) -> (Tensor<B, 3>, Tensor<B, 2>) {
    let [_, len] = mask.dims();
    masked_downsample_max(x, mask, len / groups)
}
