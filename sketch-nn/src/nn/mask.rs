//! Helpers for the `[batch, len]` point masks carried next to padded sketches.
//! A mask entry is `1.0` for a real point and `0.0` for padding.

use burn::tensor::{backend::Backend, Bool, Tensor};

/// Added to padded positions before a max so they never win.
pub const PAD_FILL: f32 = 1.0e4;

/// `true` where the point is padding (the layout attention masks expect).
pub fn padding_mask<B: Backend>(mask: Tensor<B, 2>) -> Tensor<B, 2, Bool> {
    mask.lower_elem(0.5)
}

/// Zeroes padded positions of a channel-first tensor `[batch, channels, len]`.
pub fn mask_channels<B: Backend>(x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
    let [batch, len] = mask.dims();
    x * mask.reshape([batch, 1, len])
}

/// Zeroes padded positions of a channel-last tensor `[batch, len, channels]`.
pub fn mask_features<B: Backend>(x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
    let [batch, len] = mask.dims();
    x * mask.reshape([batch, len, 1])
}

/// Pushes padded positions of `[batch, channels, len]` far below any real value.
pub fn fill_padding_low<B: Backend>(x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
    let [batch, len] = mask.dims();
    x + (mask.reshape([batch, 1, len]) - 1.0) * PAD_FILL
}
