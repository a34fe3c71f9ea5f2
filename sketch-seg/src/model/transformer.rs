use burn::{
    config::Config,
    module::Module,
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig,
        PositionalEncoding, PositionalEncodingConfig, ReLU,
    },
    tensor::{backend::Backend, Bool, Tensor},
};
use sketch_nn::nn::{mask_features, padding_mask, ReLUConfig};

use super::{to_log_probs, SegHead, SegHeadConfig, SegmentationModel};
use crate::data::{N_PNT, POINT_CHANNELS};

#[derive(Debug, Module)]
pub struct EncoderBlockLinear<B: Backend> {
    linear_i: Linear<B>,
    dropout: Dropout,
    relu: ReLU,
    linear_o: Linear<B>,
}

impl<B: Backend> EncoderBlockLinear<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let s = self;
        sketch_nn::pipe!(x, s.linear_i, s.dropout, s.relu, s.linear_o)
    }
}

/// Post-norm self-attention block; padded points are hidden from attention.
#[derive(Debug, Module)]
pub struct EncoderBlock<B: Backend> {
    attn: MultiHeadAttention<B>,
    linear: EncoderBlockLinear<B>,
    norm_1: LayerNorm<B>,
    norm_2: LayerNorm<B>,
    dropout: Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn = self
            .attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(pad))
            .context;
        let attn = self.dropout.forward(attn);
        let x = x + attn;
        let x = self.norm_1.forward(x);

        let linear_out = self.linear.forward(x.clone());
        let x = x + self.dropout.forward(linear_out);
        self.norm_2.forward(x)
    }
}

#[derive(Config)]
pub struct EncoderBlockConfig {
    pub d_model: usize,
    pub d_ff: usize,
    pub n_heads: usize,
    pub dropout: f64,
}

impl EncoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        EncoderBlock {
            attn: MultiHeadAttentionConfig::new(self.d_model, self.n_heads)
                .with_dropout(self.dropout)
                .init(device),
            linear: EncoderBlockLinear {
                linear_i: LinearConfig::new(self.d_model, self.d_ff).init(device),
                dropout: DropoutConfig::new(self.dropout).init(),
                relu: ReLUConfig::new().init(),
                linear_o: LinearConfig::new(self.d_ff, self.d_model).init(device),
            },
            norm_1: LayerNormConfig::new(self.d_model).init(device),
            norm_2: LayerNormConfig::new(self.d_model).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Debug, Module)]
pub struct SketchTransformer<B: Backend> {
    input: Linear<B>,
    pos: PositionalEncoding<B>,
    dropout: Dropout,
    blocks: Vec<EncoderBlock<B>>,
    head: SegHead<B>,
}

#[derive(Config)]
pub struct SketchTransformerConfig {
    pub n_classes: usize,
    #[config(default = 64)]
    pub d_model: usize,
    #[config(default = 4)]
    pub n_heads: usize,
    #[config(default = 3)]
    pub n_layers: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl SketchTransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SketchTransformer<B> {
        let block = EncoderBlockConfig::new(self.d_model, 2 * self.d_model, self.n_heads, self.dropout);
        SketchTransformer {
            input: LinearConfig::new(POINT_CHANNELS, self.d_model).init(device),
            pos: PositionalEncodingConfig::new(self.d_model)
                .with_max_sequence_size(N_PNT)
                .init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            blocks: (0..self.n_layers).map(|_| block.init(device)).collect(),
            head: SegHeadConfig::new(self.d_model, self.n_classes)
                .with_dropout(self.dropout)
                .init(device),
        }
    }
}

impl<B: Backend> SegmentationModel<B> for SketchTransformer<B> {
    fn forward_seg(&self, points: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let pad = padding_mask(mask.clone());

        let x = self.input.forward(mask_features(points, mask));
        let x = self.dropout.forward(self.pos.forward(x));
        let x = self
            .blocks
            .iter()
            .fold(x, |x, block| block.forward(x, pad.clone()));

        to_log_probs(self.head.forward(x))
    }
}
