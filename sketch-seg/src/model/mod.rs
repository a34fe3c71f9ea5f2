use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig, ReLU},
    tensor::{activation::log_softmax, backend::Backend, ElementConversion, Int, Tensor},
};
use sketch_nn::nn::ReLUConfig;

pub use self::{rnn::*, sdgraph::*, transformer::*};

pub mod rnn;
pub mod sdgraph;
pub mod transformer;

/// A network labelling every point of a padded sketch batch.
pub trait SegmentationModel<B: Backend>: Module<B> {
    /// `points [b, p, 3]` and `mask [b, p]` to log-probabilities `[b, classes, p]`.
    fn forward_seg(&self, points: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3>;
}

/// Channel-last classifier shared by the sequence models.
#[derive(Debug, Module)]
pub struct SegHead<B: Backend> {
    linear_i: Linear<B>,
    norm: LayerNorm<B>,
    relu: ReLU,
    dropout: Dropout,
    linear_o: Linear<B>,
}

impl<B: Backend> SegHead<B> {
    /// `[b, p, d_model] -> [b, p, n_classes]` logits.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let s = self;
        sketch_nn::pipe!(x, s.linear_i, s.norm, s.relu, s.dropout, s.linear_o)
    }
}

#[derive(Config)]
pub struct SegHeadConfig {
    pub d_model: usize,
    pub n_classes: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl SegHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SegHead<B> {
        SegHead {
            linear_i: LinearConfig::new(self.d_model, self.d_model).init(device),
            norm: LayerNormConfig::new(self.d_model).init(device),
            relu: ReLUConfig::new().init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            linear_o: LinearConfig::new(self.d_model, self.n_classes).init(device),
        }
    }
}

/// `[b, p, classes]` logits to `[b, classes, p]` log-probabilities.
pub fn to_log_probs<B: Backend>(logits: Tensor<B, 3>) -> Tensor<B, 3> {
    log_softmax(logits.swap_dims(1, 2), 1)
}

/// Mean negative log-likelihood over the real points of the batch.
pub fn nll_loss<B: Backend>(
    log_probs: Tensor<B, 3>,
    target: Tensor<B, 2, Int>,
    mask: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let [batch, _, points] = log_probs.dims();
    let picked = log_probs
        .gather(1, target.reshape([batch, 1, points]))
        .reshape([batch, points]);
    let count = mask.clone().sum().clamp_min(1.0);
    (picked * mask).sum().neg() / count
}

/// `(correct, total)` over the real points of the batch.
pub fn point_accuracy<B: Backend>(
    log_probs: Tensor<B, 3>,
    target: Tensor<B, 2, Int>,
    mask: Tensor<B, 2>,
) -> (usize, usize) {
    let [batch, _, points] = log_probs.dims();
    let pred = log_probs.argmax(1).reshape([batch, points]);
    let correct = (pred.equal(target).float() * mask.clone())
        .sum()
        .into_scalar()
        .elem::<f32>();
    let total = mask.sum().into_scalar().elem::<f32>();
    (correct.round() as usize, total.round() as usize)
}
