pub mod builder;
pub mod nn;

/// Threads `x` through a chain of `self.layer.forward(..)` calls.
#[macro_export]
macro_rules! pipe {
    ($x:expr $(,$path:ident.$layer:ident)*$(,)?) => {{
        let x = $x;
        $(let x = $path.$layer.forward(x);)*
        x
    }};
}

#[cfg(test)]
mod tests {
    use burn::{
        module::Module,
        nn::{Linear, LinearConfig},
        tensor::{backend::Backend, Tensor},
    };

    #[derive(Debug, Module)]
    struct TwoLayers<B: Backend> {
        a: Linear<B>,
        b: Linear<B>,
    }

    impl<B: Backend> TwoLayers<B> {
        fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
            let s = self;
            crate::pipe!(x, s.a, s.b)
        }
    }

    #[test]
    fn pipe_chains_layers() {
        type B = burn::backend::NdArray;
        let device = burn::backend::ndarray::NdArrayDevice::Cpu;
        let net = TwoLayers::<B> {
            a: LinearConfig::new(3, 5).init(&device),
            b: LinearConfig::new(5, 2).init(&device),
        };
        let out = net.forward(Tensor::zeros([4, 3], &device));
        assert_eq!(out.dims(), [4, 2]);
    }
}
