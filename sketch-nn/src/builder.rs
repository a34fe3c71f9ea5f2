/// Builds a `Conv1dConfig` from keyword-style arguments.
///
/// `conv_1d!(32, 64, kernel_size = 3, padding = 1)`
#[macro_export]
macro_rules! conv_1d {
        ({$builder:expr}$(,)?) => {
            $builder
        };

        ({$builder:expr} , padding=$padding:expr $(, $($rest:tt)*)?) => {
            $crate::conv_1d!({ $builder.with_padding(burn::nn::PaddingConfig1d::Explicit($padding)) } $(, $($rest)*)?)
        };

        ({$builder:expr} , stride=$stride:expr $(, $($rest:tt)*)?) => {
            $crate::conv_1d!({ $builder.with_stride($stride)} $(, $($rest)*)?)
        };

        ({$builder:expr} , bias=$bias:expr $(, $($rest:tt)*)?) => {
            $crate::conv_1d!({ $builder.with_bias($bias)} $(, $($rest)*)?)
        };

        ($c_in:expr, $c_out:expr, kernel_size = $kernel_size:expr $(, $($rest:tt)*)?) => {
            $crate::conv_1d!({burn::nn::conv::Conv1dConfig::new($c_in, $c_out, $kernel_size)} $(, $($rest)*)?)
        };
    }
