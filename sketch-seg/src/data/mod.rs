use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Data, Int, Tensor},
};
use derive_new::new;
use itertools::Itertools;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

pub use self::sketch::*;

pub mod sketch;

/// Strokes kept per sketch.
pub const N_STK: usize = 16;
/// Point slots per stroke.
pub const N_STK_PNT: usize = 32;
pub const N_PNT: usize = N_STK * N_STK_PNT;
/// `x`, `y`, pen lifted after this point.
pub const POINT_CHANNELS: usize = 3;

#[derive(Debug, Clone)]
pub struct SketchBatch<B: Backend> {
    /// `[batch, N_PNT, POINT_CHANNELS]`
    pub points: Tensor<B, 3>,
    /// `[batch, N_PNT]`
    pub mask: Tensor<B, 2>,
    /// `[batch, N_PNT]`
    pub target: Tensor<B, 2, Int>,
}

#[derive(new)]
pub struct SketchBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> Batcher<SketchItem, SketchBatch<B>> for SketchBatcher<B> {
    fn batch(&self, items: Vec<SketchItem>) -> SketchBatch<B> {
        let points = items
            .iter()
            .map(|item| item.points.iter().flatten().copied().collect_vec())
            .map(|points| Data::<f32, 2>::new(points, [N_PNT, POINT_CHANNELS].into()))
            .map(|data| Tensor::<B, 2>::from_data(data.convert::<B::FloatElem>(), &self.device))
            .collect_vec();

        let mask = items
            .iter()
            .map(|item| Data::<f32, 1>::new(item.mask.clone(), [N_PNT].into()))
            .map(|data| Tensor::<B, 1>::from_data(data.convert::<B::FloatElem>(), &self.device))
            .collect_vec();

        let target = items
            .iter()
            .map(|item| {
                Data::<i64, 1>::new(
                    item.target.iter().map(|&t| t as i64).collect_vec(),
                    [N_PNT].into(),
                )
            })
            .map(|data| Tensor::<B, 1, Int>::from_data(data.convert::<B::IntElem>(), &self.device))
            .collect_vec();

        SketchBatch {
            points: Tensor::stack(points, 0),
            mask: Tensor::stack(mask, 0),
            target: Tensor::stack(target, 0),
        }
    }
}

/// Index batches over a split of `len` items.
#[derive(Debug, Clone)]
pub struct ShuffledBatches {
    batches: std::vec::IntoIter<Vec<usize>>,
}

impl ShuffledBatches {
    /// Shuffled with `seed`; the final batch may be short.
    pub fn new(len: usize, batch_size: usize, seed: u64) -> Self {
        let mut indices = (0..len).collect_vec();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));
        Self::from_indices(indices, batch_size)
    }

    /// In split order, for the evaluation pass.
    pub fn sequential(len: usize, batch_size: usize) -> Self {
        Self::from_indices((0..len).collect(), batch_size)
    }

    fn from_indices(indices: Vec<usize>, batch_size: usize) -> Self {
        let batches = indices
            .chunks(batch_size.max(1))
            .map(<[usize]>::to_vec)
            .collect_vec();
        Self {
            batches: batches.into_iter(),
        }
    }
}

impl Iterator for ShuffledBatches {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        self.batches.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_cover_every_index_once() {
        let batches = ShuffledBatches::new(10, 4, 3).collect_vec();
        assert_eq!(batches.iter().map(Vec::len).collect_vec(), vec![4, 4, 2]);
        assert_eq!(batches.concat().into_iter().sorted().collect_vec(), (0..10).collect_vec());

        assert_eq!(
            ShuffledBatches::new(10, 4, 3).collect_vec(),
            batches,
            "same seed, same order"
        );
        assert_eq!(
            ShuffledBatches::sequential(5, 2).collect_vec(),
            vec![vec![0, 1], vec![2, 3], vec![4]]
        );
        assert_eq!(ShuffledBatches::sequential(0, 2).count(), 0);
    }

    #[test]
    fn batcher_shapes() {
        type B = burn::backend::NdArray;
        let device = burn::backend::ndarray::NdArrayDevice::Cpu;

        let sketch = SketchFile::parse("0 0 0 1\n2 2 1 2\n").unwrap();
        let items = vec![
            SketchItem::from_sketch(&sketch, "a.txt"),
            SketchItem::from_sketch(&sketch, "b.txt"),
            SketchItem::from_sketch(&sketch, "c.txt"),
        ];

        let batch = SketchBatcher::<B>::new(device).batch(items);
        assert_eq!(batch.points.dims(), [3, N_PNT, POINT_CHANNELS]);
        assert_eq!(batch.mask.dims(), [3, N_PNT]);
        assert_eq!(batch.target.dims(), [3, N_PNT]);

        let mask_sum = batch.mask.sum().into_data().convert::<f32>().value[0];
        assert_eq!(mask_sum, 6.0);
        let target = batch.target.into_data().convert::<i64>().value;
        assert_eq!(&target[..3], &[1, 2, 0]);
    }
}
