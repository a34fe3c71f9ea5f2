use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{
    config::Config,
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::{AutodiffModule, Module},
    optim::{GradientsParams, Optimizer},
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Tensor,
    },
    LearningRate,
};

use crate::{
    config::{ModelKind, RunPaths, TrainingConfig},
    data::{ShuffledBatches, SketchBatcher, SketchDatasetSeg, N_PNT, POINT_CHANNELS},
    logging::{notice, Notice, RunLog},
    model::{
        nll_loss, point_accuracy, SdGraphConfig, SegmentationModel, SketchRnnConfig,
        SketchTransformerConfig,
    },
    schedule::StepLr,
};

pub const CHECKPOINT_EXTENSION: &str = "pth";

type CheckpointRecorder = BinBytesRecorder<FullPrecisionSettings>;

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("accessing checkpoint {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encoding checkpoint: {0}")]
    Record(String),
    #[error("checkpoint has {found} parameters, model has {expected}")]
    ParamCount { expected: usize, found: usize },
    #[error("checkpoint model outputs {found:?}, expected {expected:?}")]
    OutputShape {
        expected: [usize; 3],
        found: [usize; 3],
    },
}

#[derive(Debug, Clone)]
pub struct EpochSummary {
    pub epoch: usize,
    pub num_epochs: usize,
    /// Scheduler steps taken so far, including this epoch's.
    pub scheduler_steps: usize,
    /// Learning rate the epoch trained with.
    pub learning_rate: LearningRate,
    pub train_loss: f32,
    /// `None` when the evaluation split is empty.
    pub eval_accuracy: Option<f32>,
    pub checkpoint: PathBuf,
}

impl EpochSummary {
    pub fn log_line(&self) -> String {
        let eval = self
            .eval_accuracy
            .map_or_else(|| "n/a".to_string(), |acc| format!("{acc:.4}"));
        format!(
            "Epoch({}/{}):\ttrain_loss:\t{:.6}\teval_point_acc:\t{eval}\tlr:\t{:e}",
            self.epoch, self.num_epochs, self.train_loss, self.learning_rate
        )
    }
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub model: ModelKind,
    pub epochs: usize,
    pub scheduler_steps: usize,
    /// Whether training resumed from an existing checkpoint.
    pub resumed: bool,
    pub checkpoint: PathBuf,
    pub log_file: PathBuf,
    pub last_epoch: Option<EpochSummary>,
}

pub fn train<B: AutodiffBackend>(
    config: &TrainingConfig,
    paths: &RunPaths,
    device: B::Device,
) -> Result<TrainReport> {
    train_with::<B, _>(config, paths, device, |_| {})
}

/// Like [`train`], calling `on_epoch` once the epoch's checkpoint is written
/// and its evaluation pass is done.
pub fn train_with<B, F>(
    config: &TrainingConfig,
    paths: &RunPaths,
    device: B::Device,
    on_epoch: F,
) -> Result<TrainReport>
where
    B: AutodiffBackend,
    F: FnMut(&EpochSummary),
{
    log::info!("- train -");
    notice(Notice::Info, format!("save as: {}", config.save_str));

    paths.create_dirs().context("creating output directories")?;
    let run_log = RunLog::create(&paths.log_file)
        .with_context(|| format!("creating log file {}", paths.log_file.display()))?;
    config
        .save(&paths.config_file)
        .with_context(|| format!("saving config to {}", paths.config_file.display()))?;

    log::info!("loading dataset");
    let dataset = SketchDatasetSeg::load(
        &config.data_root,
        &config.category,
        config.test_ratio,
        config.seed,
    )
    .context("loading dataset")?;
    let n_classes = dataset.n_classes();

    log::info!(
        "creating {} ({} layout, {n_classes} classes)",
        config.model,
        if config.model.uses_stroke_layout() { "stroke" } else { "point" }
    );
    let run = EpochRun {
        config,
        paths,
        dataset,
        run_log,
        device,
    };
    match config.model {
        ModelKind::SketchRnn => {
            let model = SketchRnnConfig::new(n_classes).init::<B>(&run.device);
            run.run_epochs(model, on_epoch)
        }
        ModelKind::SketchTransformer => {
            let model = SketchTransformerConfig::new(n_classes).init::<B>(&run.device);
            run.run_epochs(model, on_epoch)
        }
        ModelKind::SdGraph => {
            let model = SdGraphConfig::new(n_classes).init::<B>(&run.device);
            run.run_epochs(model, on_epoch)
        }
    }
}

/// Writes the weights of `model` to `path` as is, extension included.
pub fn save_checkpoint<B: Backend, M: Module<B>>(model: M, path: &Path) -> Result<(), CheckpointError> {
    let bytes = Recorder::<B>::record(&CheckpointRecorder::default(), model.into_record(), ())
        .map_err(|err| CheckpointError::Record(format!("{err:?}")))?;
    fs::write(path, bytes).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the checkpoint at `path` into `model`.
///
/// Records are not shape checked on load, so the result is compared with
/// `model` by parameter count and by the output shape of a padded batch.
pub fn read_checkpoint<B, M>(model: M, path: &Path, device: &B::Device) -> Result<M, CheckpointError>
where
    B: Backend,
    M: SegmentationModel<B>,
{
    let bytes = fs::read(path).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let record = Recorder::<B>::load(&CheckpointRecorder::default(), bytes, device)
        .map_err(|err| CheckpointError::Record(format!("{err:?}")))?;
    let loaded = model.clone().load_record(record);

    let (expected, found) = (model.num_params(), loaded.num_params());
    if expected != found {
        return Err(CheckpointError::ParamCount { expected, found });
    }
    let (expected, found) = (output_dims(&model, device), output_dims(&loaded, device));
    if expected != found {
        return Err(CheckpointError::OutputShape { expected, found });
    }
    Ok(loaded)
}

fn output_dims<B: Backend, M: SegmentationModel<B>>(model: &M, device: &B::Device) -> [usize; 3] {
    let points = Tensor::<B, 3>::zeros([1, N_PNT, POINT_CHANNELS], device);
    let mask = Tensor::<B, 2>::ones([1, N_PNT], device);
    model.forward_seg(points, mask).dims()
}

/// Loads the checkpoint file at `path` into `model`, falling back to `model`
/// itself when the checkpoint is missing or does not fit.
pub fn load_checkpoint<B: Backend, M: SegmentationModel<B>>(
    model: M,
    path: &Path,
    device: &B::Device,
) -> (M, bool) {
    match read_checkpoint(model.clone(), path, device) {
        Ok(model) => {
            notice(
                Notice::Success,
                format!("training from exist model: {}", path.display()),
            );
            (model, true)
        }
        Err(err) => {
            log::debug!("loading {}: {err}", path.display());
            notice(Notice::Failure, "no existing model, training from scratch");
            (model, false)
        }
    }
}

struct EpochRun<'a, B: AutodiffBackend> {
    config: &'a TrainingConfig,
    paths: &'a RunPaths,
    dataset: SketchDatasetSeg,
    run_log: RunLog,
    device: B::Device,
}

impl<'a, B: AutodiffBackend> EpochRun<'a, B> {
    fn run_epochs<M, F>(mut self, model: M, mut on_epoch: F) -> Result<TrainReport>
    where
        M: AutodiffModule<B> + SegmentationModel<B>,
        M::InnerModule: SegmentationModel<B::InnerBackend>,
        F: FnMut(&EpochSummary),
    {
        let config = self.config;
        let checkpoint = self.paths.checkpoint.clone();

        let (mut model, resumed) = if config.load_weight {
            load_checkpoint(model, &checkpoint, &self.device)
        } else {
            notice(Notice::Info, "does not load state dict, training from scratch");
            (model, false)
        };

        let batcher_train = SketchBatcher::<B>::new(self.device.clone());
        let batcher_valid = SketchBatcher::<B::InnerBackend>::new(self.device.clone());
        let mut optim = config.optimizer.init::<B, M>();
        let mut scheduler = StepLr::new(config.learning_rate, config.lr_step_size, config.lr_gamma);

        let mut last_epoch = None;
        for epoch in 0..config.num_epochs {
            let lr = scheduler.lr();

            self.dataset.train();
            let mut losses = Vec::new();
            let batches = ShuffledBatches::new(
                self.dataset.len(),
                config.batch_size,
                config.seed.wrapping_add(epoch as u64),
            );
            for (batch_id, indices) in batches.enumerate() {
                let batch = batcher_train.batch(self.dataset.get_many(&indices));

                let log_probs = model.forward_seg(batch.points, batch.mask.clone());
                let loss = nll_loss(log_probs, batch.target, batch.mask);
                let loss_value = loss.clone().into_scalar().elem::<f32>();

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(lr, model, grads);

                log::debug!("epoch {epoch} batch {batch_id}: loss {loss_value:.6}");
                losses.push(loss_value);
            }
            let train_loss = if losses.is_empty() {
                0.0
            } else {
                losses.iter().sum::<f32>() / losses.len() as f32
            };

            scheduler.step();
            save_checkpoint(model.clone(), &checkpoint).context("saving checkpoint")?;

            self.dataset.eval();
            let model_valid = model.valid();
            let (mut correct, mut total) = (0, 0);
            for indices in ShuffledBatches::sequential(self.dataset.len(), config.batch_size) {
                let batch = batcher_valid.batch(self.dataset.get_many(&indices));
                let log_probs = model_valid.forward_seg(batch.points, batch.mask.clone());
                let (c, t) = point_accuracy(log_probs, batch.target, batch.mask);
                correct += c;
                total += t;
            }

            let summary = EpochSummary {
                epoch,
                num_epochs: config.num_epochs,
                scheduler_steps: scheduler.step_count(),
                learning_rate: lr,
                train_loss,
                eval_accuracy: (total > 0).then(|| correct as f32 / total as f32),
                checkpoint: checkpoint.clone(),
            };
            self.run_log.info(&summary.log_line());
            on_epoch(&summary);
            last_epoch = Some(summary);
        }

        Ok(TrainReport {
            model: config.model,
            epochs: config.num_epochs,
            scheduler_steps: scheduler.step_count(),
            resumed,
            checkpoint,
            log_file: self.run_log.path().to_path_buf(),
            last_epoch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_line_format() {
        let summary = EpochSummary {
            epoch: 3,
            num_epochs: 10,
            scheduler_steps: 4,
            learning_rate: 1e-4,
            train_loss: 0.5,
            eval_accuracy: Some(0.75),
            checkpoint: PathBuf::from("model_trained/x.pth"),
        };
        assert_eq!(
            summary.log_line(),
            "Epoch(3/10):\ttrain_loss:\t0.500000\teval_point_acc:\t0.7500\tlr:\t1e-4"
        );

        let summary = EpochSummary {
            eval_accuracy: None,
            ..summary
        };
        assert!(summary.log_line().contains("eval_point_acc:\tn/a"));
    }

    type B = burn::backend::NdArray;

    fn device() -> burn::backend::ndarray::NdArrayDevice {
        burn::backend::ndarray::NdArrayDevice::Cpu
    }

    #[test]
    fn missing_checkpoint_falls_back() {
        let dir = tempfile::tempdir().unwrap();

        let model = SdGraphConfig::new(2).init::<B>(&device());
        let (_, loaded) = load_checkpoint(model, &dir.path().join("missing.pth"), &device());
        assert!(!loaded);
    }

    #[test]
    fn saved_checkpoint_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt").with_extension(CHECKPOINT_EXTENSION);

        let model = SdGraphConfig::new(2).init::<B>(&device());
        save_checkpoint(model, &path).unwrap();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "pth");

        let fresh = SdGraphConfig::new(2).init::<B>(&device());
        let (_, loaded) = load_checkpoint(fresh, &path, &device());
        assert!(loaded);
    }

    #[test]
    fn class_count_mismatch_trains_from_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt.pth");

        save_checkpoint(SdGraphConfig::new(2).init::<B>(&device()), &path).unwrap();

        let fresh = SdGraphConfig::new(5).init::<B>(&device());
        assert!(matches!(
            read_checkpoint(fresh.clone(), &path, &device()),
            Err(CheckpointError::ParamCount { .. } | CheckpointError::OutputShape { .. })
        ));

        let (model, loaded) = load_checkpoint(fresh, &path, &device());
        assert!(!loaded);
        assert_eq!(output_dims(&model, &device()), [1, 5, N_PNT]);
    }
}
