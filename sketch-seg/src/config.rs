use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use burn::{
    config::Config,
    optim::{decay::WeightDecayConfig, AdamConfig},
};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::{
    data::{N_STK, N_STK_PNT},
    training::CHECKPOINT_EXTENSION,
    utils::{get_env, timestamp},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("error model type: `{0}` (expected SketchRNN, SketchTransformer or SDGraph)")]
    UnknownModel(String),
    #[error("expected `True` or `False`, got `{0}`")]
    InvalidBool(String),
}

/// Boolean flag spelled `True` / `False` on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyBool {
    True,
    False,
}

impl PyBool {
    pub fn is_true(self) -> bool {
        self == Self::True
    }
}

impl fmt::Display for PyBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_true() { "True" } else { "False" })
    }
}

impl FromStr for PyBool {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "True" => Ok(Self::True),
            "False" => Ok(Self::False),
            other => Err(ConfigError::InvalidBool(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "SketchRNN")]
    SketchRnn,
    #[serde(rename = "SketchTransformer")]
    SketchTransformer,
    #[serde(rename = "SDGraph")]
    SdGraph,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [Self::SketchRnn, Self::SketchTransformer, Self::SdGraph];

    pub fn name(self) -> &'static str {
        match self {
            Self::SketchRnn => "SketchRNN",
            Self::SketchTransformer => "SketchTransformer",
            Self::SdGraph => "SDGraph",
        }
    }

    /// SDGraph reads sketches stroke by stroke, the sequence models read a flat
    /// point stream.
    pub fn uses_stroke_layout(self) -> bool {
        matches!(self, Self::SdGraph)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ConfigError::UnknownModel(s.to_string()))
    }
}

pub fn default_save_str() -> String {
    format!("sdgraph_{N_STK}_{N_STK_PNT}")
}

#[derive(Parser, Debug, Clone)]
#[command(name = "train", about = "Train a per-point sketch segmentation network")]
pub struct TrainArgs {
    /// Batch size in training.
    #[arg(long, default_value_t = 100)]
    pub bs: usize,
    /// Number of epochs in training.
    #[arg(long, default_value_t = 2000)]
    pub epoch: usize,
    /// Learning rate in training.
    #[arg(long = "learning_rate", default_value_t = 1e-4)]
    pub learning_rate: f64,
    /// Adam weight decay.
    #[arg(long = "decay_rate", default_value_t = 1e-4)]
    pub decay_rate: f64,
    /// Resume from `model_trained/<save_str>` when it exists.
    #[arg(long = "is_load_weight", default_value_t = PyBool::False)]
    pub is_load_weight: PyBool,
    /// Use `--root_local` instead of `--root_sever`.
    #[arg(long, default_value_t = PyBool::False)]
    pub local: PyBool,
    /// One of SketchRNN, SketchTransformer, SDGraph.
    #[arg(long, default_value_t = ModelKind::SketchRnn)]
    pub model: ModelKind,
    /// Name of the checkpoint and log files.
    #[arg(long = "save_str", default_value_t = default_save_str())]
    pub save_str: String,
    #[arg(
        long = "root_sever",
        default_value = "/root/my_data/data_set/sketch_cad/sketch_txt_all"
    )]
    pub root_sever: PathBuf,
    #[arg(
        long = "root_local",
        default_value = r"D:\document\DeepLearning\DataSet\sketch_seg\SketchSeg-150K"
    )]
    pub root_local: PathBuf,
    /// Sub-directory of the dataset root to train on.
    #[arg(long, default_value = "plane")]
    pub category: String,
    /// Share of the sketches held out for the evaluation pass.
    #[arg(long = "test_ratio", default_value_t = 0.2)]
    pub test_ratio: f64,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Output root; defaults to `$SKETCHSEG_OUT_DIR`, then the working directory.
    #[arg(long = "out_dir")]
    pub out_dir: Option<PathBuf>,
}

impl TrainArgs {
    pub fn data_root(&self) -> &Path {
        if self.local.is_true() {
            &self.root_local
        } else {
            &self.root_sever
        }
    }

    pub fn out_dir(&self) -> PathBuf {
        self.out_dir
            .clone()
            .or_else(|| get_env("SKETCHSEG_OUT_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn to_config(&self) -> TrainingConfig {
        TrainingConfig::new(
            self.model,
            self.data_root().to_path_buf(),
            self.category.clone(),
            self.save_str.clone(),
            adam(self.decay_rate),
        )
        .with_num_epochs(self.epoch)
        .with_batch_size(self.bs)
        .with_learning_rate(self.learning_rate)
        .with_load_weight(self.is_load_weight.is_true())
        .with_test_ratio(self.test_ratio)
        .with_seed(self.seed)
    }
}

/// Adam with betas (0.9, 0.999), eps 1e-8 and L2 weight decay.
pub fn adam(weight_decay: f64) -> AdamConfig {
    AdamConfig::new()
        .with_beta_1(0.9)
        .with_beta_2(0.999)
        .with_epsilon(1e-8)
        .with_weight_decay(Some(WeightDecayConfig::new(weight_decay as _)))
}

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ModelKind,
    pub data_root: PathBuf,
    pub category: String,
    pub save_str: String,
    pub optimizer: AdamConfig,
    #[config(default = 2000)]
    pub num_epochs: usize,
    #[config(default = 100)]
    pub batch_size: usize,
    #[config(default = 1.0e-4)]
    pub learning_rate: f64,
    #[config(default = false)]
    pub load_weight: bool,
    #[config(default = 0.2)]
    pub test_ratio: f64,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 20)]
    pub lr_step_size: usize,
    #[config(default = 0.7)]
    pub lr_gamma: f64,
}

/// Where a run writes its artifacts, relative to an output root.
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// `model_trained/<save_str>.pth`
    pub checkpoint: PathBuf,
    pub config_file: PathBuf,
    pub log_file: PathBuf,
    pub confusion_dir: PathBuf,
}

impl RunPaths {
    pub fn new(out_dir: impl AsRef<Path>, save_str: &str) -> Self {
        Self::with_timestamp(out_dir, save_str, &timestamp())
    }

    pub fn with_timestamp(out_dir: impl AsRef<Path>, save_str: &str, stamp: &str) -> Self {
        let out_dir = out_dir.as_ref();
        let trained = out_dir.join("model_trained");
        Self {
            checkpoint: trained.join(format!("{save_str}.{CHECKPOINT_EXTENSION}")),
            config_file: trained.join(format!("{save_str}.json")),
            log_file: out_dir.join("log").join(format!("{save_str}-{stamp}.txt")),
            confusion_dir: out_dir
                .join("data_utils")
                .join("confusion")
                .join(format!("{save_str}-{stamp}")),
        }
    }

    pub fn create_dirs(&self) -> std::io::Result<()> {
        for file in [&self.checkpoint, &self.log_file] {
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::create_dir_all(&self.confusion_dir)
    }
}
