use std::{fs, path::Path, thread, time::Duration};

use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
use sketch_seg::{
    config::{adam, ModelKind, RunPaths, TrainArgs, TrainingConfig},
    training::{self, EpochSummary},
};

type B = Autodiff<NdArray<f32>>;

/// Two-stroke sketches: a horizontal line labelled 0, a vertical one labelled 1.
fn write_dataset(root: &Path, count: usize) {
    let dir = root.join("plane");
    fs::create_dir_all(&dir).unwrap();
    for i in 0..count {
        let o = i as f32;
        let mut text = String::new();
        for j in 0..6 {
            let s = if j == 5 { 1 } else { 0 };
            text.push_str(&format!("{} {} {s} 0\n", o + j as f32, o));
        }
        for j in 0..6 {
            let s = if j == 5 { 1 } else { 0 };
            text.push_str(&format!("{},{},{s},1\n", o, o + 1.0 + j as f32));
        }
        fs::write(dir.join(format!("{i:03}.txt")), text).unwrap();
    }
}

fn config(model: ModelKind, root: &Path, epochs: usize) -> TrainingConfig {
    TrainingConfig::new(
        model,
        root.to_path_buf(),
        "plane".to_string(),
        format!("test_{}", model.name()),
        adam(1e-4),
    )
    .with_num_epochs(epochs)
    .with_batch_size(2)
    .with_learning_rate(1e-3)
}

#[test]
fn every_model_writes_a_checkpoint() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_dataset(data.path(), 4);

    for model in ModelKind::ALL {
        let config = config(model, data.path(), 1);
        let paths = RunPaths::new(out.path(), &config.save_str);

        let report = training::train::<B>(&config, &paths, NdArrayDevice::Cpu).unwrap();
        assert_eq!(report.model, model);
        assert_eq!(report.epochs, 1);
        assert!(!report.resumed);
        assert!(paths.checkpoint.exists(), "{model}");
        assert!(paths.checkpoint.ends_with(format!("model_trained/test_{}.pth", model.name())));
        assert!(paths.config_file.exists());

        let summary = report.last_epoch.unwrap();
        assert!(summary.train_loss.is_finite());
        let acc = summary.eval_accuracy.unwrap();
        assert!((0.0..=1.0).contains(&acc));

        let log = fs::read_to_string(&report.log_file).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains(" - INFO - Epoch(0/1):"));
    }
}

#[test]
fn resumes_only_from_an_existing_checkpoint() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_dataset(data.path(), 3);

    let config = config(ModelKind::SdGraph, data.path(), 1).with_load_weight(true);
    let paths = RunPaths::new(out.path(), &config.save_str);

    let report = training::train::<B>(&config, &paths, NdArrayDevice::Cpu).unwrap();
    assert!(!report.resumed);
    let log = fs::read_to_string(&report.log_file).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(!log.contains("training from scratch"));
    assert!(!log.contains("save as"));

    let report = training::train::<B>(&config, &paths, NdArrayDevice::Cpu).unwrap();
    assert!(report.resumed);
    assert_eq!(report.checkpoint.extension().unwrap(), "pth");
}

#[test]
fn steps_scheduler_and_overwrites_checkpoint_each_epoch() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_dataset(data.path(), 3);

    let config = config(ModelKind::SdGraph, data.path(), 2);
    let paths = RunPaths::new(out.path(), &config.save_str);

    let mut seen = Vec::new();
    let report = training::train_with::<B, _>(&config, &paths, NdArrayDevice::Cpu, |s: &EpochSummary| {
        let modified = fs::metadata(&s.checkpoint).unwrap().modified().unwrap();
        seen.push((s.epoch, s.scheduler_steps, modified));
        thread::sleep(Duration::from_millis(50));
    })
    .unwrap();

    assert_eq!(report.scheduler_steps, 2);
    assert_eq!(
        seen.iter().map(|(e, s, _)| (*e, *s)).collect::<Vec<_>>(),
        vec![(0, 1), (1, 2)]
    );
    assert!(seen[1].2 > seen[0].2);

    let log = fs::read_to_string(&report.log_file).unwrap();
    assert_eq!(log.lines().count(), 2);
}

#[test]
fn log_file_exists_before_dataset_loads() {
    let out = tempfile::tempdir().unwrap();
    let config = config(ModelKind::SketchRnn, &out.path().join("missing"), 1);
    let paths = RunPaths::new(out.path(), &config.save_str);

    assert!(training::train::<B>(&config, &paths, NdArrayDevice::Cpu).is_err());
    assert!(paths.log_file.exists());
    assert!(!paths.checkpoint.exists());
}

#[test]
fn unknown_model_is_a_usage_error() {
    use clap::Parser;

    let err = TrainArgs::try_parse_from(["train", "--model", "PointNet"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
}
