use clap::Parser;
use dotenv::dotenv;
use sketch_seg::{
    config::{RunPaths, TrainArgs},
    logging::init_logger,
    train_device, training, TrainAutodiffBackend,
};

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_logger();

    let args = TrainArgs::parse();
    let config = args.to_config();
    let paths = RunPaths::new(args.out_dir(), &config.save_str);

    let device = train_device();
    log::info!("setup device: {device:?}");

    let report = training::train::<TrainAutodiffBackend>(&config, &paths, device)?;
    log::info!(
        "done: {} epochs of {}, checkpoint at {}",
        report.epochs,
        report.model,
        report.checkpoint.display()
    );
    Ok(())
}
