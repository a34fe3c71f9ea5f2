use std::path::PathBuf;

use burn::data::dataset::Dataset;
use clap::Parser;
use dotenv::dotenv;
use sketch_seg::{
    data::{DatasetStats, SketchDatasetSeg},
    logging::init_logger,
    utils::show_sketch_terminal,
};

/// Print statistics of a sketch category and draw a few of its sketches.
#[derive(Parser, Debug)]
struct Args {
    /// Dataset root holding one directory per category.
    #[arg(long)]
    root: PathBuf,
    #[arg(long, default_value = "plane")]
    category: String,
    /// Number of sketches to draw.
    #[arg(long, default_value_t = 2)]
    show: usize,
    #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u16).range(1..))]
    width: u16,
    #[arg(long, default_value_t = 32, value_parser = clap::value_parser!(u16).range(1..))]
    height: u16,
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_logger();
    let args = Args::parse();

    let mut dataset = SketchDatasetSeg::load(&args.root, &args.category, 0.2, 42)?;
    let (n_train, n_test) = dataset.split_lens();
    println!("num items: {} train / {} test", n_train, n_test);

    let stats = DatasetStats::from_items(dataset.items(), dataset.n_classes());
    println!("train split:\n{stats}");
    dataset.eval();
    let stats = DatasetStats::from_items(dataset.items(), dataset.n_classes());
    println!("test split:\n{stats}");

    dataset.train();
    for index in 0..args.show.min(dataset.len()) {
        let Some(item) = dataset.get(index) else {
            break;
        };
        println!(
            "{} ({} strokes, {} points)",
            item.path.display(),
            item.num_strokes(),
            item.num_points()
        );
        show_sketch_terminal(&item, args.width.into(), args.height.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_grid() {
        for flag in ["--width", "--height"] {
            assert!(Args::try_parse_from(["inspect-data", "--root", "/data", flag, "0"]).is_err());
        }
        let args = Args::try_parse_from(["inspect-data", "--root", "/data", "--width", "1"]).unwrap();
        assert_eq!((args.width, args.height), (1, 32));
    }
}
