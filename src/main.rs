use std::process::ExitCode;

use batchloader::{DataLoader, DataLoaderConfig, DataLoaderError, ImageDirConfig, ImageManifestDataset};

const USAGE: &str = "usage: batchloader <image-dir> [batch-size] [workers] [epochs]";

fn parse_arg(args: &[String], idx: usize, default: usize) -> Result<usize, String> {
    match args.get(idx) {
        Some(raw) => raw.parse().map_err(|_| format!("expected a number, got {raw:?}\n{USAGE}")),
        None => Ok(default),
    }
}

/// `(batch_size, workers, epochs)`
fn parse_args(args: &[String]) -> Result<(usize, usize, usize), String> {
    Ok((
        parse_arg(args, 2, 32)?,
        parse_arg(args, 3, 0)?,
        parse_arg(args, 4, 1)?,
    ))
}

fn run(dir: &str, batch_size: usize, workers: usize, epochs: usize) -> Result<(), DataLoaderError> {
    let dataset = ImageManifestDataset::from_class_dirs(dir, ImageDirConfig::default().sort_dataset(true))?;
    println!("Classes: {:?}", dataset.class_names());
    println!("Image shape: {}", dataset.image_shape());

    let config = DataLoaderConfig::new(batch_size, true).num_workers(workers);
    let mut dl = DataLoader::seeded(dataset, config, 727)?;
    println!("{}", dl.summary());

    for epoch in 0..epochs {
        let mut samples = 0;
        let mut failed = 0;
        for batch in dl.epoch() {
            match batch.and_then(|b| b.into_image_batch()) {
                Ok(images) => samples += images.samples_in_batch,
                Err(err) => {
                    eprintln!("{err}");
                    failed += 1;
                }
            }
        }
        println!("Epoch {epoch}: {samples} samples, {failed} failed batches");
    }

    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let Some(dir) = args.get(1) else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    let (batch_size, workers, epochs) = match parse_args(&args) {
        Ok(values) => values,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    match run(dir, batch_size, workers, epochs) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
