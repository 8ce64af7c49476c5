use std::process::ExitCode;

use digit_mlp::config::ExperimentConfig;
use digit_mlp::experiments::{Experiments, PreparedData};
use digit_mlp::helpers::render_digit;
use digit_mlp::mnist_data::MnistDataset;
use digit_mlp::preprocessing::format_shape;

fn init_logger() {
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.filter_level(log::LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn run() -> digit_mlp::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };
    log::info!("Running with {:?}", config);

    let mut dataset = MnistDataset::load(&config.data_dir)?;
    if let Some(limit) = config.train_limit {
        dataset.train.truncate(limit);
    }
    if let Some(limit) = config.test_limit {
        dataset.test.truncate(limit);
    }

    println!("{}", format_shape(&dataset.train.shape()));
    println!("{}", format_shape(&[dataset.train.len()]));
    println!("{}", format_shape(&dataset.test.shape()));
    println!("{}", format_shape(&[dataset.test.len()]));

    for index in 0..config.preview_images.min(dataset.train.len()) {
        println!("Label: {}", dataset.train.labels[index]);
        println!("{}", render_digit(dataset.train.image(index), dataset.train.rows, dataset.train.cols));
    }

    let data = PreparedData::from_dataset(&dataset);
    println!("{}", format_shape(data.train_images.shape()));
    println!("{}", format_shape(data.train_labels.shape()));
    println!("{}", format_shape(data.test_images.shape()));
    println!("{}", format_shape(data.test_labels.shape()));

    let reports = Experiments::new(&config, &data).run_all()?;
    for report in &reports {
        log::info!("{:<14} error {:.2}%", report.name, report.evaluation.error_percent());
    }
    Ok(())
}

fn main() -> ExitCode {
    init_logger();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
