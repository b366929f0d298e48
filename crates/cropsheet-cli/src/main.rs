mod commands;
mod logging;
mod progress;

use std::collections::BTreeMap;
use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use cropsheet_core::annotations::parse_annotations;
use cropsheet_core::{AppConfig, Pipeline};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let guard = logging::init_logger();

    let mut config = match cropsheet_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            drop(guard);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let outcome = match args.command {
        Some(Commands::Process(process_args)) => {
            process_args.apply(&mut config);
            run_process(config)
        }
        Some(Commands::Inspect(source)) => {
            source.apply(&mut config);
            run_inspect(&config)
        }
        Some(Commands::Visualize(source)) => {
            source.apply(&mut config);
            run_visualize(config)
        }
        Some(Commands::PrintConfig) => run_print_config(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        error!("Error: {:#}", err);
        drop(guard);
        process::exit(1);
    }
}

fn run_process(config: AppConfig) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(config);
    let reporter = CliReporter::new();
    let result = pipeline
        .run(&reporter)
        .context("Processing annotations failed")?;

    println!();
    info!(
        "Parse: {}, Crop: {}, Report: {}",
        format!("{:.2}s", result.parse_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.correlate_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.report_duration.as_secs_f64()).green(),
    );
    info!(
        "{} of {} images matched, {} crops written ({})",
        format!("{}", result.images_matched).cyan(),
        result.images_total,
        format!("{}", result.crops_written).cyan(),
        if result.cover_all {
            "no brand filter".yellow()
        } else {
            "brand filter".normal()
        },
    );
    info!(
        "{} report rows, {} photo columns, {} images embedded -> {}",
        format!("{}", result.report.rows).cyan(),
        result.report.photo_columns,
        result.report.images_embedded,
        result.report.output_path.display(),
    );

    let embed_failures = result.report.embed_failures.len();
    let visual_failures = result.report.visualization_failures.len();
    if embed_failures + visual_failures > 0 {
        warn!(
            "{} thumbnails and {} review images were skipped",
            format!("{}", embed_failures).red(),
            format!("{}", visual_failures).red(),
        );
    }

    Ok(())
}

fn run_inspect(config: &AppConfig) -> anyhow::Result<()> {
    let records = parse_annotations(&config.annotations_path())?;

    let mut box_labels: BTreeMap<&str, usize> = BTreeMap::new();
    let mut point_labels: BTreeMap<&str, usize> = BTreeMap::new();

    for record in &records {
        println!(
            "{:>6}  {:<40} {:>4} boxes {:>4} points",
            record.id(),
            record.name(),
            record.boxes.len(),
            record.points.len()
        );
        for b in &record.boxes {
            *box_labels.entry(b.label.as_str()).or_insert(0) += 1;
        }
        for p in &record.points {
            *point_labels.entry(p.label.as_str()).or_insert(0) += 1;
        }
    }

    println!();
    println!("{}", "Box labels".bold());
    for (label, count) in &box_labels {
        println!("  {:<30} {}", label, count);
    }
    println!("{}", "Point labels".bold());
    for (label, count) in &point_labels {
        println!("  {:<30} {}", label, count);
    }
    info!(
        "{} images, {} boxes, {} points",
        records.len(),
        box_labels.values().sum::<usize>(),
        point_labels.values().sum::<usize>()
    );

    Ok(())
}

fn run_visualize(config: AppConfig) -> anyhow::Result<()> {
    let rec_dir = config.rec_dir();
    let pipeline = Pipeline::new(config);
    let reporter = CliReporter::new();
    let (rendered, failures) = pipeline.visualize_all(&reporter)?;

    info!(
        "{} annotated images written to {}",
        format!("{}", rendered).green(),
        rec_dir.display()
    );
    if !failures.is_empty() {
        warn!("{} images could not be annotated", format!("{}", failures.len()).red());
    }
    Ok(())
}

fn run_print_config(config: &AppConfig) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}
