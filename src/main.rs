//! musescan - Transcribe a printed score page into a note timeline
//!
//! Subcommands:
//! - `musescan transcribe <image> --detections <json>` - Run the page pipeline
//! - `musescan config` - Print the default configuration as TOML

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use musescan_lib::{
    export_midi, ingest_page_file, process_page, render_overlay, Detectors, InkHeadDetector,
    PipelineConfig, ReplayDetector, TraceWriter,
};

#[derive(Parser)]
#[command(name = "musescan")]
#[command(about = "Turn a printed score page into a monophonic note timeline")]
#[command(version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe one page image
    Transcribe {
        /// Page image (PNG or JPEG)
        image: PathBuf,

        /// Recorded page-space detections (JSON array of class_id/confidence/bbox)
        #[arg(short, long)]
        detections: PathBuf,

        /// Pipeline config (TOML); defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the timeline as JSON
        #[arg(long)]
        events: Option<PathBuf>,

        /// Write the timeline as a MIDI file
        #[arg(long)]
        midi: Option<PathBuf>,

        /// Write a debug overlay image
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Append stage progress to a JSONL trace file
        #[arg(long)]
        trace: Option<PathBuf>,

        /// Write per-detection decisions as JSON
        #[arg(long)]
        decisions: Option<PathBuf>,
    },

    /// Print the default configuration
    Config {
        /// Save to a file instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Transcribe {
            image,
            detections,
            config,
            events,
            midi,
            overlay,
            trace,
            decisions,
        } => {
            let config = match config {
                Some(path) => PipelineConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => PipelineConfig::default(),
            };

            let page = ingest_page_file(&image)
                .with_context(|| format!("Failed to read page {}", image.display()))?;
            let symbols = ReplayDetector::from_json_file(&detections)?;
            let detectors = Detectors::new(Arc::new(symbols), Arc::new(InkHeadDetector::new()));
            let trace = trace.map(TraceWriter::new);

            let result = process_page(&page, &detectors, &config, trace.as_ref()).await?;

            println!(
                "{}: {:?}, {} notes, {} staves, {} detections ({} rests, {} without head)",
                image.display(),
                result.status,
                result.timeline.len(),
                result.staff_blocks.len(),
                result.report.merged_detections,
                result.report.rests_skipped,
                result.report.heads_not_found
            );

            if let Some(path) = events {
                write_json(&path, &result.timeline)?;
            }
            if let Some(path) = decisions {
                write_json(&path, &result.decisions)?;
            }
            if let Some(path) = midi {
                let bytes = export_midi(&result.timeline, &config.export)?;
                std::fs::write(&path, bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                log::info!("Wrote MIDI to {}", path.display());
            }
            if let Some(path) = overlay {
                render_overlay(&page.pixels, &result)
                    .save(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                log::info!("Wrote overlay to {}", path.display());
            }
        }

        Commands::Config { output } => {
            let config = PipelineConfig::default();
            match output {
                Some(path) => {
                    config.save(&path)?;
                    println!("Wrote default config to {}", path.display());
                }
                None => print!("{}", config.to_toml_string()?),
            }
        }
    }

    Ok(())
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
