mod app;
mod corpus;
mod util;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use starspire::EngineConfig;
use tracing_subscriber::EnvFilter;

use corpus::Source;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory of .txt documents to import.
    #[arg(long, conflicts_with = "project")]
    corpus: Option<PathBuf>,

    /// Project file written by "Save project".
    #[arg(long)]
    project: Option<PathBuf>,

    /// JSON file overriding engine constants.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,starspire=debug")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let source = match (args.corpus, args.project) {
        (Some(dir), _) => Source::Corpus(dir),
        (None, Some(path)) => Source::Project(path),
        (None, None) => Source::Empty,
    };

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "StarSpire",
        options,
        Box::new(move |cc| Ok(Box::new(app::StarSpireApp::new(cc, source, config)))),
    )
    .map_err(|error| anyhow::anyhow!("viewer failed: {error}"))
}
