use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod engine;
mod engines;
mod error;
mod fields;
mod history;
mod loader;
mod preprocessing;
mod processor;
mod report;
mod results;
mod server;

use config::{Config, Settings, StoreKind};
use engines::{EngineInfo, EngineRegistry};
use fields::DocumentType;
use history::open_store;
use preprocessing::{Pipeline, Preset};
use processor::{BatchSummary, DocumentProcessor};
use report::Report;
use results::ResultsDir;

#[derive(Parser, Debug)]
#[command(name = "docscan")]
#[command(about = "Extract text and fields from scanned documents and keep a processing history")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand; unset values fall back to saved settings
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory scanned for images
    #[arg(long, global = true, env = "DOCSCAN_IMAGES_DIR")]
    pub images_dir: Option<PathBuf>,

    /// Directory receiving extracted texts and the history
    #[arg(long, global = true, env = "DOCSCAN_RESULTS_DIR")]
    pub results_dir: Option<PathBuf>,

    /// History backend
    #[arg(long, global = true, env = "DOCSCAN_STORE", value_enum)]
    pub store: Option<StoreKind>,

    /// Recognition language (e.g., "por", "eng", "por+eng")
    #[arg(long, global = true, env = "OCR_DEFAULT_LANGUAGE")]
    pub language: Option<String>,

    /// Preprocessing preset: none, minimal, standard, aggressive
    #[arg(long, global = true, env = "DOCSCAN_PRESET")]
    pub preset: Option<String>,

    /// OCR engine to use when several are compiled in
    #[arg(long, global = true, env = "DOCSCAN_ENGINE")]
    pub engine: Option<String>,

    /// Path to tessdata directory (uses TESSDATA_PREFIX env var if not set)
    #[arg(long, global = true, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<String>,

    /// Settings file to read and write instead of the default locations
    #[arg(long, global = true, env = "DOCSCAN_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run OCR on images from the images directory (or absolute paths)
    Process {
        #[arg(required = true)]
        names: Vec<String>,

        /// Record this type instead of detecting it from the text
        #[arg(long)]
        doc_type: Option<String>,
    },

    /// Run OCR on every image in the images directory
    ProcessAll {
        #[arg(long)]
        doc_type: Option<String>,
    },

    /// List images available for processing
    List,

    /// Browse extracted text files
    Results {
        #[command(subcommand)]
        action: ResultsAction,
    },

    /// Show the processing history
    History {
        /// Only entries of this type, e.g. "Invoice"
        #[arg(long)]
        doc_type: Option<String>,

        /// Show one full record (sqlite store only)
        #[arg(long)]
        id: Option<u64>,

        #[arg(long)]
        json: bool,
    },

    /// Summarize the processing history
    Report {
        #[arg(long)]
        json: bool,
    },

    /// Export the history as CSV
    Export {
        /// Destination directory (defaults to the results directory)
        #[arg(long)]
        dest: Option<PathBuf>,
    },

    /// List compiled-in OCR engines
    Engines,

    /// Show or change saved settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Serve the pipeline over HTTP
    Serve {
        /// Host address to bind to
        #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, env = "OCR_PORT", default_value = "9292")]
        port: u16,

        /// Maximum file size in bytes (default: 50MB)
        #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "52428800")]
        max_file_size: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum ResultsAction {
    List,
    Show { name: String },
    Remove { name: String },
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    Show,
    Set { key: SettingKey, value: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SettingKey {
    ImagesDir,
    ResultsDir,
    Store,
    Language,
    Preset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays clean on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.global.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings_paths = Settings::candidates(cli.global.settings.as_deref());
    let settings = Settings::load_from(&settings_paths);

    if let Command::Settings { action } = &cli.command {
        return settings_command(action, &settings_paths, settings);
    }

    let mut config = Config::resolve(&cli.global, &settings)?;
    config.ensure_dirs()?;

    match cli.command {
        Command::Process { names, doc_type } => {
            let (processor, _) = build_processor(&config)?;
            let summary = processor.process_batch(&names, doc_type.map(DocumentType::from));
            print_batch(&summary)
        }
        Command::ProcessAll { doc_type } => {
            if loader::list_images(&config.images_dir).is_empty() {
                println!("No images found in {}", config.images_dir.display());
                return Ok(());
            }
            let (processor, _) = build_processor(&config)?;
            let summary = processor.process_all(doc_type.map(DocumentType::from));
            print_batch(&summary)
        }
        Command::List => {
            let images = loader::list_images(&config.images_dir);
            if images.is_empty() {
                println!("No images found in {}", config.images_dir.display());
            }
            for name in images {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Results { action } => results_command(action, &config),
        Command::History { doc_type, id, json } => {
            history_command(&config, doc_type.as_deref(), id, json)
        }
        Command::Report { json } => {
            let entries = open_store(config.store, &config.results_dir)?.list(None)?;
            let report = Report::build(&entries);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
            Ok(())
        }
        Command::Export { dest } => {
            let entries = open_store(config.store, &config.results_dir)?.list(None)?;
            let dest = dest.unwrap_or_else(|| config.results_dir.clone());
            let path = report::export_csv(&entries, &dest)?;
            println!("Exported {} documents to {}", entries.len(), path.display());
            Ok(())
        }
        Command::Engines => {
            let registry = EngineRegistry::new(&config)?;
            for info in registry.info() {
                let marker = if info.name == registry.default_name() { "*" } else { " " };
                println!(
                    "{} {:<10} {} [{}]",
                    marker,
                    info.name,
                    info.description,
                    info.supported_languages.join(", ")
                );
            }
            Ok(())
        }
        Command::Serve {
            host,
            port,
            max_file_size,
        } => {
            config.host = host;
            config.port = port;
            config.max_file_size = max_file_size;

            tracing::info!("Starting docscan v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!(
                "Images: {:?}, results: {:?}, history: {}, preset: {}",
                config.images_dir,
                config.results_dir,
                config.store.as_str(),
                config.preset.as_str()
            );

            let (processor, engines) = build_processor(&config)?;
            server::run(config, processor, engines).await
        }
        Command::Settings { .. } => Ok(()),
    }
}

fn build_processor(config: &Config) -> anyhow::Result<(DocumentProcessor, Vec<EngineInfo>)> {
    let registry = EngineRegistry::new(config)?;
    let engine = registry
        .default()
        .context("Default OCR engine is not registered")?;
    tracing::info!(
        "Using {} engine (available: {})",
        engine.name(),
        registry.list().join(", ")
    );

    let processor = DocumentProcessor::new(
        engine,
        Pipeline::new(config.preset),
        &config.images_dir,
        ResultsDir::new(&config.results_dir),
        open_store(config.store, &config.results_dir)?,
    );
    Ok((processor, registry.info()))
}

fn print_batch(summary: &BatchSummary) -> anyhow::Result<()> {
    for (name, outcome) in &summary.outcomes {
        match outcome {
            Ok(doc) => println!(
                "OK   {} -> {} ({}, {:.1}% confidence)",
                name,
                doc.result_path.display(),
                doc.doc_type,
                doc.confidence * 100.0
            ),
            Err(e) => println!("FAIL {}: {}", name, e),
        }
    }
    println!(
        "Processed {} document(s), {} failed",
        summary.processed, summary.failed
    );

    if summary.failed > 0 {
        bail!("{} of {} document(s) failed", summary.failed, summary.outcomes.len());
    }
    Ok(())
}

fn results_command(action: ResultsAction, config: &Config) -> anyhow::Result<()> {
    let results = ResultsDir::new(&config.results_dir);
    match action {
        ResultsAction::List => {
            let names = results.list();
            if names.is_empty() {
                println!("No results in {}", results.root().display());
            }
            for name in names {
                println!("{}", name);
            }
        }
        ResultsAction::Show { name } => print!("{}", results.read(&name)?),
        ResultsAction::Remove { name } => {
            results.remove(&name)?;
            println!("Removed {}", name);
        }
    }
    Ok(())
}

fn history_command(
    config: &Config,
    doc_type: Option<&str>,
    id: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(config.store, &config.results_dir)?;

    if let Some(id) = id {
        if store.kind() != StoreKind::Sqlite {
            bail!("Full records are only kept by the sqlite store");
        }
        let record = store
            .get(id)?
            .with_context(|| format!("No document with id {}", id))?;

        if json {
            println!("{}", serde_json::to_string_pretty(&record)?);
            return Ok(());
        }
        println!("ID:           {}", record.entry.id);
        println!("File:         {}", record.entry.file_name);
        println!("Type:         {}", record.entry.doc_type);
        println!(
            "Processed at: {}",
            record.entry.processed_at.format(history::csv_store::TIMESTAMP_FORMAT)
        );
        println!("Accuracy:     {:.2}%", record.entry.accuracy);
        if let Some(fields) = &record.fields {
            println!("CPF:          {}", fields.cpf.as_deref().unwrap_or("-"));
            println!("RG:           {}", fields.rg.as_deref().unwrap_or("-"));
            println!("Dates:        {}", fields.dates.join(", "));
            println!("Names:        {}", fields.names.join(", "));
        }
        println!();
        println!("{}", record.text);
        return Ok(());
    }

    let entries = store.list(doc_type)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!(
            "No documents in history ({})",
            store.location().display()
        );
        return Ok(());
    }

    println!(
        "{:<5} {:<30} {:<20} {:<20} {:>8}",
        "ID", "File", "Type", "Processed At", "Accuracy"
    );
    for entry in entries {
        println!(
            "{:<5} {:<30} {:<20} {:<20} {:>8.2}",
            entry.id,
            entry.file_name,
            entry.doc_type,
            entry.processed_at.format(history::csv_store::TIMESTAMP_FORMAT),
            entry.accuracy
        );
    }
    Ok(())
}

fn settings_command(
    action: &SettingsAction,
    paths: &[PathBuf],
    mut settings: Settings,
) -> anyhow::Result<()> {
    match action {
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Set { key, value } => {
            match key {
                SettingKey::ImagesDir => settings.images_dir = Some(PathBuf::from(value)),
                SettingKey::ResultsDir => settings.results_dir = Some(PathBuf::from(value)),
                SettingKey::Store => {
                    let store = StoreKind::from_str(value, true).map_err(anyhow::Error::msg)?;
                    settings.store = Some(store);
                }
                SettingKey::Language => settings.language = Some(value.clone()),
                SettingKey::Preset => {
                    let preset = Preset::from_str(value).with_context(|| {
                        format!(
                            "Unknown preset '{}'. Valid options: none, minimal, standard, aggressive",
                            value
                        )
                    })?;
                    settings.preset = Some(preset.as_str().to_string());
                }
            }
            let path = settings.save(paths)?;
            println!("Saved settings to {}", path.display());
        }
    }
    Ok(())
}
