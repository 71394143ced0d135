//! Main module for the `vect` CLI application.
//!
//! Loads the configuration, opens the store and dispatches the parsed subcommand.
//!
//! # Examples
//!
//! ```sh
//! vect init
//! vect add "Rust is a systems programming language."
//! vect add --file notes.txt
//! vect search "what is rust" -k 3
//! vect clear
//! ```

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::OnceCell;
use std::{env, error::Error, fs, path::Path};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use vect::commands::{Cli, Commands};
use vect::config::{self, VectConfig};
use vect::embedding::{EmbeddingProvider, MiniLm};
use vect::vector_store::VectorStore;

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    });
    run(Cli::parse())
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config_path = match cli.config {
        Some(path) => path,
        None => vect::config_dir()?.join("config.yaml"),
    };

    match cli.command {
        Commands::Init => init(&config_path)?,
        Commands::Add { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => fs::read_to_string(path)?,
                (None, None) => return Err("nothing to add".into()),
            };
            let vect_config = load_settings(&config_path)?;
            let mut store = VectorStore::open(vect_config.store_config())?;
            let chunker = vect_config.chunker()?;
            let model = load_model(&vect_config)?;

            let progress = ProgressBar::new(0);
            progress.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} chunks ({elapsed})")?,
            );
            let result =
                store.ingest_with(&model, chunker.as_ref(), &text, |stored, total| {
                    progress.set_length(total as u64);
                    progress.set_position(stored as u64);
                });
            progress.finish_and_clear();
            match result {
                Ok(stored) => println!("Stored {stored} chunks"),
                Err(e) => {
                    eprintln!("Stored {} chunks before failing", e.stored());
                    return Err(e.into());
                }
            }
        }
        Commands::Search { query, k } => {
            let vect_config = load_settings(&config_path)?;
            let store = VectorStore::open(vect_config.store_config())?;
            let model = load_model(&vect_config)?;
            let k = k.unwrap_or(vect_config.top_k);
            for hit in store.search_text(&model, &query, k)? {
                println!("{:.4}\t{}", hit.score, hit.text);
            }
        }
        Commands::Clear => {
            // No recovery first: clearing is how a store that fails to open is reset.
            let vect_config = load_settings(&config_path)?;
            let mut store = VectorStore::new(vect_config.store_config())?;
            store.clear()?;
            println!("Cleared {}", store.vector_path().display());
        }
        Commands::Stats => {
            let vect_config = load_settings(&config_path)?;
            let store = VectorStore::open(vect_config.store_config())?;
            let stats = store.stats()?;
            println!("vectors:  {}", stats.vectors);
            println!("records:  {}", stats.records);
            println!("bytes:    {}", stats.vector_bytes);
            println!("dimension {}", store.dimension());
        }
    }

    Ok(())
}

/// The config file if it exists, defaults otherwise, with environment overrides applied.
fn load_settings(config_path: &Path) -> Result<VectConfig, Box<dyn Error>> {
    let mut vect_config = if config_path.exists() {
        config::load_config(&config_path.to_string_lossy())?
    } else {
        debug!("No config at {}, using defaults", config_path.display());
        VectConfig::default()
    };
    vect_config.apply_overrides(|key| env::var(key).ok());
    debug!("Config loaded: {:?}", vect_config);
    Ok(vect_config)
}

fn load_model(config: &VectConfig) -> Result<MiniLm, Box<dyn Error>> {
    let model = MiniLm::load(&config.model_id, &config.model_revision)?;
    if model.dimension() != config.dimension {
        return Err(format!(
            "model {} produces {}-dimensional vectors but the store is configured for {}",
            config.model_id,
            model.dimension(),
            config.dimension
        )
        .into());
    }
    Ok(model)
}

/// Writes a default configuration file, creating its directory.
fn init(config_path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(dir) = config_path.parent() {
        info!("Creating config directory: {}", dir.display());
        fs::create_dir_all(dir)?;
    }

    info!("Creating config file: {}", config_path.display());
    let config_yaml = serde_yaml::to_string(&VectConfig::default())?;
    fs::write(config_path, config_yaml)?;
    println!("Wrote {}", config_path.display());

    Ok(())
}
