use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use mapify::config::AppConfig;
use mapify::palette::ColorRamp;

#[derive(Parser, Debug)]
#[command(name = "mapify")]
#[command(about = "Classify, style and filter point data for thematic maps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print per-feature styles of the configured layer
    Styles {
        #[arg(short, long, value_name = "FILE", default_value = "map.toml")]
        config: PathBuf,
    },
    /// Print the map legend
    Legend {
        #[arg(short, long, value_name = "FILE", default_value = "map.toml")]
        config: PathBuf,
    },
    /// Apply the configured filters and print their outcomes
    Filter {
        #[arg(short, long, value_name = "FILE", default_value = "map.toml")]
        config: PathBuf,
    },
    /// Print the save bundle of the configured map
    Save {
        #[arg(short, long, value_name = "FILE", default_value = "map.toml")]
        config: PathBuf,
    },
    /// List the available color schemes
    Schemes,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Styles { config } => {
            let (app_config, base_dir) = load_config(config)?;
            let (state, layer) = app_config.build_state(&base_dir)?;
            let styles = state.render(layer).context("Failed to render layer")?;
            write_json(&styles)
        }
        Commands::Legend { config } => {
            let (app_config, base_dir) = load_config(config)?;
            let (state, _) = app_config.build_state(&base_dir)?;
            write_json(&state.legend())
        }
        Commands::Filter { config } => {
            let (app_config, base_dir) = load_config(config)?;
            let (mut state, layer) = app_config.build_state(&base_dir)?;
            let outcomes = app_config
                .apply_filters(&mut state, layer)
                .context("Failed to apply filters")?;
            write_json(&outcomes)
        }
        Commands::Save { config } => {
            let (app_config, base_dir) = load_config(config)?;
            let (mut state, layer) = app_config.build_state(&base_dir)?;
            app_config.apply_filters(&mut state, layer)?;
            write_json(&state.to_save_data())
        }
        Commands::Schemes => {
            let names: Vec<&str> = ColorRamp::names().collect();
            write_json(&names)
        }
    }
}

fn load_config(path: &Path) -> Result<(AppConfig, PathBuf)> {
    let config = AppConfig::load_from_file(path)?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok((config, base_dir))
}

fn write_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json).context("Failed to write JSON to stdout")?;
    handle.flush().context("Failed to flush stdout")?;

    Ok(())
}
