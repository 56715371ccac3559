use clap::Parser;
use mapexport::{ExportConfig, ExportPipeline, KeyTable, open_store};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Экспорт снимка карты мира из дампа кэша
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Строка версии снимка (по умолчанию — из конфигурации или 2024-04-10_a)
    #[arg(value_name = "VERSION", id = "snapshot_version")]
    snapshot_version: Option<String>,

    /// Путь к конфигурационному файлу в формате TOML
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Каталог с дампом кэша
    #[arg(long)]
    cache: Option<PathBuf>,

    /// JSON-файл с ключами регионов
    #[arg(long)]
    keys: Option<PathBuf>,

    /// Корень вывода (снимок пишется в <out>/<version>)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn run(cli: Cli) -> mapexport::Result<()> {
    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "загрузка конфигурации");
            ExportConfig::from_toml_file(path)?
        }
        None => ExportConfig::default(),
    };
    if let Some(version) = cli.snapshot_version {
        config.version = version;
    }
    if let Some(cache) = cli.cache {
        config.cache_dir = cache;
    }
    if let Some(keys) = cli.keys {
        config.keys_path = keys;
    }
    if let Some(out) = cli.out {
        config.out_dir = out;
    }

    let store = open_store(&config.cache_dir)?;
    let keys = KeyTable::load(&config.keys_path)?;
    info!(keys = keys.len(), "ключи регионов загружены");

    ExportPipeline::new(&store, config).run(&keys)?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => {
            info!("Готово!");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "экспорт прерван");
            ExitCode::FAILURE
        }
    }
}
