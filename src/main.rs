use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{info, warn};

use codegen_explorer::app::App;
use codegen_explorer::config::{AppConfig, LoggingConfig, WatcherConfig};
use codegen_explorer::error::{self, AppError};
use codegen_explorer::event::EventChannel;
use codegen_explorer::fs::path::NodePath;
use codegen_explorer::fs::reconciler::EventOutcome;
use codegen_explorer::fs::watcher::FsWatcher;
use codegen_explorer::logging;

/// Browse a directory as a lazily loaded explorer tree and keep it in sync
/// with changes on disk.
#[derive(Parser, Debug)]
#[command(name = "cgx", version, about)]
struct Cli {
    /// Root path to browse (defaults to the configured path, then the current directory)
    path: Option<PathBuf>,

    /// Explicit config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable filesystem watcher (print once and exit)
    #[arg(long)]
    no_watcher: bool,

    /// Folder to expand before printing; may be repeated
    #[arg(long, value_name = "PATH")]
    expand: Vec<PathBuf>,

    /// Apply newline-delimited JSON events before printing
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Log filter, e.g. "debug" (RUST_LOG takes precedence)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> AppConfig {
        AppConfig {
            watcher: WatcherConfig {
                enabled: self.no_watcher.then_some(false),
                ..Default::default()
            },
            logging: LoggingConfig {
                level: self.log_level.clone(),
            },
            ..Default::default()
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));
    logging::init(config.log_level());

    let requested = cli
        .path
        .clone()
        .or_else(|| config.general.default_path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let path = requested.canonicalize().map_err(|_| {
        AppError::InvalidPath(format!("{} does not exist", requested.display()))
    })?;

    let app = App::new(&path, &config);
    app.load().await;

    let root = app.current_dir();
    for folder in &cli.expand {
        let target = NodePath::from(resolve(&root, folder).as_path());
        let outcome = app.expand(&target).await;
        info!(%target, ?outcome, "expanded");
    }

    if let Some(replay) = &cli.replay {
        let outcomes = app.replay_file(replay).await?;
        info!(events = outcomes.len(), "replayed events");
    }

    print!("{}", app.render());

    if !config.watcher_enabled() {
        return Ok(());
    }

    let mut channel = EventChannel::new();
    let _watcher = match FsWatcher::new(&root, config.ignore_patterns(), channel.sender()) {
        Ok(watcher) => watcher,
        Err(e) => {
            warn!(error = %e, "watcher unavailable");
            return Ok(());
        }
    };
    info!(root = %root.display(), "watching for changes");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            Some(event) = channel.next() => {
                if !matches!(app.reconciler.apply(event), EventOutcome::Skipped(_)) {
                    println!();
                    print!("{}", app.render());
                }
            }
            _ = &mut shutdown => break,
        }
    }

    Ok(())
}
