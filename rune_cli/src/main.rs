use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use rune_core::{
    export_file_path, load_catalog_from_env, load_registry_config, Clock, CommandEffect,
    FileStore, InventoryFilter, InventoryView, Notice, Registry, RegistryError, SystemClock,
};
use rune_runtime::{
    encode_export_json, parse_command_line, CommandParseError, ExportDocument, MemberId,
    RegistryCommand,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

mod app;
mod render;
mod shell;
mod ui;

use app::{WatchApp, WatchCommand, WatchFrame};

#[derive(Clone)]
struct ChannelWriter {
    sender: Sender<String>,
}

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = String::from_utf8(buf.to_vec()) {
            let _ = self.sender.send(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Anonymous rune-fragment registry", long_about = None)]
struct Cli {
    /// Directory holding the persisted registry blob.
    #[arg(long, global = true, default_value = "rune-data")]
    store: PathBuf,
    /// Registry config file; falls back to RUNE_REGISTRY_CONFIG_PATH, then
    /// the builtin config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one command line, e.g. `exec declare Jean Dupont Vie:Rare:1/4:2`.
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        line: Vec<String>,
        /// Log in before running the command.
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Interactive session reading command lines from stdin.
    Shell,
    /// Public aggregate inventory.
    Inventory {
        #[arg(long = "type")]
        rune_type: Option<String>,
        #[arg(long)]
        rarity: Option<String>,
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
    },
    Stats,
    Catalog,
    /// Corps stock and open exchange requests.
    Corps,
    Logs {
        #[arg(long)]
        passphrase: String,
    },
    Members {
        #[arg(long)]
        passphrase: String,
        /// Show one member's inventory in full.
        #[arg(long)]
        member: Option<u64>,
    },
    Export {
        #[arg(long)]
        passphrase: String,
        /// Target file, or a directory for `runes-export-<millis>.json`.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Live dashboard refreshed on an interval.
    Watch {
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long = "type")]
        rune_type: Option<String>,
        #[arg(long)]
        rarity: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ViewArg {
    Complete,
    Sparse,
}

impl From<ViewArg> for InventoryView {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::Complete => InventoryView::Complete,
            ViewArg::Sparse => InventoryView::Sparse,
        }
    }
}

type FileRegistry = Registry<FileStore>;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let log_rx = if matches!(cli.command, Command::Watch { .. }) {
        let (log_tx, log_rx) = mpsc::channel::<String>();
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .with_writer(move || ChannelWriter {
                sender: log_tx.clone(),
            })
            .init();
        Some(log_rx)
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .with_writer(std::io::stderr)
            .init();
        None
    };

    let mut registry = open_registry(&cli.store, cli.config.as_deref());

    let outcome = match cli.command {
        Command::Exec { line, passphrase } => match exec_command(&line) {
            Ok(command) => login_with(&mut registry, passphrase.as_deref())
                .and_then(|()| run_command(&mut registry, command)),
            Err(err) => {
                eprintln!("error: {err}");
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Shell => {
            shell::run(&mut registry).await?;
            Ok(())
        }
        Command::Inventory {
            rune_type,
            rarity,
            view,
        } => {
            let view = view
                .map(InventoryView::from)
                .unwrap_or_else(|| registry.config().inventory_view());
            let filter = InventoryFilter { rune_type, rarity };
            print!(
                "{}",
                render::inventory_table(&registry.public_inventory_as(view), &filter)
            );
            Ok(())
        }
        Command::Stats => {
            print!("{}", render::stats(&registry.stats()));
            Ok(())
        }
        Command::Catalog => {
            print!("{}", render::catalog(registry.catalog()));
            Ok(())
        }
        Command::Corps => {
            print!(
                "{}",
                render::corps(registry.corps_stock(), registry.exchange_requests())
            );
            Ok(())
        }
        Command::Logs { passphrase } => login_with(&mut registry, Some(&passphrase))
            .and_then(|()| registry.activity_logs().map(render::logs))
            .map(|text| print!("{text}")),
        Command::Members { passphrase, member } => login_with(&mut registry, Some(&passphrase))
            .and_then(|()| match member {
                Some(id) => registry.member_details(MemberId(id)).map(render::member),
                None => registry
                    .members()
                    .map(|members| render::members(members, registry.catalog())),
            })
            .map(|text| print!("{text}")),
        Command::Export { passphrase, out } => login_with(&mut registry, Some(&passphrase))
            .and_then(|()| export(&mut registry, out.as_deref())),
        Command::Watch {
            interval_ms,
            rune_type,
            rarity,
        } => {
            let log_rx = log_rx.unwrap_or_else(|| mpsc::channel().1);
            let filter = InventoryFilter { rune_type, rarity };
            run_watch(registry, log_rx, interval_ms, filter).await?;
            Ok(())
        }
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("error: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn open_registry(store: &Path, config_path: Option<&Path>) -> FileRegistry {
    let (config, _) = load_registry_config(config_path);
    let (catalog, _) = load_catalog_from_env();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (registry, notices) = Registry::open(FileStore::new(store), catalog, config, clock);
    report_notices(&notices);
    registry
}

fn report_notices(notices: &[Notice]) {
    for notice in notices {
        eprintln!("notice: {notice}");
    }
}

fn login_with(registry: &mut FileRegistry, passphrase: Option<&str>) -> Result<(), RegistryError> {
    let Some(passphrase) = passphrase else {
        return Ok(());
    };
    let outcome = registry.execute(RegistryCommand::Login {
        passphrase: passphrase.to_string(),
    })?;
    report_notices(&outcome.notices);
    Ok(())
}

/// Re-quotes arguments the shell already split so the command grammar sees
/// multi-word rune types as one token.
fn join_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.chars().any(char::is_whitespace) {
                quote_type(arg)
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_type(arg: &str) -> String {
    // `Vol de vie:Rare:1/4:2` keeps its colon fields outside the quotes.
    match arg.split_once(':') {
        Some((rune_type, rest)) if rune_type.chars().any(char::is_whitespace) => {
            format!("\"{rune_type}\":{rest}")
        }
        _ => format!("\"{arg}\""),
    }
}

fn exec_command(args: &[String]) -> Result<RegistryCommand, CommandParseError> {
    parse_command_line(&join_args(args))
}

fn run_command(registry: &mut FileRegistry, command: RegistryCommand) -> Result<(), RegistryError> {
    let outcome = registry.execute(command)?;
    report_notices(&outcome.notices);
    if let CommandEffect::Exported(document) = &outcome.effect {
        write_export(document, None);
    } else {
        print!("{}", render::outcome(&outcome.effect));
    }
    Ok(())
}

fn export(registry: &mut FileRegistry, out: Option<&Path>) -> Result<(), RegistryError> {
    let outcome = registry.execute(RegistryCommand::Export)?;
    report_notices(&outcome.notices);
    if let CommandEffect::Exported(document) = &outcome.effect {
        write_export(document, out);
    }
    Ok(())
}

fn write_export(document: &ExportDocument, out: Option<&Path>) {
    let path = match out {
        Some(path) if path.extension().is_some_and(|ext| ext == "json") => path.to_path_buf(),
        Some(dir) => export_file_path(dir, SystemClock.now()),
        None => export_file_path(Path::new("."), SystemClock.now()),
    };
    let written = encode_export_json(document)
        .map_err(|err| err.to_string())
        .and_then(|json| std::fs::write(&path, json).map_err(|err| err.to_string()));
    match written {
        Ok(()) => {
            info!(path = %path.display(), members = document.members.len(), "export.written");
            println!("exported {} members to {}", document.members.len(), path.display());
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "export.write_failed");
            eprintln!("error: could not write {}: {err}", path.display());
        }
    }
}

async fn run_watch(
    mut registry: FileRegistry,
    log_rx: Receiver<String>,
    interval_ms: Option<u64>,
    filter: InventoryFilter,
) -> Result<()> {
    let interval = interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| registry.config().refresh_interval());
    info!(interval_ms = interval.as_millis() as u64, "watch.started");

    let (frame_tx, frame_rx) = unbounded_channel::<WatchFrame>();
    let (command_tx, command_rx) = unbounded_channel::<WatchCommand>();
    let storage_key = registry.config().storage_key().to_string();

    let ui_handle = std::thread::spawn(move || -> color_eyre::Result<()> {
        let app = WatchApp::new(frame_rx, command_tx, log_rx, storage_key, filter)?;
        app.run()
    });

    pump_refreshes(&mut registry, interval, frame_tx, command_rx).await;

    match ui_handle.join() {
        Ok(result) => result,
        Err(_) => {
            warn!("watch.ui_panicked");
            Ok(())
        }
    }
}

/// Refreshes on every tick and on demand, pushing a frame to the UI each
/// time. Ends when the UI asks to quit or goes away.
async fn pump_refreshes(
    registry: &mut FileRegistry,
    interval: Duration,
    frames: UnboundedSender<WatchFrame>,
    mut commands: UnboundedReceiver<WatchCommand>,
) {
    let mut ticker = tokio::time::interval(interval);
    let mut view = registry.config().inventory_view();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            command = commands.recv() => match command {
                Some(WatchCommand::RefreshNow) => {}
                Some(WatchCommand::ToggleView) => {
                    view = match view {
                        InventoryView::Complete => InventoryView::Sparse,
                        InventoryView::Sparse => InventoryView::Complete,
                    };
                }
                Some(WatchCommand::Quit) | None => break,
            },
        }

        let (changed, notices) = registry.refresh();
        let frame = WatchFrame {
            inventory: registry.public_inventory_as(view),
            stats: registry.stats(),
            view,
            changed,
            refreshed_at: rune_core::clock::timestamp(SystemClock.now()),
            notices: notices.iter().map(ToString::to_string).collect(),
        };
        if frames.send(frame).is_err() {
            break;
        }
    }
}
