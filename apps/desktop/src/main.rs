use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    controller::ControllerEvent, render::BoardView, BoardController, HttpBoardService,
    MemoryOrientationStore, OrientationStore,
};
use storage::Storage;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{
    parse_line, promotion_prompt, to_controller_commands, LineCommand, HELP,
};
use config::{load_settings, parse_side, validate, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "board-client", about = "Terminal client for a remote chess board service")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    /// `atomic` (default) asks for the promotion piece before sending the move;
    /// `follow_up` sends the move first and asks only after the service accepts it.
    #[arg(long)]
    promotion_mode: Option<String>,
    /// Side that owns the uppercase piece codes.
    #[arg(long)]
    uppercase_side: Option<String>,
    /// Keep the board orientation in memory only.
    #[arg(long)]
    no_persist: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config)?;
    if let Some(v) = args.server_url {
        settings.server_url = v;
    }
    if let Some(v) = args.database_url {
        settings.database_url = v;
    }
    if let Some(v) = args.poll_interval_ms {
        settings.poll_interval_ms = v;
    }
    if let Some(v) = args.promotion_mode {
        settings.promotion_mode = v.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(v) = args.uppercase_side {
        settings.uppercase_side = parse_side(&v)?;
    }
    validate(&settings)?;
    info!(server_url = %settings.server_url, "board client starting");

    let service = Arc::new(HttpBoardService::new(&settings.server_url)?);
    let store: Arc<dyn OrientationStore> = if args.no_persist {
        Arc::new(MemoryOrientationStore::default())
    } else {
        Arc::new(
            Storage::new(&settings.database_url)
                .await
                .context("failed to open preference store")?,
        )
    };

    let controller = BoardController::new(service, store, settings.controller_settings());
    let mut events = controller.subscribe();
    let handle = controller.start().await;

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut latest: Option<BoardView> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match parse_line(&line) {
                    Ok(command) => command,
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                };
                match command {
                    LineCommand::Quit => break,
                    LineCommand::Help => println!("{HELP}"),
                    LineCommand::Show => match &latest {
                        Some(view) => println!("{}", view.to_text()),
                        None => println!("no board received yet"),
                    },
                    other => match to_controller_commands(&other, latest.as_ref()) {
                        Ok(batch) => {
                            for command in batch {
                                handle.send(command).await?;
                            }
                        }
                        Err(err) => println!("{err}"),
                    },
                }
            }
            event = events.recv() => match event {
                Ok(event) => print_event(event, &mut latest),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.stop().await?;
    Ok(())
}

fn print_event(event: ControllerEvent, latest: &mut Option<BoardView>) {
    match event {
        ControllerEvent::Rendered { view, .. } => {
            // Polls re-deliver the same board every tick; only print changes.
            if latest.as_ref() != Some(&view) {
                println!("{}", view.to_text());
            }
            *latest = Some(view);
        }
        ControllerEvent::OrientationChanged { flipped } => {
            println!("orientation: {}", if flipped { "flipped" } else { "normal" });
        }
        ControllerEvent::Rejected { operation } => {
            println!("!! {}", operation.rejection_notice());
        }
        ControllerEvent::PromotionOpened { target } => {
            println!("{}", promotion_prompt(target));
        }
        ControllerEvent::PromotionClosed => println!("promotion closed"),
        ControllerEvent::History(entries) if entries.is_empty() => println!("no moves yet"),
        ControllerEvent::History(entries) => {
            for (n, entry) in entries.iter().enumerate() {
                let captured = entry
                    .captured
                    .map(|piece| format!(" x{piece}"))
                    .unwrap_or_default();
                println!(
                    "{:>3}. {} {} {} -> {}{captured}",
                    n + 1,
                    entry.player,
                    entry.piece,
                    entry.source,
                    entry.target
                );
            }
        }
    }
}
