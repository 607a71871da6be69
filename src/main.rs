//! Squeeze Control - command-line host
//!
//! Connects to the configured server, logs session events and reads simple
//! commands from stdin.

use squeeze_control::bus::{self, BusSink, ClientEvent};
use squeeze_control::config::{
    self, PreferenceStore, PREF_DEBUG_LOGGING, PREF_NOTIFY_ON_CONNECTION,
};
use squeeze_control::hooks::LoggingHooks;
use squeeze_control::SessionManager;

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "commands: play | pause | stop | next | prev | vol <+n|-n> | players | \
                    player <id> | status | connect <host[:port]> | disconnect | \
                    debug <on|off> | notify <on|off> | quit";

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Squeeze Control v{} ({})",
        env!("SQC_VERSION"),
        env!("SQC_GIT_SHA")
    );

    let prefs = Arc::new(PreferenceStore::load(PreferenceStore::default_path()));
    let manager = SessionManager::new(prefs.clone(), Arc::new(LoggingHooks::new()));

    let bus = bus::create_bus();
    let mut events = bus.subscribe();
    let observer = manager.attach_observer(Arc::new(BusSink::new(bus.clone())));
    tracing::info!("Event bus initialized");

    match config.server.as_deref() {
        Some(server) => {
            if let Err(e) = manager.start_connect(server) {
                tracing::warn!("Configured server '{}' is unusable: {}", server, e);
            }
        }
        None => tracing::info!("No server configured; use `connect <host[:port]>`"),
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(event) => log_event(&manager, &prefs, &event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Event log fell behind, {} events skipped", missed);
                }
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if run_command(&manager, &prefs, line.trim()) == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!("stdin closed, running until Ctrl+C");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    tracing::info!("Shutting down...");
    manager.detach_observer(observer);
    manager.shutdown();
    tracing::info!("Shutdown complete");

    Ok(())
}

fn log_event(manager: &SessionManager, prefs: &PreferenceStore, event: &ClientEvent) {
    match serde_json::to_string(event) {
        Ok(json) => tracing::info!("event: {}", json),
        Err(e) => tracing::warn!("Failed to serialize {:?}: {}", event, e),
    }

    match event {
        ClientEvent::PlayersDiscovered => {
            if let (Some(id), Some(name)) =
                (manager.active_player_id(), manager.active_player_name())
            {
                tracing::info!("Steering player {} ({})", name, id);
                if let Err(e) = prefs.set_last_player(&id) {
                    tracing::warn!("Failed to save last player: {:#}", e);
                }
            }
        }
        ClientEvent::MusicChanged => {
            tracing::info!(
                "{} - {} [{}] {}",
                manager.current_artist(),
                manager.current_song(),
                manager.current_album(),
                manager.current_album_art_url()
            );
        }
        _ => {}
    }
}

fn run_command(manager: &SessionManager, prefs: &PreferenceStore, line: &str) -> Flow {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Flow::Continue;
    };
    let arg = parts.next();

    let sent = match (command, arg) {
        ("play", _) => manager.play(),
        ("pause", _) => manager.toggle_pause_play(),
        ("stop", _) => manager.stop(),
        ("next", _) => manager.next_track(),
        ("prev", _) => manager.previous_track(),
        ("vol", Some(delta)) => match delta.parse::<i32>() {
            Ok(delta) => manager.adjust_volume_by(delta),
            Err(_) => {
                println!("usage: vol <+n|-n>");
                return Flow::Continue;
            }
        },
        ("players", _) => {
            print_players(manager);
            return Flow::Continue;
        }
        ("player", Some(id)) => {
            if !manager.change_active_player(id) {
                println!("not connected");
                return Flow::Continue;
            }
            manager.refresh_subscription();
            if let Err(e) = prefs.set_last_player(id) {
                tracing::warn!("Failed to save last player: {:#}", e);
            }
            true
        }
        ("status", _) => {
            print_status(manager);
            return Flow::Continue;
        }
        ("connect", Some(address)) => {
            if let Err(e) = manager.start_connect(address) {
                println!("{}", e);
            }
            return Flow::Continue;
        }
        ("disconnect", _) => {
            manager.disconnect();
            return Flow::Continue;
        }
        ("debug", Some(flag)) => {
            toggle_preference(manager, PREF_DEBUG_LOGGING, flag, |on| {
                prefs.set_debug_logging(on)
            });
            return Flow::Continue;
        }
        ("notify", Some(flag)) => {
            toggle_preference(manager, PREF_NOTIFY_ON_CONNECTION, flag, |on| {
                prefs.set_notify_on_connection(on)
            });
            return Flow::Continue;
        }
        ("quit" | "exit", _) => return Flow::Quit,
        _ => {
            println!("{}", HELP);
            return Flow::Continue;
        }
    };

    if !sent {
        println!("{}: not sent (not connected, no player, or not playing)", command);
    }
    Flow::Continue
}

fn toggle_preference(
    manager: &SessionManager,
    key: &str,
    flag: &str,
    set: impl FnOnce(bool) -> Result<bool>,
) {
    let on = match flag {
        "on" => true,
        "off" => false,
        _ => {
            println!("usage: {} <on|off>", key);
            return;
        }
    };
    match set(on) {
        Ok(true) => manager.on_preference_changed(key),
        Ok(false) => {}
        Err(e) => tracing::warn!("Failed to save preference {}: {:#}", key, e),
    }
}

fn print_players(manager: &SessionManager) {
    let Some(players) = manager.players() else {
        println!("no player list yet");
        return;
    };
    let active = manager.active_player_id();
    for player in players {
        let marker = if active.as_deref() == Some(player.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {}  {}", marker, player.id, player.name);
    }
}

fn print_status(manager: &SessionManager) {
    println!(
        "connected={} playing={} player={} volume={}",
        manager.is_connected(),
        manager.is_playing(),
        manager.active_player_name().unwrap_or_default(),
        manager.current_volume()
    );
    println!(
        "{} - {} [{}] {}/{}s",
        manager.current_artist(),
        manager.current_song(),
        manager.current_album(),
        manager.seconds_elapsed(),
        manager.seconds_total()
    );
    let art = manager.current_album_art_url();
    if !art.is_empty() {
        println!("art: {}", art);
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
