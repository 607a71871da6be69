//! One socket's lifetime: the writer task, the read loop and the handle that
//! ties them to a connection generation.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::Inner;
use crate::protocol::encode;

/// Batches waiting for the writer task
const COMMAND_QUEUE_DEPTH: usize = 64;

/// Handle to a live (or closing) connection
pub(crate) struct ConnectionSession {
    generation: u64,
    host: String,
    port: u16,
    commands: mpsc::Sender<Vec<String>>,
    active_player: ArcSwapOption<String>,
    cancel: CancellationToken,
}

impl ConnectionSession {
    /// Spawn the writer task for `writer`. The read loop is started
    /// separately once the session is published.
    pub(crate) fn spawn_writer(
        writer: OwnedWriteHalf,
        generation: u64,
        host: String,
        port: u16,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        tokio::spawn(write_loop(writer, rx, cancel.clone(), generation));
        Arc::new(Self {
            generation,
            host,
            port,
            commands,
            active_player: ArcSwapOption::empty(),
            cancel,
        })
    }

    /// A session without a socket; the receiver sees every batch sent.
    #[cfg(test)]
    pub(crate) fn detached(generation: u64) -> (Arc<Self>, mpsc::Receiver<Vec<String>>) {
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let session = Arc::new(Self {
            generation,
            host: "test".to_string(),
            port: super::DEFAULT_CLI_PORT,
            commands,
            active_player: ArcSwapOption::empty(),
            cancel: CancellationToken::new(),
        });
        (session, rx)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Queue `commands` to be written in one go. Returns false when the
    /// session is closing or the queue is full.
    pub(crate) fn send(&self, commands: Vec<String>) -> bool {
        if commands.is_empty() || self.cancel.is_cancelled() {
            return false;
        }
        match self.commands.try_send(commands) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!("Command queue full, dropping {:?}", dropped);
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Writer for {} already stopped", self.address());
                false
            }
        }
    }

    /// Send `<encoded player id> <command>` to the active player.
    pub(crate) fn send_player_command(&self, command: &str) -> bool {
        match self.active_player() {
            Some(player_id) if !player_id.is_empty() => {
                self.send(vec![format!("{} {}", encode(&player_id), command)])
            }
            _ => false,
        }
    }

    pub(crate) fn active_player(&self) -> Option<Arc<String>> {
        self.active_player.load_full()
    }

    pub(crate) fn set_active_player(&self, player_id: Option<String>) {
        tracing::info!("Active player is now: {:?}", player_id);
        self.active_player.store(player_id.map(Arc::new));
    }

    pub(crate) fn close(&self) {
        self.cancel.cancel();
    }

    pub(crate) async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Drain command batches onto the socket. A write error closes the session
/// so the read loop notices.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<Vec<String>>,
    cancel: CancellationToken,
    generation: u64,
) {
    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            batch = rx.recv() => match batch {
                Some(batch) => batch,
                None => break,
            },
        };

        let mut payload = String::new();
        for command in &batch {
            tracing::debug!("SENDING: {}", command);
            payload.push_str(command);
            payload.push('\n');
        }

        let written = match writer.write_all(payload.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!("Write failed on connection {}: {}", generation, e);
            cancel.cancel();
            break;
        }
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!("Socket shutdown for connection {}: {}", generation, e);
    }
    tracing::debug!("Writer for connection {} stopped", generation);
}

/// Read lines until the socket closes or the session is cancelled, handing
/// each one to the dispatcher in arrival order. Cancellation wins over
/// buffered input, and nothing is dispatched once the generation moved on.
pub(crate) async fn read_loop(
    inner: Arc<Inner>,
    session: Arc<ConnectionSession>,
    reader: OwnedReadHalf,
) {
    let generation = session.generation();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = session.cancelled() => {
                tracing::debug!("Read loop {} cancelled", generation);
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => {
                tracing::info!("Server at {} closed the connection", session.address());
                break;
            }
            Ok(_) => {
                // Lines still buffered from a superseded socket are dropped
                if !inner.is_current(generation) {
                    tracing::debug!("Read loop {} superseded, dropping buffered input", generation);
                    break;
                }
                let line = String::from_utf8_lossy(&buf);
                inner.handle_line(&session, line.trim_end_matches(['\r', '\n']));
            }
            Err(e) => {
                tracing::warn!("Read failed on connection {}: {}", generation, e);
                break;
            }
        }
    }

    session.close();
    inner.disconnect_if_current(generation);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_commands_need_an_active_player() {
        let (session, mut rx) = ConnectionSession::detached(1);
        assert!(!session.send_player_command("play"));

        session.set_active_player(Some(String::new()));
        assert!(!session.send_player_command("play"));

        session.set_active_player(Some("00:04:20:aa:bb:cc".to_string()));
        assert!(session.send_player_command("play"));
        assert_eq!(
            rx.try_recv().unwrap(),
            vec!["00%3A04%3A20%3Aaa%3Abb%3Acc play".to_string()]
        );
    }

    #[test]
    fn batches_stay_together() {
        let (session, mut rx) = ConnectionSession::detached(1);
        assert!(session.send(vec!["listen 1".to_string(), "players 0 100".to_string()]));
        assert_eq!(rx.try_recv().unwrap().len(), 2);
    }

    #[test]
    fn closed_session_drops_commands() {
        let (session, mut rx) = ConnectionSession::detached(1);
        session.close();
        assert!(!session.send(vec!["listen 1".to_string()]));
        assert!(!session.send(vec![]));
        assert!(rx.try_recv().is_err());
    }
}
