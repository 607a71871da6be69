//! Mock LMS CLI server for testing
//!
//! Speaks the line protocol on a loopback TCP port: answers the handshake,
//! records every command it receives and lets the test push lines or hang up.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const HTTP_PORT: u16 = 9000;

#[derive(Debug, Clone)]
enum Push {
    Line(String),
    HangUp,
}

struct MockCliState {
    /// Player id (decoded) and name, in listing order
    players: Vec<(String, String)>,
    received: Mutex<Vec<String>>,
    connections: AtomicUsize,
}

/// Mock LMS CLI server
pub struct MockCliServer {
    addr: SocketAddr,
    state: Arc<MockCliState>,
    push: broadcast::Sender<Push>,
    handle: JoinHandle<()>,
}

impl MockCliServer {
    /// Start a mock CLI server on a random port
    pub async fn start(players: &[(&str, &str)]) -> Self {
        let state = Arc::new(MockCliState {
            players: players
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
            received: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
        });
        let (push, _) = broadcast::channel(64);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_state = state.clone();
        let accept_push = push.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_state.connections.fetch_add(1, Ordering::SeqCst);
                let pushes = accept_push.subscribe();
                tokio::spawn(serve_connection(stream, accept_state.clone(), pushes));
            }
        });

        Self {
            addr,
            state,
            push,
            handle,
        }
    }

    /// `host:port` for `start_connect`
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Write `line` to every open connection
    pub fn push(&self, line: &str) {
        self.push
            .send(Push::Line(line.to_string()))
            .expect("no open connection to push to");
    }

    /// Close every open connection from the server side
    pub fn hang_up(&self) {
        self.push
            .send(Push::HangUp)
            .expect("no open connection to hang up");
    }

    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().unwrap().clone()
    }

    /// Wait until a command equal to `expected` has been received
    pub async fn wait_for_command(&self, expected: &str) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while tokio::time::Instant::now() < deadline {
            if self.received().iter().any(|line| line == expected) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// The reply LMS gives to `players 0 100`
    fn player_list_line(players: &[(String, String)]) -> String {
        let mut line = format!("players 0 100 count%3A{}", players.len());
        for (index, (id, name)) in players.iter().enumerate() {
            line.push_str(&format!(
                " playerindex%3A{} playerid%3A{} name%3A{} model%3Asqueezelite",
                index,
                urlencoding::encode(id),
                urlencoding::encode(name)
            ));
        }
        line
    }
}

impl Drop for MockCliServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_connection(
    stream: TcpStream,
    state: Arc<MockCliState>,
    mut pushes: broadcast::Receiver<Push>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    _ => break,
                };
                state.received.lock().unwrap().push(line.clone());
                let reply = match line.as_str() {
                    "players 0 100" => Some(MockCliServer::player_list_line(&state.players)),
                    "pref httpport ?" => Some(format!("pref httpport {}", HTTP_PORT)),
                    "listen 1" => Some("listen 1".to_string()),
                    _ => None,
                };
                if let Some(reply) = reply {
                    if writer.write_all(format!("{}\n", reply).as_bytes()).await.is_err() {
                        break;
                    }
                }
            }
            push = pushes.recv() => match push {
                Ok(Push::Line(line)) => {
                    if writer.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                        break;
                    }
                }
                Ok(Push::HangUp) | Err(_) => break,
            },
        }
    }
}
