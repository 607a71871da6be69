//! Session manager for the LMS CLI
//!
//! Owns at most one connection to the server. Every connect attempt and
//! every explicit disconnect bumps a generation counter; a read loop only
//! reports a lost connection while its own generation is still current, so
//! a socket torn down on purpose dies quietly.
//!
//! Tasks:
//! - one connect worker, fed by a bounded queue, so attempts never overlap
//! - per connection, one read loop and one writer task
//!
//! Callers never block on those tasks: state lives in atomics and
//! `ArcSwap`s, and commands are queued to the writer.

mod connection;
mod dispatch;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Settings, PREF_DEBUG_LOGGING, PREF_NOTIFY_ON_CONNECTION};
use crate::error::AddressError;
use crate::hooks::SessionHooks;
use crate::players::{PlayerInfo, PlayerRegistry};
use crate::sink::{EventSink, ObserverSlot, ObserverToken};
use crate::state::PlaybackState;
use connection::{read_loop, ConnectionSession};

/// Default CLI port
pub const DEFAULT_CLI_PORT: u16 = 9090;

/// Upper bound for one TCP connect attempt
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(4000);

const CONNECT_QUEUE_DEPTH: usize = 8;

/// Sent as one batch right after connecting
const HANDSHAKE: [&str; 3] = [
    "listen 1",
    // first 100 players
    "players 0 100",
    // needed for artwork URLs
    "pref httpport ?",
];

/// Split `host[:port]`, defaulting the port to 9090.
pub fn parse_server_address(host_port: &str) -> Result<(String, u16), AddressError> {
    let host_port = host_port.trim();
    let (host, port) = match host_port.split_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| AddressError::InvalidPort(host_port.to_string()))?;
            (host, port)
        }
        None => (host_port, DEFAULT_CLI_PORT),
    };
    if host.is_empty() {
        return Err(AddressError::Empty);
    }
    Ok((host.to_string(), port))
}

struct ConnectRequest {
    generation: u64,
    host: String,
    port: u16,
}

/// Client-side controller for one LMS server and one active player.
///
/// Must be created inside a tokio runtime. Dropping the manager shuts it
/// down.
pub struct SessionManager {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    generation: AtomicU64,
    session: ArcSwapOption<ConnectionSession>,
    connected: AtomicBool,
    state: PlaybackState,
    players: PlayerRegistry,
    observers: ObserverSlot,
    settings: Arc<dyn Settings>,
    hooks: Arc<dyn SessionHooks>,
    debug_logging: AtomicBool,
    connect_tx: mpsc::Sender<ConnectRequest>,
    shutdown: CancellationToken,
}

impl SessionManager {
    pub fn new(settings: Arc<dyn Settings>, hooks: Arc<dyn SessionHooks>) -> Self {
        let (connect_tx, connect_rx) = mpsc::channel(CONNECT_QUEUE_DEPTH);
        let shutdown = CancellationToken::new();
        let inner = Arc::new(Inner::new(settings, hooks, connect_tx, shutdown.clone()));

        // Clear a leftover indicator from a previous run
        inner.hooks.clear_now_playing();

        tokio::spawn(connect_worker(Arc::downgrade(&inner), connect_rx, shutdown));

        Self { inner }
    }

    /// Tear down any current connection and queue a connect to `host_port`.
    ///
    /// The outcome arrives as `on_connection_changed(_, post_connect = true)`.
    pub fn start_connect(&self, host_port: &str) -> Result<(), AddressError> {
        let (host, port) = parse_server_address(host_port)?;
        self.inner.disconnect();

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.set_host(&host);
        info!("Queueing connect to {}:{} (connection {})", host, port, generation);

        let request = ConnectRequest {
            generation,
            host,
            port,
        };
        match self.inner.connect_tx.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Connect queue full, dropping attempt {}", generation);
                self.inner.connect_failed(generation);
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Connect worker stopped, dropping attempt {}", generation);
                self.inner.connect_failed(generation);
            }
        }
        Ok(())
    }

    /// Close the current connection, if any. Idempotent.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Write raw CLI commands as one batch. No-op when disconnected.
    pub fn send(&self, commands: &[&str]) -> bool {
        match self.inner.session.load_full() {
            Some(session) => session.send(commands.iter().map(|c| c.to_string()).collect()),
            None => false,
        }
    }

    /// Send `command` prefixed with the active player id
    pub fn send_player_command(&self, command: &str) -> bool {
        self.inner.send_player_command(command)
    }

    pub fn toggle_pause_play(&self) -> bool {
        self.send_player_command("pause")
    }

    pub fn play(&self) -> bool {
        self.send_player_command("play")
    }

    pub fn stop(&self) -> bool {
        self.send_player_command("stop")
    }

    pub fn next_track(&self) -> bool {
        if !self.is_connected() || !self.is_playing() {
            return false;
        }
        self.send_player_command("button jump_fwd")
    }

    pub fn previous_track(&self) -> bool {
        if !self.is_connected() || !self.is_playing() {
            return false;
        }
        self.send_player_command("button jump_rew")
    }

    /// Relative volume change, e.g. `+5` or `-5`
    pub fn adjust_volume_by(&self, delta: i32) -> bool {
        self.send_player_command(&format!("mixer volume {:+}", delta))
    }

    /// Steer `player_id` from now on. Does not resubscribe; follow with
    /// [`refresh_subscription`](Self::refresh_subscription) to receive its
    /// status pushes.
    pub fn change_active_player(&self, player_id: &str) -> bool {
        match self.inner.session.load_full() {
            Some(session) if self.is_connected() => {
                session.set_active_player(Some(player_id.to_string()));
                true
            }
            _ => false,
        }
    }

    /// Subscribe the active player to status pushes if an observer is
    /// attached, unsubscribe it otherwise.
    pub fn refresh_subscription(&self) {
        self.inner.update_subscription();
    }

    /// Replace the observer. Returns the token needed to detach it.
    pub fn attach_observer(&self, sink: Arc<dyn EventSink>) -> ObserverToken {
        let token = self.inner.observers.attach(sink);
        debug!("Observer attached");
        self.inner.update_subscription();
        token
    }

    /// Detach the observer registered under `token`, if it is still current.
    pub fn detach_observer(&self, token: ObserverToken) -> bool {
        let detached = self.inner.observers.detach(token);
        debug!("Observer detach, was current: {}", detached);
        self.inner.update_subscription();
        detached
    }

    /// React to a preference change made by the host
    pub fn on_preference_changed(&self, key: &str) {
        debug!("Preference changed: {}", key);
        match key {
            PREF_NOTIFY_ON_CONNECTION => self.inner.update_indicator(),
            PREF_DEBUG_LOGGING => self
                .inner
                .debug_logging
                .store(self.inner.settings.debug_logging(), Ordering::SeqCst),
            _ => {}
        }
    }

    /// Disconnect, drop the observer and stop every task.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.inner.state.is_playing()
    }

    pub fn current_artist(&self) -> String {
        self.inner.state.artist()
    }

    pub fn current_album(&self) -> String {
        self.inner.state.album()
    }

    pub fn current_song(&self) -> String {
        self.inner.state.song()
    }

    pub fn current_album_art_url(&self) -> String {
        let player = self.inner.active_player();
        self.inner.state.album_art_url(player.as_deref().map(String::as_str))
    }

    pub fn seconds_elapsed(&self) -> i32 {
        self.inner.state.elapsed_seconds()
    }

    pub fn seconds_total(&self) -> i32 {
        self.inner.state.duration_seconds()
    }

    pub fn current_volume(&self) -> i32 {
        self.inner.state.volume()
    }

    /// `None` until the server has listed its players
    pub fn players(&self) -> Option<Vec<PlayerInfo>> {
        self.inner.players.snapshot()
    }

    pub fn active_player_id(&self) -> Option<String> {
        self.inner.active_player().map(|id| id.as_ref().clone())
    }

    pub fn active_player_name(&self) -> Option<String> {
        let player_id = self.inner.active_player()?;
        self.inner.players.name_of(&player_id)
    }

    /// Current connection generation
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl Inner {
    fn new(
        settings: Arc<dyn Settings>,
        hooks: Arc<dyn SessionHooks>,
        connect_tx: mpsc::Sender<ConnectRequest>,
        shutdown: CancellationToken,
    ) -> Self {
        let debug_logging = settings.debug_logging();
        Self {
            generation: AtomicU64::new(0),
            session: ArcSwapOption::empty(),
            connected: AtomicBool::new(false),
            state: PlaybackState::new(),
            players: PlayerRegistry::new(),
            observers: ObserverSlot::new(),
            settings,
            hooks,
            debug_logging: AtomicBool::new(debug_logging),
            connect_tx,
            shutdown,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn active_player(&self) -> Option<Arc<String>> {
        self.session.load_full()?.active_player()
    }

    fn send_player_command(&self, command: &str) -> bool {
        match self.session.load_full() {
            Some(session) => session.send_player_command(command),
            None => false,
        }
    }

    fn notify(&self, callback: impl FnOnce(&dyn EventSink)) {
        if let Some(sink) = self.observers.current() {
            callback(sink.as_ref());
        }
    }

    async fn connect(self: &Arc<Self>, request: ConnectRequest) {
        let ConnectRequest {
            generation,
            host,
            port,
        } = request;
        if !self.is_current(generation) {
            debug!("Skipping superseded connect attempt {}", generation);
            return;
        }

        info!("Connecting to LMS CLI at {}:{}", host, port);
        let connect = TcpStream::connect((host.as_str(), port));
        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("Failed to connect to {}:{}: {}", host, port, e);
                self.connect_failed(generation);
                return;
            }
            Err(_) => {
                warn!("Timed out connecting to {}:{}", host, port);
                self.connect_failed(generation);
                return;
            }
        };

        if !self.is_current(generation) {
            debug!("Connect attempt {} superseded, dropping socket", generation);
            return;
        }

        let (reader, writer) = stream.into_split();
        let session = ConnectionSession::spawn_writer(
            writer,
            generation,
            host,
            port,
            self.shutdown.child_token(),
        );
        if !self.publish(&session) {
            debug!("Connect attempt {} superseded while publishing", generation);
            return;
        }

        info!("Connected to LMS CLI at {}", session.address());
        self.notify(|sink| sink.on_connection_changed(true, true));
        self.update_indicator();

        if !session.send(HANDSHAKE.iter().map(|c| c.to_string()).collect()) {
            warn!("Failed to queue handshake for connection {}", generation);
        }
        tokio::spawn(read_loop(Arc::clone(self), session, reader));
    }

    /// Make `session` the live one and mark the manager connected.
    ///
    /// Both are stored before the generation is checked again, so a
    /// disconnect racing with this either sees them and tears them down, or
    /// bumped the generation first and the check below undoes them. Returns
    /// false in the second case; nothing has been reported to the observer.
    fn publish(&self, session: &Arc<ConnectionSession>) -> bool {
        self.session.store(Some(Arc::clone(session)));
        self.connected.store(true, Ordering::SeqCst);

        if self.is_current(session.generation()) {
            return true;
        }
        self.session.rcu(|current| match current {
            Some(current) if Arc::ptr_eq(current, session) => None,
            other => other.clone(),
        });
        session.close();
        // Connects are serialized on the worker, so the flag is still ours
        self.connected.store(false, Ordering::SeqCst);
        false
    }

    fn connect_failed(&self, generation: u64) {
        if self.is_current(generation) {
            self.notify(|sink| sink.on_connection_changed(false, true));
        } else {
            debug!("Ignoring failure of superseded connect attempt {}", generation);
        }
    }

    fn disconnect(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.teardown();
    }

    /// Called by a read loop that stopped on its own
    fn disconnect_if_current(&self, generation: u64) {
        if self
            .generation
            .compare_exchange(generation, generation + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Old connection {} closed, as expected", generation);
            return;
        }
        info!("Server disconnected (connection {})", generation);
        self.teardown();
    }

    fn teardown(&self) {
        if let Some(session) = self.session.swap(None) {
            debug!("Closing connection {} to {}", session.generation(), session.address());
            session.close();
        }
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        self.notify(|sink| sink.on_connection_changed(false, false));
        if self.state.is_playing() {
            self.set_playing_state(false);
        } else {
            self.update_indicator();
        }
    }

    fn shutdown(&self) {
        self.disconnect();
        self.observers.clear();
        self.shutdown.cancel();
    }
}

/// Runs connect attempts one at a time, in request order.
async fn connect_worker(
    inner: Weak<Inner>,
    mut requests: mpsc::Receiver<ConnectRequest>,
    shutdown: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            _ = shutdown.cancelled() => break,
            request = requests.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = inner.connect(request) => {}
        }
    }
    debug!("Connect worker stopped");
}
