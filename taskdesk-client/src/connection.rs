//! Connection lifecycle bookkeeping.
//!
//! The session loop owns one logical connection to the worker server and
//! recreates it after every loss. Retries fire on a fixed interval,
//! indefinitely; the supervisor below keeps the loop honest about the two
//! invariants that matter: at most one open connection, at most one
//! pending retry.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};

use taskdesk_core::UserId;

/// Fixed retry interval. No backoff growth: the server is expected on a
/// LAN or another trusted link.
pub const RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub async fn open(url: &str) -> Result<WsStream, tungstenite::Error> {
    let (stream, _) = connect_async(url).await?;
    Ok(stream)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Connect,
    Skip,
}

/// Single-flight state machine for the reconnect loop.
///
/// `on_disconnected` arms at most one retry; `on_retry_due` is the
/// read-then-act check, and skips when a connection opened while the
/// timer was pending (a manual reconnect racing the timer).
#[derive(Debug)]
pub struct ConnectionSupervisor {
    state: ConnectionState,
    retry_pending: bool,
}

impl ConnectionSupervisor {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Closed,
            retry_pending: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn on_connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// An open connection cancels any pending retry.
    pub fn on_connected(&mut self) {
        self.state = ConnectionState::Open;
        self.retry_pending = false;
    }

    /// Returns whether a retry timer should be armed now; while one is
    /// already pending, further disconnect signals arm nothing.
    pub fn on_disconnected(&mut self) -> bool {
        self.state = ConnectionState::Closed;
        if self.retry_pending {
            return false;
        }
        self.retry_pending = true;
        true
    }

    pub fn on_retry_due(&mut self) -> RetryDecision {
        self.retry_pending = false;
        if self.state == ConnectionState::Open {
            RetryDecision::Skip
        } else {
            RetryDecision::Connect
        }
    }
}

impl Default for ConnectionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// The server-assigned identity token, owned by the connection side and
/// read through this handle everywhere else.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    inner: Arc<Mutex<Option<String>>>,
}

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, token: String) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(token);
        }
    }

    pub fn get(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|slot| slot.clone())
    }

    /// Wire form: the token, or `false` before the first assignment.
    pub fn user_id(&self) -> UserId {
        UserId(self.get())
    }
}
