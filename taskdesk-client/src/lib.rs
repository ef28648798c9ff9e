pub mod config;
pub mod connection;
pub mod notify;
pub mod outbound;
pub mod router;
pub mod session;
pub mod store;

pub use config::{ClientArgs, ClientConfig, DataDirs};
pub use connection::{ConnectionState, Identity, RECONNECT_INTERVAL};
pub use notify::{LogNotifier, Notifier};
pub use router::UiEvent;
pub use session::{AppCommand, Session};
