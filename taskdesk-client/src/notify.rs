use tracing::{error, info};

/// Where user-facing notices go: validation failures and server pushes.
/// The GUI swaps in dialog alerts; headless runs log.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str, is_error: bool);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str, is_error: bool) {
        if is_error {
            error!(title, "{message}");
        } else {
            info!(title, "{message}");
        }
    }
}
