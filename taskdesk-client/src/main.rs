use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};

use taskdesk_client::config::{ClientArgs, ClientConfig};
use taskdesk_client::connection::ConnectionState;
use taskdesk_client::notify::LogNotifier;
use taskdesk_client::router::UiEvent;
use taskdesk_client::session::{AppCommand, Session};
use taskdesk_client::store::JsonStore;

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let args = ClientArgs::parse();

    let config = match ClientConfig::resolve(&args) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    for path in [
        config.dirs.config_file(),
        config.dirs.settings_file(),
        config.dirs.accounts_file(),
    ] {
        if let Err(err) = JsonStore::new(path).ensure_exists() {
            error!("document setup failed: {err}");
            std::process::exit(1);
        }
    }

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (ui_event_tx, mut ui_event_rx) = mpsc::unbounded_channel();

    let session = Session::new(config, Arc::new(LogNotifier));
    let session_task = tokio::spawn(async move { session.run(command_rx, ui_event_tx).await });

    let mut task_submitted = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            event = ui_event_rx.recv() => match event {
                Some(UiEvent::Connection(state)) => {
                    info!(?state, "connection state changed");
                    if state == ConnectionState::Open && args.start_task && !task_submitted {
                        task_submitted = true;
                        let _ = command_tx.send(AppCommand::StartTask);
                    }
                }
                Some(UiEvent::Accounts(records)) => info!(count = records.len(), "account list update"),
                Some(UiEvent::Progress(records)) => info!(count = records.len(), "progress update"),
                Some(UiEvent::ChatsAccount(records)) => info!(count = records.len(), "chat list update"),
                Some(UiEvent::ChatMessages(records)) => info!(count = records.len(), "chat history update"),
                Some(UiEvent::Push(notice)) => info!(status = %notice.status, "{}: {}", notice.title, notice.message),
                None => break,
            }
        }
    }

    drop(command_tx);
    let _ = session_task.await;
}
