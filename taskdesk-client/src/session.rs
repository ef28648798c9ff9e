//! The session runtime.
//!
//! One task owns the connection for the whole client lifetime: it opens
//! the socket, splits it, spawns the writer, routes inbound frames to the
//! UI channel and executes app commands. Protocol logic stays on this one
//! control flow, so routing and sends never race each other; only file
//! embedding leaves it, onto the blocking pool.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use taskdesk_core::{ClientCommand, CoreError, document, embed, validate_task_config};

use crate::config::ClientConfig;
use crate::connection::{
    self, ConnectionState, ConnectionSupervisor, Identity, RECONNECT_INTERVAL, RetryDecision,
    WsStream,
};
use crate::notify::Notifier;
use crate::outbound::{OutboundChannel, SendError};
use crate::router::{MessageRouter, UiEvent};
use crate::store::{JsonStore, StoreError};

/// Commands the UI layer issues to the session.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Validate the on-disk documents, embed the referenced files and
    /// submit one task.
    StartTask,
    /// Submit the staged account document.
    AddAccount,
    DeleteAccount(i64),
    GetChatsAccount(String),
    GetChatHistory(Value),
    SendChatMessage {
        account_phone: String,
        chat_id: Value,
        message: String,
        file_path: Option<String>,
    },
    /// Try to reopen the connection now instead of waiting for the timer.
    Reconnect,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Invalid(#[from] CoreError),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error("file embedding task failed: {0}")]
    Embed(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Shutdown,
}

pub struct Session {
    config: ClientConfig,
    config_store: JsonStore,
    settings_store: JsonStore,
    accounts_store: JsonStore,
    identity: Identity,
    notifier: Arc<dyn Notifier>,
}

impl Session {
    pub fn new(config: ClientConfig, notifier: Arc<dyn Notifier>) -> Self {
        let config_store = JsonStore::new(config.dirs.config_file());
        let settings_store = JsonStore::new(config.dirs.settings_file());
        let accounts_store = JsonStore::new(config.dirs.accounts_file());
        Self {
            config,
            config_store,
            settings_store,
            accounts_store,
            identity: Identity::new(),
            notifier,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Run the connection lifecycle until the command channel closes.
    /// Connection loss is never fatal; the loop retries indefinitely.
    pub async fn run(
        &self,
        mut command_rx: mpsc::UnboundedReceiver<AppCommand>,
        ui_event_tx: mpsc::UnboundedSender<UiEvent>,
    ) {
        let mut supervisor = ConnectionSupervisor::new();
        loop {
            supervisor.on_connecting();
            let _ = ui_event_tx.send(UiEvent::Connection(ConnectionState::Connecting));
            info!(server_url = %self.config.server_url, "connecting");

            match connection::open(self.config.server_url.as_str()).await {
                Ok(stream) => {
                    supervisor.on_connected();
                    info!("connected");
                    let _ = ui_event_tx.send(UiEvent::Connection(ConnectionState::Open));

                    let flow = self
                        .drive_connection(stream, &mut command_rx, &ui_event_tx)
                        .await;
                    if flow == Flow::Shutdown {
                        return;
                    }
                }
                Err(err) => warn!("connect failed: {err}"),
            }

            let _ = ui_event_tx.send(UiEvent::Connection(ConnectionState::Closed));
            if supervisor.on_disconnected()
                && self.wait_for_retry(&mut supervisor, &mut command_rx).await == Flow::Shutdown
            {
                return;
            }
        }
    }

    /// Service one open connection until it drops.
    async fn drive_connection(
        &self,
        stream: WsStream,
        command_rx: &mut mpsc::UnboundedReceiver<AppCommand>,
        ui_event_tx: &mpsc::UnboundedSender<UiEvent>,
    ) -> Flow {
        let (sink, mut frames) = stream.split();
        let (outbound, frame_rx) = OutboundChannel::new();
        let writer = tokio::spawn(write_frames(sink, frame_rx));
        let router = MessageRouter::new(self.identity.clone());

        let flow = loop {
            tokio::select! {
                frame = frames.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = router.route(text.as_str()) {
                            self.dispatch(event, ui_event_tx);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("connection closed by server");
                        break Flow::Continue;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!("read failed: {err}");
                        break Flow::Continue;
                    }
                },
                command = command_rx.recv() => match command {
                    // already connected; the single-flight check makes this a no-op
                    Some(AppCommand::Reconnect) => {}
                    Some(command) => self.handle_command(command, &outbound).await,
                    None => break Flow::Shutdown,
                },
            }
        };

        writer.abort();
        flow
    }

    /// Sleep out the retry interval, still servicing manual reconnects
    /// and rejecting commands that would otherwise be lost silently.
    async fn wait_for_retry(
        &self,
        supervisor: &mut ConnectionSupervisor,
        command_rx: &mut mpsc::UnboundedReceiver<AppCommand>,
    ) -> Flow {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_INTERVAL) => {
                    if supervisor.on_retry_due() == RetryDecision::Connect {
                        return Flow::Continue;
                    }
                }
                command = command_rx.recv() => match command {
                    Some(AppCommand::Reconnect) => {
                        info!("manual reconnect requested");
                        supervisor.on_retry_due();
                        return Flow::Continue;
                    }
                    Some(command) => {
                        warn!(?command, "command while disconnected; not sent");
                        self.notifier.notify(
                            "Нет подключения к серверу.",
                            "Команда не отправлена: соединение закрыто",
                            true,
                        );
                    }
                    None => return Flow::Shutdown,
                },
            }
        }
    }

    fn dispatch(&self, event: UiEvent, ui_event_tx: &mpsc::UnboundedSender<UiEvent>) {
        match event {
            UiEvent::Push(notice) => {
                let is_error = !notice.is_success();
                self.notifier.notify(&notice.title, &notice.message, is_error);
            }
            other => {
                let _ = ui_event_tx.send(other);
            }
        }
    }

    async fn handle_command(&self, command: AppCommand, outbound: &OutboundChannel) {
        let result = match command {
            AppCommand::StartTask => self.submit_task(outbound).await,
            AppCommand::AddAccount => self.submit_account(outbound).await,
            AppCommand::DeleteAccount(material_id) => outbound
                .send(&ClientCommand::DeleteAccount {
                    user_id: self.identity.user_id(),
                    material_id,
                })
                .map_err(SessionError::from),
            AppCommand::GetChatsAccount(account_phone) => outbound
                .send(&ClientCommand::GetChatsAccount {
                    user_id: self.identity.user_id(),
                    data: account_phone,
                })
                .map_err(SessionError::from),
            AppCommand::GetChatHistory(selection) => outbound
                .send(&ClientCommand::GetChatHistory {
                    user_id: self.identity.user_id(),
                    data: selection,
                })
                .map_err(SessionError::from),
            AppCommand::SendChatMessage {
                account_phone,
                chat_id,
                message,
                file_path,
            } => {
                self.submit_chat_message(outbound, account_phone, chat_id, message, file_path)
                    .await
            }
            AppCommand::Reconnect => Ok(()),
        };

        if let Err(err) = result {
            self.report_failure(&err);
        }
    }

    /// Validation failures abort the submission with a titled alert;
    /// nothing partial ever goes out.
    fn report_failure(&self, err: &SessionError) {
        match err {
            SessionError::Invalid(core) | SessionError::Send(SendError::Encode(core)) => {
                self.notifier.notify(core.title(), &core.to_string(), true);
            }
            other => {
                self.notifier.notify("Новая ошибка", &other.to_string(), true);
            }
        }
    }

    async fn submit_task(&self, outbound: &OutboundChannel) -> Result<(), SessionError> {
        info!("task submission requested");
        let config_data = self.config_store.get_all()?;
        let settings_data = self.settings_store.get_all()?;
        let task = validate_task_config(document::merge(config_data, settings_data))?;
        info!(task_id = %task.id(), "task validated");

        let bases = self.config.dirs.bases();
        let photos = self.config.dirs.photos();
        let doc = task.into_map();
        let embedded =
            tokio::task::spawn_blocking(move || embed::embed_task_files(&bases, &photos, doc))
                .await?;

        outbound.send(&ClientCommand::NewTask {
            user_id: self.identity.user_id(),
            data: Value::Object(embedded),
        })?;
        Ok(())
    }

    async fn submit_account(&self, outbound: &OutboundChannel) -> Result<(), SessionError> {
        info!("account submission requested");
        let account_data = self.accounts_store.get_all()?;
        if !account_data.get("session_path").is_some_and(|v| !v.is_null()) {
            return Err(CoreError::AccountData(
                "Небыл добавлен файл сессии аккаунта".to_owned(),
            )
            .into());
        }

        let accounts_dir = self.config.dirs.accounts();
        let embedded = tokio::task::spawn_blocking(move || {
            embed::embed_account_files(&accounts_dir, account_data)
        })
        .await?;

        outbound.send(&ClientCommand::NewAccount {
            user_id: self.identity.user_id(),
            data: Value::Object(embedded),
        })?;
        Ok(())
    }

    async fn submit_chat_message(
        &self,
        outbound: &OutboundChannel,
        account_phone: String,
        chat_id: Value,
        message: String,
        file_path: Option<String>,
    ) -> Result<(), SessionError> {
        let mut doc = Map::new();
        doc.insert("account_phone".to_owned(), Value::String(account_phone));
        doc.insert("chat_id".to_owned(), chat_id);
        doc.insert("message".to_owned(), Value::String(message));
        doc.insert(
            "file_path".to_owned(),
            file_path.map(Value::String).unwrap_or(Value::Null),
        );
        doc.insert("sent_at".to_owned(), json!(Utc::now()));

        let user_media = self.config.dirs.user_media();
        let embedded = tokio::task::spawn_blocking(move || {
            embed::embed_chat_message_file(&user_media, doc)
        })
        .await?;

        outbound.send(&ClientCommand::SendMsgInChat {
            user_id: self.identity.user_id(),
            data: Value::Object(embedded),
        })?;
        Ok(())
    }
}

async fn write_frames(
    mut sink: SplitSink<WsStream, Message>,
    mut frame_rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(frame) = frame_rx.recv().await {
        if sink.send(Message::Text(frame.into())).await.is_err() {
            break;
        }
    }
}
