//! Outbound command serialization.
//!
//! Commands are encoded to one text frame each and queued on the writer
//! task. Both failure modes surface to the caller: a payload the encoder
//! rejects and a send with no writer attached. Commands are never
//! retried; a lost command is the caller's decision to repeat.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::error;

use taskdesk_core::{ClientCommand, CoreError, encode_frame};

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Encode(#[from] CoreError),
    #[error("connection is not open")]
    NotConnected,
}

/// Sending half of the session's writer task.
#[derive(Debug, Clone)]
pub struct OutboundChannel {
    frame_tx: mpsc::UnboundedSender<String>,
}

impl OutboundChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        (Self { frame_tx }, frame_rx)
    }

    pub fn send(&self, command: &ClientCommand) -> Result<(), SendError> {
        let frame = encode_frame(command).inspect_err(|err| {
            error!("failed to encode outbound command: {err}");
        })?;
        self.frame_tx
            .send(frame)
            .map_err(|_| SendError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use taskdesk_core::UserId;

    use super::*;

    #[test]
    fn sent_commands_arrive_as_single_text_frames() {
        let (outbound, mut frame_rx) = OutboundChannel::new();
        outbound
            .send(&ClientCommand::GetChatsAccount {
                user_id: UserId(Some("abc".to_owned())),
                data: "+7999".to_owned(),
            })
            .unwrap();

        let frame = frame_rx.try_recv().expect("one frame queued");
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], json!("get_chats_account"));
        assert!(frame_rx.try_recv().is_err());
    }

    #[test]
    fn send_after_writer_shutdown_reports_not_connected() {
        let (outbound, frame_rx) = OutboundChannel::new();
        drop(frame_rx);

        let err = outbound
            .send(&ClientCommand::DeleteAccount {
                user_id: UserId(None),
                material_id: 1,
            })
            .unwrap_err();
        assert!(matches!(err, SendError::NotConnected));
    }
}
