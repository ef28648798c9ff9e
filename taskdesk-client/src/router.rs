//! Inbound frame routing.
//!
//! Every text frame is decoded once and mapped to at most one UI event.
//! Bad frames are logged and dropped without touching the connection;
//! unrecognized types are ignored so newer servers keep working with
//! older clients.

use serde_json::Value;
use tracing::{debug, info, warn};

use taskdesk_core::{PushNotice, ServerEvent, decode_frame};

use crate::connection::{ConnectionState, Identity};

/// Updates handed to the UI layer, one per inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Connection(ConnectionState),
    Accounts(Vec<Value>),
    Progress(Vec<Value>),
    Push(PushNotice),
    ChatsAccount(Vec<Value>),
    ChatMessages(Vec<Value>),
}

#[derive(Debug, Clone)]
pub struct MessageRouter {
    identity: Identity,
}

impl MessageRouter {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    /// Decode one frame and map it to its event, in arrival order.
    ///
    /// `user_id` frames update the identity handle instead of emitting;
    /// malformed and unrecognized frames emit nothing.
    pub fn route(&self, raw: &str) -> Option<UiEvent> {
        let event = match decode_frame(raw) {
            Ok(event) => event,
            Err(err) => {
                warn!("dropping inbound frame: {err}");
                return None;
            }
        };

        match event {
            ServerEvent::AllAccounts(accounts) => Some(UiEvent::Accounts(accounts)),
            ServerEvent::Push(notice) => Some(UiEvent::Push(notice)),
            ServerEvent::AllProgress(progress) => Some(UiEvent::Progress(progress)),
            ServerEvent::ChatsAccount(chats) => Some(UiEvent::ChatsAccount(chats)),
            ServerEvent::ChatMessages(messages) => Some(UiEvent::ChatMessages(messages)),
            ServerEvent::UserId(token) => {
                info!(user_id = %token, "server assigned a new identity");
                self.identity.assign(token);
                None
            }
            ServerEvent::Unknown { kind } => {
                debug!(kind = %kind, "ignoring unrecognized frame type");
                None
            }
        }
    }
}
