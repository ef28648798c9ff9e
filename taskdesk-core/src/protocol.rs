//! Wire types for the worker-server protocol.
//!
//! Every frame is one JSON text message. Inbound frames are
//! `{"type": <string>, "data": <payload>}`; outbound frames carry the
//! server-assigned identity token next to the payload.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::CoreError;

/// Server-assigned identity token carried on every outbound frame.
///
/// Serializes as JSON `false` until the server has issued one, matching
/// what the server expects from a client that has not completed its first
/// handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserId(pub Option<String>);

impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Some(token) => serializer.serialize_str(token),
            None => serializer.serialize_bool(false),
        }
    }
}

/// Payload of a `push` frame: a server-side result the user should see.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushNotice {
    pub status: String,
    pub title: String,
    pub message: String,
}

impl PushNotice {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// One decoded inbound frame.
///
/// List payloads stay opaque: the server owns the record shapes and the
/// UI renders them as-is. `Unknown` keeps old clients compatible with
/// newer servers.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    AllAccounts(Vec<Value>),
    Push(PushNotice),
    AllProgress(Vec<Value>),
    ChatsAccount(Vec<Value>),
    ChatMessages(Vec<Value>),
    UserId(String),
    Unknown { kind: String },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    data: Value,
}

/// Decode one inbound text frame.
///
/// Fails only on malformed JSON or a frame without `type`/`data`, or a
/// recognized type whose payload has the wrong shape; an unrecognized
/// type decodes to [`ServerEvent::Unknown`].
pub fn decode_frame(raw: &str) -> Result<ServerEvent, CoreError> {
    let frame: RawFrame =
        serde_json::from_str(raw).map_err(|err| CoreError::ProtocolParse(err.to_string()))?;

    let event = match frame.kind.as_str() {
        "all_accounts" => ServerEvent::AllAccounts(expect_list(frame.data, "all_accounts")?),
        "push" => ServerEvent::Push(
            serde_json::from_value(frame.data)
                .map_err(|err| CoreError::ProtocolParse(err.to_string()))?,
        ),
        "all_progress" => ServerEvent::AllProgress(expect_list(frame.data, "all_progress")?),
        "chats_account" => ServerEvent::ChatsAccount(expect_list(frame.data, "chats_account")?),
        "chat_messages" => ServerEvent::ChatMessages(expect_list(frame.data, "chat_messages")?),
        "user_id" => {
            let token = frame
                .data
                .get("user_id")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    CoreError::ProtocolParse("user_id frame without a string token".to_owned())
                })?;
            ServerEvent::UserId(token.to_owned())
        }
        _ => ServerEvent::Unknown { kind: frame.kind },
    };
    Ok(event)
}

fn expect_list(data: Value, kind: &str) -> Result<Vec<Value>, CoreError> {
    match data {
        Value::Array(items) => Ok(items),
        _ => Err(CoreError::ProtocolParse(format!(
            "{kind} payload is not a list"
        ))),
    }
}

/// One outbound command, tagged with its wire `type`.
///
/// `delete_account` carries `material_id` instead of a `data` payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    GetChatsAccount { user_id: UserId, data: String },
    GetChatHistory { user_id: UserId, data: Value },
    SendMsgInChat { user_id: UserId, data: Value },
    NewTask { user_id: UserId, data: Value },
    NewAccount { user_id: UserId, data: Value },
    DeleteAccount { user_id: UserId, material_id: i64 },
}

/// Encode one outbound command as a text frame.
///
/// A payload the serializer cannot represent is an error for the caller,
/// not a silently dropped command.
pub fn encode_frame(command: &ClientCommand) -> Result<String, CoreError> {
    serde_json::to_string(command).map_err(|err| CoreError::Serialization(err.to_string()))
}
