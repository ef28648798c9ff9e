pub mod document;
pub mod embed;
pub mod error;
pub mod protocol;
pub mod task;

pub use error::CoreError;
pub use protocol::{
    ClientCommand, PushNotice, ServerEvent, UserId, decode_frame, encode_frame,
};
pub use task::{DELAY_RANGE_KEYS, TaskConfig, validate_task_config};
