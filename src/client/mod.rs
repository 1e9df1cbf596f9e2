//! The conversation client: everything a chat front end needs apart from the
//! actual drawing.

pub mod attachment;
pub mod controller;
pub mod conversation_state;
pub mod error;
pub mod format;
pub mod relay_client;
pub mod store;
pub mod theme;
pub mod voice;

pub use attachment::{AttachmentKind, PendingAttachment};
pub use controller::{ChatController, SubmitOutcome, Submission, View};
pub use conversation_state::{ConversationState, Message, Role};
pub use error::ClientError;
pub use relay_client::{ExchangeRequest, HttpRelayClient, RelayApi, RelayReply};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use theme::Theme;
