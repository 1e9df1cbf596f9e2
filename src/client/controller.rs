//! The conversation controller: owns the log, the visible transcript, the
//! staged attachment, the theme and the voice input, and moves each turn
//! through `Idle -> Sending -> Idle`.

use tracing::{debug, info, warn};

use super::attachment::{AttachmentKind, PendingAttachment};
use super::conversation_state::{ConversationState, Role};
use super::error::ClientError;
use super::format::{Formatter, Markup};
use super::relay_client::{ExchangeRequest, RelayApi, RelayClientError, RelayReply};
use super::store::{KeyValueStore, HISTORY_SLOT, THEME_SLOT};
use super::theme::Theme;
use super::voice::{VoiceEvent, VoiceInput, VoiceState};

/// Prompt sent with an attachment when the user typed nothing.
pub const DEFAULT_ATTACHMENT_PROMPT: &str = "Please analyze this file";
/// The only error users ever see, whatever went wrong.
pub const ERROR_BUBBLE: &str = "❌ Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Sending,
}

/// Result of trying to start a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Nothing to send.
    Ignored,
    /// Another exchange is still in flight.
    Busy,
    Dispatch(ExchangeRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ignored,
    Busy,
    Replied(String),
    Failed,
}

/// One entry of the visible transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Welcome,
    Transcript(Vec<Bubble>),
}

pub struct ChatController<S, R> {
    store: S,
    relay: R,
    formatter: Formatter,
    log: ConversationState,
    transcript: Vec<Bubble>,
    input: String,
    attachment: Option<PendingAttachment>,
    theme: Theme,
    phase: TurnPhase,
    voice: VoiceInput,
}

impl<S: KeyValueStore, R: RelayApi> ChatController<S, R> {
    /// Restores the persisted log and theme. An unreadable log starts empty.
    pub fn load(store: S, relay: R, voice: VoiceInput, markup: Markup) -> Result<Self, ClientError> {
        let log = match store.get(HISTORY_SLOT)? {
            Some(saved) => ConversationState::from_json(&saved).unwrap_or_else(|e| {
                warn!("Discarding unreadable chat history: {}", e);
                ConversationState::new()
            }),
            None => ConversationState::new(),
        };
        let theme = Theme::from_slot(store.get(THEME_SLOT)?.as_deref());

        let transcript = log
            .get_messages()
            .iter()
            .map(|m| Bubble {
                role: m.role,
                text: m.text.clone(),
            })
            .collect();

        debug!(messages = log.get_messages().len(), %theme, "Loaded client state");

        Ok(Self {
            store,
            relay,
            formatter: Formatter::new(markup)?,
            log,
            transcript,
            input: String::new(),
            attachment: None,
            theme,
            phase: TurnPhase::Idle,
            voice,
        })
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn log(&self) -> &ConversationState {
        &self.log
    }

    pub fn transcript(&self) -> &[Bubble] {
        &self.transcript
    }

    /// Bubbles appended after the transcript had `mark` entries.
    pub fn transcript_since(&self, mark: usize) -> &[Bubble] {
        self.transcript.get(mark..).unwrap_or_default()
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// The typing indicator is shown exactly while an exchange is in flight.
    pub fn is_typing(&self) -> bool {
        self.phase == TurnPhase::Sending
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn attachment(&self) -> Option<&PendingAttachment> {
        self.attachment.as_ref()
    }

    /// Stages `attachment`, returning whatever it replaced.
    pub fn attach(
        &mut self,
        attachment: PendingAttachment,
    ) -> Result<Option<PendingAttachment>, ClientError> {
        self.ensure_idle()?;
        info!("Staged {} {}", attachment.kind, attachment.name);
        Ok(self.attachment.replace(attachment))
    }

    pub fn remove_attachment(&mut self) -> Option<PendingAttachment> {
        self.attachment.take()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Flips and persists the theme. The conversation log is not touched.
    pub fn toggle_theme(&mut self) -> Result<Theme, ClientError> {
        let theme = self.theme.toggled();
        self.store.set(THEME_SLOT, theme.as_str())?;
        self.theme = theme;
        Ok(theme)
    }

    /// Wipes the whole log when `confirmed`; otherwise does nothing.
    /// Returns whether anything was cleared.
    pub fn clear_history(&mut self, confirmed: bool) -> Result<bool, ClientError> {
        if !confirmed {
            return Ok(false);
        }
        self.store.remove(HISTORY_SLOT)?;
        self.log.clear();
        self.transcript.clear();
        info!("Chat history cleared");
        Ok(true)
    }

    pub fn voice_state(&self) -> VoiceState {
        self.voice.state()
    }

    pub fn toggle_voice(&mut self) -> Result<VoiceState, ClientError> {
        if !self.voice.is_listening() {
            self.ensure_idle()?;
        }
        Ok(self.voice.toggle()?)
    }

    /// A final transcript replaces the current input.
    pub fn handle_voice_event(&mut self, event: VoiceEvent) {
        if let Some(transcript) = self.voice.handle_event(event) {
            self.input = transcript;
        }
    }

    /// `Idle -> Sending`. Clears the input, records the user's text and
    /// returns the request to send.
    pub fn begin_submit(&mut self) -> Submission {
        if self.phase == TurnPhase::Sending {
            return Submission::Busy;
        }

        let message = self.input.trim().to_string();
        if message.is_empty() && self.attachment.is_none() {
            return Submission::Ignored;
        }

        self.input.clear();
        if !message.is_empty() {
            self.log.add_user_message(&message);
            self.push_bubble(Role::User, message.clone());
        }
        self.phase = TurnPhase::Sending;

        let request = match self.attachment.take() {
            Some(attachment) => {
                let prompt = if message.is_empty() {
                    DEFAULT_ATTACHMENT_PROMPT.to_string()
                } else {
                    message
                };
                match attachment.kind {
                    AttachmentKind::Image => ExchangeRequest::Image { prompt, attachment },
                    AttachmentKind::Document => ExchangeRequest::Document { prompt, attachment },
                }
            }
            None => ExchangeRequest::Text { message },
        };

        Submission::Dispatch(request)
    }

    /// `Sending -> Idle`, appending the reply (persisted) or the error bubble
    /// (visible only).
    pub fn complete(&mut self, result: Result<RelayReply, RelayClientError>) -> SubmitOutcome {
        if self.phase != TurnPhase::Sending {
            warn!("Ignoring a reply that arrived while idle");
            return SubmitOutcome::Ignored;
        }
        self.phase = TurnPhase::Idle;
        self.attachment = None;

        let reply = match result {
            Ok(reply) => reply.into_text(),
            Err(e) => {
                warn!("Exchange failed: {}", e);
                self.push_bubble(Role::Assistant, ERROR_BUBBLE.to_string());
                return SubmitOutcome::Failed;
            }
        };

        self.log.add_assistant_message(&reply);
        self.push_bubble(Role::Assistant, reply.clone());

        if let Err(e) = self.save_history() {
            warn!("Failed to save chat history: {}", e);
            self.push_bubble(Role::Assistant, ERROR_BUBBLE.to_string());
            return SubmitOutcome::Failed;
        }

        SubmitOutcome::Replied(reply)
    }

    /// A whole turn: begin, call the relay, complete.
    pub async fn submit(&mut self) -> SubmitOutcome {
        match self.begin_submit() {
            Submission::Ignored => SubmitOutcome::Ignored,
            Submission::Busy => SubmitOutcome::Busy,
            Submission::Dispatch(request) => {
                let result = self.relay.exchange(request).await;
                self.complete(result)
            }
        }
    }

    pub fn view(&self) -> View {
        if self.transcript.is_empty() {
            View::Welcome
        } else {
            View::Transcript(self.transcript.clone())
        }
    }

    pub fn format(&self, text: &str) -> String {
        self.formatter.format(text)
    }

    fn push_bubble(&mut self, role: Role, text: String) {
        self.transcript.push(Bubble { role, text });
    }

    fn save_history(&mut self) -> Result<(), ClientError> {
        let json = self.log.to_json()?;
        self.store.set(HISTORY_SLOT, &json)?;
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), ClientError> {
        match self.phase {
            TurnPhase::Idle => Ok(()),
            TurnPhase::Sending => Err(ClientError::Busy),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::client::conversation_state::Message;
    use crate::client::store::{MemoryStore, StoreError};
    use crate::client::voice::tests::FakeRecognizer;

    /// Records requests and answers from a script; an empty script fails.
    #[derive(Default)]
    struct ScriptedRelay {
        requests: Mutex<Vec<ExchangeRequest>>,
        replies: Mutex<VecDeque<Result<RelayReply, u16>>>,
    }

    impl ScriptedRelay {
        fn replying(replies: Vec<Result<RelayReply, u16>>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            }
        }

        fn requests(&self) -> Vec<ExchangeRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RelayApi for ScriptedRelay {
        async fn exchange(&self, request: ExchangeRequest) -> Result<RelayReply, RelayClientError> {
            self.requests.lock().unwrap().push(request);
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(status)) => Err(RelayClientError::Status(status)),
                None => Err(RelayClientError::Status(500)),
            }
        }
    }

    /// A store whose writes always fail.
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set(&mut self, key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Io {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }

        fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn controller_with(
        store: MemoryStore,
        replies: Vec<Result<RelayReply, u16>>,
    ) -> ChatController<MemoryStore, ScriptedRelay> {
        ChatController::load(
            store,
            ScriptedRelay::replying(replies),
            VoiceInput::new(None),
            Markup::terminal(),
        )
        .unwrap()
    }

    fn image(size: usize) -> PendingAttachment {
        PendingAttachment::new(AttachmentKind::Image, "big.png", mime::IMAGE_PNG, vec![7; size])
            .unwrap()
    }

    fn saved_history(controller: &ChatController<MemoryStore, ScriptedRelay>) -> Option<String> {
        controller.store().get(HISTORY_SLOT).unwrap()
    }

    #[tokio::test]
    async fn text_exchange_appends_and_persists() {
        let mut controller = controller_with(MemoryStore::new(), vec![Ok(RelayReply::text("Hi there"))]);
        controller.set_input("Hello");

        let outcome = controller.submit().await;

        assert_eq!(outcome, SubmitOutcome::Replied("Hi there".into()));
        assert_eq!(
            controller.relay().requests(),
            vec![ExchangeRequest::Text {
                message: "Hello".into()
            }]
        );
        assert_eq!(
            controller.log().get_messages(),
            &[Message::user("Hello"), Message::assistant("Hi there")]
        );
        let persisted = ConversationState::from_json(&saved_history(&controller).unwrap()).unwrap();
        assert_eq!(&persisted, controller.log());
        assert_eq!(controller.input(), "");
        assert_eq!(controller.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn empty_submit_is_a_no_op() {
        let mut controller = controller_with(MemoryStore::new(), vec![]);
        controller.set_input("   \n ");

        assert_eq!(controller.submit().await, SubmitOutcome::Ignored);
        assert!(controller.relay().requests().is_empty());
        assert!(controller.log().is_empty());
        assert_eq!(controller.view(), View::Welcome);
    }

    #[tokio::test]
    async fn failed_image_exchange_shows_one_error_and_drops_attachment() {
        let mut controller =
            controller_with(MemoryStore::new(), vec![Err(500), Ok(RelayReply::text("ok"))]);
        controller.attach(image(5 * 1024 * 1024)).unwrap();

        let outcome = controller.submit().await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        match &controller.relay().requests()[0] {
            ExchangeRequest::Image { prompt, attachment } => {
                assert_eq!(prompt, DEFAULT_ATTACHMENT_PROMPT);
                assert_eq!(attachment.bytes.len(), 5 * 1024 * 1024);
            }
            other => panic!("expected image exchange, got {other:?}"),
        }
        assert_eq!(
            controller.transcript(),
            &[Bubble {
                role: Role::Assistant,
                text: ERROR_BUBBLE.into()
            }]
        );
        assert!(controller.log().is_empty());
        assert_eq!(saved_history(&controller), None);
        assert!(controller.attachment().is_none());

        controller.set_input("next");
        assert_eq!(controller.submit().await, SubmitOutcome::Replied("ok".into()));
        assert_eq!(
            controller.relay().requests()[1],
            ExchangeRequest::Text {
                message: "next".into()
            }
        );
    }

    #[tokio::test]
    async fn document_attachment_uses_typed_prompt() {
        let mut controller = controller_with(MemoryStore::new(), vec![Ok(RelayReply::text("summary"))]);
        let doc = PendingAttachment::new(
            AttachmentKind::Document,
            "notes.txt",
            mime::TEXT_PLAIN,
            b"contents".to_vec(),
        )
        .unwrap();
        controller.attach(doc).unwrap();
        controller.set_input("Summarize");

        assert_eq!(controller.submit().await, SubmitOutcome::Replied("summary".into()));
        assert!(matches!(
            &controller.relay().requests()[0],
            ExchangeRequest::Document { prompt, .. } if prompt == "Summarize"
        ));
        assert!(controller.attachment().is_none());
    }

    #[test]
    fn newer_attachment_replaces_older() {
        let mut controller = controller_with(MemoryStore::new(), vec![]);
        assert!(controller.attach(image(1)).unwrap().is_none());
        let replaced = controller.attach(image(2)).unwrap();
        assert_eq!(replaced.map(|a| a.bytes.len()), Some(1));
        assert_eq!(controller.attachment().map(|a| a.bytes.len()), Some(2));
    }

    #[test]
    fn second_submission_while_sending_is_rejected() {
        let mut controller = controller_with(MemoryStore::new(), vec![]);
        controller.set_input("first");
        assert!(matches!(controller.begin_submit(), Submission::Dispatch(_)));
        assert!(controller.is_typing());

        controller.set_input("second");
        assert_eq!(controller.begin_submit(), Submission::Busy);
        assert_eq!(controller.input(), "second");
        assert_eq!(controller.log().get_messages(), &[Message::user("first")]);
        assert!(matches!(controller.attach(image(1)), Err(ClientError::Busy)));

        controller.complete(Ok(RelayReply::text("done")));
        assert!(!controller.is_typing());
        assert!(matches!(controller.begin_submit(), Submission::Dispatch(_)));
    }

    #[test]
    fn stray_completion_is_ignored() {
        let mut controller = controller_with(MemoryStore::new(), vec![]);
        assert_eq!(
            controller.complete(Ok(RelayReply::text("late"))),
            SubmitOutcome::Ignored
        );
        assert!(controller.transcript().is_empty());
    }

    #[tokio::test]
    async fn clear_requires_confirmation() {
        let mut controller = controller_with(MemoryStore::new(), vec![Ok(RelayReply::text("Hi"))]);
        controller.set_input("Hello");
        controller.submit().await;

        assert!(!controller.clear_history(false).unwrap());
        assert_eq!(controller.log().get_messages().len(), 2);
        assert!(saved_history(&controller).is_some());

        assert!(controller.clear_history(true).unwrap());
        assert!(controller.log().is_empty());
        assert_eq!(saved_history(&controller), None);
        assert_eq!(controller.view(), View::Welcome);
    }

    #[tokio::test]
    async fn theme_toggle_leaves_log_alone() {
        let mut controller = controller_with(MemoryStore::new(), vec![Ok(RelayReply::text("Hi"))]);
        controller.set_input("Hello");
        controller.submit().await;
        let history = saved_history(&controller);

        assert_eq!(controller.theme(), Theme::Dark);
        assert_eq!(controller.toggle_theme().unwrap(), Theme::Light);
        assert_eq!(
            controller.store().get(THEME_SLOT).unwrap().as_deref(),
            Some("light")
        );
        assert_eq!(controller.toggle_theme().unwrap(), Theme::Dark);

        assert_eq!(saved_history(&controller), history);
        assert_eq!(controller.log().get_messages().len(), 2);
    }

    #[test]
    fn load_restores_history_and_theme() {
        let mut store = MemoryStore::new();
        store
            .set(HISTORY_SLOT, r#"[{"text":"Hello","type":"user"},{"text":"Hi","type":"bot"}]"#)
            .unwrap();
        store.set(THEME_SLOT, "light").unwrap();

        let controller = controller_with(store, vec![]);
        assert_eq!(controller.theme(), Theme::Light);
        assert_eq!(controller.transcript().len(), 2);
        assert_eq!(controller.transcript()[1].role, Role::Assistant);
    }

    #[test]
    fn corrupt_history_loads_empty() {
        let mut store = MemoryStore::new();
        store.set(HISTORY_SLOT, "{not json").unwrap();
        let controller = controller_with(store, vec![]);
        assert!(controller.log().is_empty());
        assert_eq!(controller.view(), View::Welcome);
    }

    #[tokio::test]
    async fn persistence_failure_surfaces_error_bubble() {
        let mut controller = ChatController::load(
            ReadOnlyStore,
            ScriptedRelay::replying(vec![Ok(RelayReply::text("Hi"))]),
            VoiceInput::new(None),
            Markup::terminal(),
        )
        .unwrap();
        controller.set_input("Hello");

        assert_eq!(controller.submit().await, SubmitOutcome::Failed);
        let last = controller.transcript().last().unwrap();
        assert_eq!(last.text, ERROR_BUBBLE);
    }

    #[test]
    fn unsaved_reply_is_shown_before_error() {
        let mut controller = ChatController::load(
            ReadOnlyStore,
            ScriptedRelay::default(),
            VoiceInput::new(None),
            Markup::terminal(),
        )
        .unwrap();
        controller.set_input("Hello");

        assert!(matches!(controller.begin_submit(), Submission::Dispatch(_)));
        let mark = controller.transcript().len();
        let outcome = controller.complete(Ok(RelayReply::text("Hi")));

        assert_eq!(outcome, SubmitOutcome::Failed);
        let added: Vec<&str> = controller
            .transcript_since(mark)
            .iter()
            .map(|bubble| bubble.text.as_str())
            .collect();
        assert_eq!(added, ["Hi", ERROR_BUBBLE]);
        assert!(controller.transcript_since(mark + 5).is_empty());
    }

    #[test]
    fn voice_transcript_replaces_input() {
        let (recognizer, _calls) = FakeRecognizer::new();
        let mut controller = ChatController::load(
            MemoryStore::new(),
            ScriptedRelay::default(),
            VoiceInput::new(Some(Box::new(recognizer))),
            Markup::terminal(),
        )
        .unwrap();
        controller.set_input("typed");

        assert_eq!(controller.toggle_voice().unwrap(), VoiceState::Listening);
        controller.handle_voice_event(VoiceEvent::Result {
            transcript: "spoken words".into(),
            is_final: true,
        });

        assert_eq!(controller.input(), "spoken words");
        assert_eq!(controller.voice_state(), VoiceState::Idle);
    }

    #[test]
    fn voice_without_driver_is_unsupported() {
        let mut controller = controller_with(MemoryStore::new(), vec![]);
        assert!(matches!(
            controller.toggle_voice(),
            Err(ClientError::Voice(crate::client::voice::VoiceError::Unsupported))
        ));
    }

    #[test]
    fn formats_with_configured_markup() {
        let controller = controller_with(MemoryStore::new(), vec![]);
        assert_eq!(controller.format("**a**\nb"), "\u{1b}[1ma\u{1b}[22m\nb");
    }
}
