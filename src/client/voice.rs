//! Voice dictation driven by a platform speech recognizer.
//!
//! Transitions:
//! - Idle -> Listening (toggle, recognizer started)
//! - Listening -> Idle (toggle, first final result, driver error, or end)

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSettings {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            continuous: false,
            interim_results: false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoiceError {
    #[error("Speech recognition is not supported")]
    Unsupported,
    #[error("speech recognizer failed to start: {0}")]
    Start(String),
}

/// A platform speech-to-text driver. Results arrive later as [`VoiceEvent`]s.
pub trait SpeechRecognizer: Send {
    fn start(&mut self, settings: &RecognitionSettings) -> Result<(), VoiceError>;
    fn stop(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    Result { transcript: String, is_final: bool },
    Error(String),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Listening,
}

pub struct VoiceInput {
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    settings: RecognitionSettings,
    state: VoiceState,
}

impl VoiceInput {
    pub fn new(recognizer: Option<Box<dyn SpeechRecognizer>>) -> Self {
        Self {
            recognizer,
            settings: RecognitionSettings::default(),
            state: VoiceState::Idle,
        }
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == VoiceState::Listening
    }

    /// Starts listening when idle, stops when listening.
    pub fn toggle(&mut self) -> Result<VoiceState, VoiceError> {
        let recognizer = self.recognizer.as_mut().ok_or(VoiceError::Unsupported)?;

        match self.state {
            VoiceState::Listening => {
                recognizer.stop();
                self.state = VoiceState::Idle;
            }
            VoiceState::Idle => {
                recognizer.start(&self.settings)?;
                self.state = VoiceState::Listening;
            }
        }
        Ok(self.state)
    }

    /// Feeds a driver event. Returns the transcript when it is final.
    pub fn handle_event(&mut self, event: VoiceEvent) -> Option<String> {
        if self.state != VoiceState::Listening {
            debug!("Ignoring voice event while idle: {:?}", event);
            return None;
        }

        match event {
            VoiceEvent::Result {
                transcript,
                is_final: true,
            } => {
                self.stop();
                Some(transcript)
            }
            VoiceEvent::Result { is_final: false, .. } => None,
            VoiceEvent::Error(reason) => {
                warn!("Speech recognition error: {}", reason);
                self.stop();
                None
            }
            VoiceEvent::End => {
                self.state = VoiceState::Idle;
                None
            }
        }
    }

    fn stop(&mut self) {
        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.stop();
        }
        self.state = VoiceState::Idle;
    }
}
