//! In-memory conversation store.
//!
//! Holds the ordered message list and the session-wide toggles. Every update
//! here is synchronous; the async side lives in [`crate::session`], which
//! splits each network-backed operation into a begin step and a finish step
//! so the store is never locked while a request is outstanding.

use crate::SpeechEvent;
use crate::language::Hint;
use crate::message::{Feedback, IdGenerator, Message, MessageId, Scores, TranslationStatus};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HintState {
    #[default]
    None,
    /// A hint request is outstanding; `request` identifies it.
    Fetching { request: u64 },
    Shown(Hint),
}

/// What `begin_hint` decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintAction {
    /// An existing hint was dismissed.
    Cleared,
    /// A request is already outstanding, or there is nothing to hint about.
    Ignored,
    /// Fetch a hint for `context` and hand the result back with `request`.
    Fetch { request: u64, context: String },
}

/// What `begin_translation` decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationAction {
    /// Fetch a translation of `text`.
    Fetch { text: String },
    /// The visibility flag was flipped, no fetch needed.
    Toggled { visible: bool },
    NotFound,
}

/// Read-only detail view of a scored message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackView {
    pub text: String,
    pub scores: Scores,
    pub feedback: Feedback,
}

#[derive(Debug, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    ids: IdGenerator,
    playing: Option<MessageId>,
    hint: HintState,
    hint_requests: u64,
    blind_mode: bool,
    recording: bool,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| &m.id == id)
    }

    pub fn playing(&self) -> Option<&MessageId> {
        self.playing.as_ref()
    }

    pub fn hint(&self) -> Option<&Hint> {
        match &self.hint {
            HintState::Shown(hint) => Some(hint),
            _ => None,
        }
    }

    pub fn hint_state(&self) -> &HintState {
        &self.hint
    }

    pub fn blind_mode(&self) -> bool {
        self.blind_mode
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    /// Text of every message, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.text.clone()).collect()
    }

    pub fn last_ai_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_ai())
    }

    /// Appends a scored user message and returns its id.
    pub fn push_user_message(&mut self, text: impl Into<String>, scores: Scores) -> MessageId {
        let id = self.ids.next_id();
        self.messages
            .push(Message::user(id.clone(), text, scores, Feedback::default()));
        id
    }

    /// Appends an AI message, blurred when blind mode is on, and returns its id.
    pub fn push_ai_message(&mut self, text: impl Into<String>) -> MessageId {
        let id = self.ids.next_id();
        self.messages
            .push(Message::ai(id.clone(), text, self.blind_mode));
        id
    }

    pub fn clear_hint(&mut self) {
        self.hint = HintState::None;
    }

    pub fn begin_hint(&mut self) -> HintAction {
        match self.hint {
            HintState::Shown(_) => {
                self.hint = HintState::None;
                HintAction::Cleared
            }
            HintState::Fetching { .. } => HintAction::Ignored,
            HintState::None => {
                let Some(context) = self.last_ai_message().map(|m| m.text.clone()) else {
                    return HintAction::Ignored;
                };
                self.hint_requests += 1;
                let request = self.hint_requests;
                self.hint = HintState::Fetching { request };
                HintAction::Fetch { request, context }
            }
        }
    }

    /// Stores a fetched hint unless the request was superseded or dismissed meanwhile.
    pub fn finish_hint(&mut self, request: u64, hint: Hint) -> bool {
        if self.hint == (HintState::Fetching { request }) {
            self.hint = HintState::Shown(hint);
            true
        } else {
            tracing::debug!("Dropping stale hint for request {}.", request);
            false
        }
    }

    pub fn begin_translation(&mut self, id: &MessageId) -> TranslationAction {
        let Some(message) = self.message_mut(id) else {
            return TranslationAction::NotFound;
        };
        match message.translation {
            TranslationStatus::Idle | TranslationStatus::Failed => {
                message.translation = TranslationStatus::Fetching;
                TranslationAction::Fetch {
                    text: message.text.clone(),
                }
            }
            TranslationStatus::Fetching | TranslationStatus::Ready(_) => {
                message.show_translation = !message.show_translation;
                TranslationAction::Toggled {
                    visible: message.show_translation,
                }
            }
        }
    }

    /// Records a finished translation and reveals it. An empty result marks the fetch failed.
    pub fn finish_translation(&mut self, id: &MessageId, translation: String) {
        let Some(message) = self.message_mut(id) else {
            return;
        };
        if translation.trim().is_empty() {
            message.translation = TranslationStatus::Failed;
        } else {
            message.translation = TranslationStatus::Ready(translation);
            message.show_translation = true;
        }
    }

    pub fn toggle_blur(&mut self, id: &MessageId) -> Option<bool> {
        let message = self.message_mut(id)?;
        message.is_blurred = !message.is_blurred;
        Some(message.is_blurred)
    }

    pub fn toggle_favorite(&mut self, id: &MessageId) -> Option<bool> {
        let message = self.message_mut(id)?;
        message.is_favorited = !message.is_favorited;
        Some(message.is_favorited)
    }

    /// Flips blind mode and rewrites every AI message's blur flag to match,
    /// including ones blurred or revealed by hand.
    pub fn toggle_blind_mode(&mut self) -> bool {
        self.blind_mode = !self.blind_mode;
        let mode = self.blind_mode;
        self.messages
            .iter_mut()
            .filter(|m| m.is_ai())
            .for_each(|m| m.is_blurred = mode);
        mode
    }

    pub fn clear_playing(&mut self) {
        self.playing = None;
    }

    pub fn apply_speech_event(&mut self, event: &SpeechEvent) {
        match event {
            SpeechEvent::Started(id) => self.playing = Some(id.clone()),
            SpeechEvent::Finished(id) | SpeechEvent::Failed(id) => {
                if self.playing.as_ref() == Some(id) {
                    self.playing = None;
                }
            }
        }
    }

    pub fn feedback(&self, id: &MessageId) -> Option<FeedbackView> {
        let message = self.message(id)?;
        Some(FeedbackView {
            text: message.text.clone(),
            scores: message.scores?,
            feedback: message.feedback.clone()?,
        })
    }
}
