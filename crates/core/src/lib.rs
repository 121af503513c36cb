pub mod language;
pub mod message;
pub mod session;
pub mod settings;
pub mod state;
pub mod voice;

use crate::message::MessageId;
use crate::voice::VoiceRequest;

/// Represents commands that the core logic (`ChatSession`) issues to the runtime.
///
/// This enum is the primary API for decoupling the session's decision-making
/// from the runtime's execution of side effects (like speaking text).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Command the runtime to speak the given text, cancelling whatever is playing.
    Speak {
        id: MessageId,
        text: String,
        voice: VoiceRequest,
    },
    /// Command the runtime to silence all playback.
    StopAudio,
}

/// Notifications the runtime feeds back into the session while an utterance plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started(MessageId),
    Finished(MessageId),
    Failed(MessageId),
}
