use rand::Rng;
use serde::Serialize;
use std::fmt;

/// Feedback attached to every scored user message until real assessment exists.
pub const PRONUNCIATION_FEEDBACK: &str = "Pronunciation is clear and natural.";
pub const GRAMMAR_FEEDBACK: &str = "Good sentence structure and vocabulary.";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Playback id used for the hint box, which is not part of the message list.
    pub fn hint() -> Self {
        Self("hint".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out millisecond timestamps as ids, bumped so ids never repeat.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    pub fn next_id(&mut self) -> MessageId {
        let now = chrono::Utc::now().timestamp_millis();
        let next = now.max(self.last + 1);
        self.last = next;
        MessageId(next.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sender {
    Ai,
    User,
}

/// Where a message's translation stands.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum TranslationStatus {
    #[default]
    Idle,
    Fetching,
    Ready(String),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scores {
    pub pronunciation: u8,
    pub grammar: u8,
}

impl Scores {
    /// Placeholder scores in 80..=99 until a scoring backend exists.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            pronunciation: rng.random_range(80..=99),
            grammar: rng.random_range(80..=99),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub pronunciation: String,
    pub grammar: String,
}

impl Default for Feedback {
    fn default() -> Self {
        Self {
            pronunciation: PRONUNCIATION_FEEDBACK.to_string(),
            grammar: GRAMMAR_FEEDBACK.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub text: String,
    pub translation: TranslationStatus,
    pub is_blurred: bool,
    pub show_translation: bool,
    pub is_favorited: bool,
    pub scores: Option<Scores>,
    pub feedback: Option<Feedback>,
}

impl Message {
    pub fn ai(id: MessageId, text: impl Into<String>, blurred: bool) -> Self {
        Self {
            id,
            sender: Sender::Ai,
            text: text.into(),
            translation: TranslationStatus::Idle,
            is_blurred: blurred,
            show_translation: false,
            is_favorited: false,
            scores: None,
            feedback: None,
        }
    }

    pub fn user(id: MessageId, text: impl Into<String>, scores: Scores, feedback: Feedback) -> Self {
        Self {
            id,
            sender: Sender::User,
            text: text.into(),
            translation: TranslationStatus::Idle,
            is_blurred: false,
            show_translation: false,
            is_favorited: false,
            scores: Some(scores),
            feedback: Some(feedback),
        }
    }

    pub fn is_ai(&self) -> bool {
        self.sender == Sender::Ai
    }

    pub fn translation_text(&self) -> Option<&str> {
        match &self.translation {
            TranslationStatus::Ready(text) => Some(text),
            _ => None,
        }
    }
}

/// The conversation a fresh session opens with.
pub fn demo_conversation() -> Vec<Message> {
    let mut greeting = Message::ai(
        MessageId::new("1"),
        "Hey, Luca! How's it going? I was just thinking about how much I love my favorite app. What about you? What's yours?",
        false,
    );
    greeting.translation = TranslationStatus::Ready(
        "嘿，卢卡！最近怎么样呀？我刚才正想着自己有多喜欢我最爱的那款应用呢。你呢？你最喜欢的应用是什么呀？"
            .to_string(),
    );
    greeting.show_translation = true;

    let reply = Message::user(
        MessageId::new("2"),
        "Hey there! First off, just a tiny note—looks like there are a few small typos in your message",
        Scores {
            pronunciation: 86,
            grammar: 95,
        },
        Feedback {
            pronunciation: "发音准确度高，多数单词（如 \"bet\" \"guess\" \"thinking\"）的音标发音标准，词尾辅音清晰；语调自然流畅。".to_string(),
            grammar: "语法基础扎实，句型结构正确，时态使用统一（全程用一般现在时，符合语境）。".to_string(),
        },
    );

    let mut follow_up = Message::ai(
        MessageId::new("3"),
        "Oh, no worries at all about pointing out the typos—thanks for keeping it friendly!",
        true,
    );
    follow_up.translation = TranslationStatus::Ready(
        "噢，完全不用担心指出拼写错误这件事——谢谢你这么友好！".to_string(),
    );

    vec![greeting, reply, follow_up]
}
