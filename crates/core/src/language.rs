use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use rand::seq::IndexedRandom;
use serde::Serialize;

/// Level used when the settings carry no difficulty label.
pub const DEFAULT_DIFFICULTY: &str = "Intermediate";

/// Stand-in for a hint translation the model did not supply.
pub const NO_TRANSLATION: &str = "暂无翻译";

/// Canned texts substituted when the hosted model is unreachable or returns nothing.
pub mod fallback {
    pub const OFFLINE_REPLY: &str =
        "I am a simulated response because no API Key was provided. Please check your configuration.";
    pub const EMPTY_REPLY: &str = "Sorry, I couldn't think of a response.";
    pub const FAILED_REPLY: &str = "Sorry, I encountered an error connecting to the AI.";

    pub const OFFLINE_TRANSLATION: &str = "模拟翻译结果";
    pub const EMPTY_TRANSLATION: &str = "翻译失败";
    pub const FAILED_TRANSLATION: &str = "翻译不可用";

    pub const OFFLINE_HINT: (&str, &str) = (
        "That sounds interesting! Tell me more.",
        "听起来很有趣！再多和我说说。",
    );
    pub const FAILED_HINT: (&str, &str) = (
        "Could you explain that in more detail?",
        "你能更详细地解释一下吗？",
    );

    pub const OFFLINE_TOPICS: [&str; 3] = [
        "Let's talk about travel. Where is the best place you have ever been?",
        "Let's talk about hobbies. What do you like to do on weekends?",
        "Let's talk about music. What song have you been listening to a lot lately?",
    ];
    pub const EMPTY_TOPIC: &str = "Let's talk about food. What's your favorite dish?";
    pub const FAILED_TOPIC: &str = "Let's talk about movies. Have you seen any good ones lately?";
}

/// A suggested next line for the learner, with its Chinese translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hint {
    pub text: String,
    pub translation: String,
}

impl Hint {
    pub fn new(text: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            translation: translation.into(),
        }
    }
}

/// Splits a `suggestion|translation` model response.
pub fn parse_hint(raw: &str) -> Hint {
    let mut parts = raw.split('|');
    match (parts.next(), parts.next()) {
        (Some(text), Some(translation)) => Hint::new(text.trim(), translation.trim()),
        _ => Hint::new(raw.trim(), NO_TRANSLATION),
    }
}

/// The conversation partner's language capabilities.
///
/// Every operation always yields usable text: implementations swallow transport
/// failures and substitute a canned response, so callers never handle errors here.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// Replies to `latest`, given the text of every message so far.
    async fn generate_reply(&self, history: &[String], latest: &str) -> String;

    /// Translates English text into colloquial Chinese.
    async fn translate(&self, text: &str) -> String;

    /// Suggests what the learner could say next after `context`.
    async fn generate_hint(&self, context: &str, difficulty: &str) -> Hint;

    /// Opens a fresh topic suitable for `difficulty`.
    async fn generate_topic(&self, difficulty: &str) -> String;
}

/// Used when no API credential is configured.
#[derive(Debug, Default, Clone)]
pub struct OfflineLanguageService;

#[async_trait]
impl LanguageService for OfflineLanguageService {
    async fn generate_reply(&self, _history: &[String], _latest: &str) -> String {
        fallback::OFFLINE_REPLY.to_string()
    }

    async fn translate(&self, _text: &str) -> String {
        fallback::OFFLINE_TRANSLATION.to_string()
    }

    async fn generate_hint(&self, _context: &str, _difficulty: &str) -> Hint {
        let (text, translation) = fallback::OFFLINE_HINT;
        Hint::new(text, translation)
    }

    async fn generate_topic(&self, _difficulty: &str) -> String {
        fallback::OFFLINE_TOPICS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(fallback::EMPTY_TOPIC)
            .to_string()
    }
}
