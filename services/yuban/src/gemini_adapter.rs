use crate::prompt_loader::{Prompts, render};
use async_trait::async_trait;
use gemini_client::{GeminiClient, GeminiError};
use yuban_core::language::{Hint, LanguageService, fallback, parse_hint};

/// An adapter that implements the core `LanguageService` trait on top of `gemini_client`.
///
/// Transport failures never reach the session: each operation logs them and
/// answers with its fallback text instead.
pub struct GeminiLanguageService {
    client: GeminiClient,
    prompts: Prompts,
}

impl GeminiLanguageService {
    pub fn new(client: GeminiClient, prompts: Prompts) -> Self {
        Self { client, prompts }
    }

    async fn ask(&self, operation: &str, prompt: String) -> Result<String, GeminiError> {
        tracing::debug!("{} prompt: {}", operation, prompt);
        let text = self.client.generate_content(&prompt).await;
        if let Err(e) = &text {
            tracing::warn!("Gemini {} request failed: {}", operation, e);
        }
        text.map(|t| t.trim().to_string())
    }
}

#[async_trait]
impl LanguageService for GeminiLanguageService {
    async fn generate_reply(&self, history: &[String], latest: &str) -> String {
        let history = serde_json::to_string(history).unwrap_or_default();
        let prompt = render(
            &self.prompts.reply,
            &[("history", &history), ("message", latest)],
        );
        match self.ask("reply", prompt).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => fallback::EMPTY_REPLY.to_string(),
            Err(_) => fallback::FAILED_REPLY.to_string(),
        }
    }

    async fn translate(&self, text: &str) -> String {
        let prompt = render(&self.prompts.translate, &[("text", text)]);
        match self.ask("translate", prompt).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => fallback::EMPTY_TRANSLATION.to_string(),
            Err(_) => fallback::FAILED_TRANSLATION.to_string(),
        }
    }

    async fn generate_hint(&self, context: &str, difficulty: &str) -> Hint {
        let prompt = render(
            &self.prompts.hint,
            &[("context", context), ("difficulty", difficulty)],
        );
        match self.ask("hint", prompt).await {
            Ok(raw) => parse_hint(&raw),
            Err(_) => {
                let (text, translation) = fallback::FAILED_HINT;
                Hint::new(text, translation)
            }
        }
    }

    async fn generate_topic(&self, difficulty: &str) -> String {
        let prompt = render(&self.prompts.topic, &[("difficulty", difficulty)]);
        match self.ask("topic", prompt).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => fallback::EMPTY_TOPIC.to_string(),
            Err(_) => fallback::FAILED_TOPIC.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_client::Config;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use yuban_core::language::NO_TRANSLATION;

    fn service_for(server: &MockServer) -> GeminiLanguageService {
        let config = Config::builder()
            .with_base_url(&server.uri())
            .with_api_key(SecretString::from("test-key".to_string()))
            .build();
        GeminiLanguageService::new(GeminiClient::new(config), Prompts::default())
    }

    fn answer(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        }))
    }

    async fn mount_answer(server: &MockServer, text: &str) {
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .respond_with(answer(text))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_reply_prompt_carries_history_and_is_trimmed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains(r#"[\"Hi\",\"Hello\"]"#))
            .and(body_string_contains("User says: How are you?"))
            .respond_with(answer("  Great, thanks!\n"))
            .expect(1)
            .mount(&server)
            .await;

        let history = vec!["Hi".to_string(), "Hello".to_string()];
        let reply = service_for(&server)
            .generate_reply(&history, "How are you?")
            .await;
        assert_eq!(reply, "Great, thanks!");
    }

    #[tokio::test]
    async fn test_empty_answers_use_empty_fallbacks() {
        let server = MockServer::start().await;
        mount_answer(&server, "   ").await;
        let service = service_for(&server);

        assert_eq!(service.generate_reply(&[], "hi").await, fallback::EMPTY_REPLY);
        assert_eq!(service.translate("hi").await, fallback::EMPTY_TRANSLATION);
        assert_eq!(service.generate_topic("Beginner").await, fallback::EMPTY_TOPIC);

        let hint = service.generate_hint("context", "Beginner").await;
        assert_eq!(hint, Hint::new("", NO_TRANSLATION));
    }

    #[tokio::test]
    async fn test_failures_use_failure_fallbacks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        let service = service_for(&server);

        assert_eq!(service.generate_reply(&[], "hi").await, fallback::FAILED_REPLY);
        assert_eq!(service.translate("hi").await, fallback::FAILED_TRANSLATION);
        assert_eq!(service.generate_topic("Beginner").await, fallback::FAILED_TOPIC);

        let (text, translation) = fallback::FAILED_HINT;
        assert_eq!(
            service.generate_hint("context", "Beginner").await,
            Hint::new(text, translation)
        );
    }

    #[tokio::test]
    async fn test_hint_is_split_on_pipe() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("student at Advanced level"))
            .respond_with(answer("Wow, really? Tell me more.|哇，真的吗？多说一点。"))
            .mount(&server)
            .await;

        let hint = service_for(&server)
            .generate_hint("I went to Tibet.", "Advanced")
            .await;
        assert_eq!(hint.text, "Wow, really? Tell me more.");
        assert_eq!(hint.translation, "哇，真的吗？多说一点。");
    }

    #[tokio::test]
    async fn test_translate_quotes_the_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains(r#"Text: \"Good morning\""#))
            .respond_with(answer("早上好"))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(service_for(&server).translate("Good morning").await, "早上好");
    }
}
