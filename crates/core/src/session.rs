use crate::language::{DEFAULT_DIFFICULTY, Hint, LanguageService};
use crate::message::{Message, MessageId, Scores};
use crate::settings::{Accent, SettingsError, SettingsUpdate, UserSettings};
use crate::state::{ConversationState, FeedbackView, HintAction, HintState, TranslationAction};
use crate::voice::{SpeechEngine, VoiceRequest, VoiceSynthesizer};
use crate::{Command, SpeechEvent};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, mpsc};

/// What a held-down record button sends when nothing was typed.
pub const SIMULATED_VOICE_MESSAGE: &str = "This is a simulated voice message.";

/// Everything a front end needs to draw the chat.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub playing: Option<MessageId>,
    pub hint: Option<Hint>,
    pub hint_pending: bool,
    pub blind_mode: bool,
    pub recording: bool,
}

/// One learner's practice session.
///
/// Cloning is cheap and every clone drives the same session, so a front end can
/// run several operations at once (a translation can be pending while the user
/// keeps chatting). The state lock is never held across a language-service call.
#[derive(Clone)]
pub struct ChatSession {
    state: Arc<Mutex<ConversationState>>,
    settings: Arc<RwLock<UserSettings>>,
    language: Arc<dyn LanguageService>,
    command_tx: mpsc::Sender<Command>,
}

impl ChatSession {
    pub fn new(
        language: Arc<dyn LanguageService>,
        settings: UserSettings,
        messages: Vec<Message>,
        command_tx: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConversationState::with_messages(messages))),
            settings: Arc::new(RwLock::new(settings)),
            language,
            command_tx,
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            messages: state.messages().to_vec(),
            playing: state.playing().cloned(),
            hint: state.hint().cloned(),
            hint_pending: matches!(state.hint_state(), HintState::Fetching { .. }),
            blind_mode: state.blind_mode(),
            recording: state.is_recording(),
        }
    }

    pub async fn settings(&self) -> UserSettings {
        self.settings.read().await.clone()
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<UserSettings, SettingsError> {
        let mut settings = self.settings.write().await;
        settings.apply(update)?;
        tracing::info!("Settings updated: {:?}", *settings);
        Ok(settings.clone())
    }

    async fn difficulty(&self) -> String {
        let settings = self.settings.read().await;
        if settings.difficulty.trim().is_empty() {
            DEFAULT_DIFFICULTY.to_string()
        } else {
            settings.difficulty.clone()
        }
    }

    /// Sends the learner's message, waits for the partner's reply and plays it.
    /// Returns the id of the reply.
    pub async fn send(&self, text: &str) -> Result<MessageId> {
        let history = {
            let mut state = self.state.lock().await;
            state.clear_hint();
            let scores = Scores::random(&mut rand::rng());
            let id = state.push_user_message(text, scores);
            tracing::info!(
                "User said {:?} (pronunciation {}, grammar {}) as {}.",
                text,
                scores.pronunciation,
                scores.grammar,
                id
            );
            state.history()
        };

        let reply = self.language.generate_reply(&history, text).await;

        let reply_id = self.state.lock().await.push_ai_message(reply.as_str());
        tracing::info!("AI replied {:?} as {}.", reply, reply_id);
        self.play_audio(reply_id.clone(), &reply).await?;
        Ok(reply_id)
    }

    /// Shows a hint for the latest AI message, or hides the one on screen.
    /// Returns the hint now shown.
    pub async fn request_hint(&self) -> Option<Hint> {
        let action = self.state.lock().await.begin_hint();
        let HintAction::Fetch { request, context } = action else {
            tracing::debug!("Hint request resolved without fetching: {:?}", action);
            return None;
        };

        let difficulty = self.difficulty().await;
        let hint = self.language.generate_hint(&context, &difficulty).await;

        let mut state = self.state.lock().await;
        if state.finish_hint(request, hint.clone()) {
            Some(hint)
        } else {
            None
        }
    }

    /// Drops the hint, stops playback and lets the partner open a new topic.
    pub async fn change_topic(&self) -> Result<MessageId> {
        self.state.lock().await.clear_hint();
        self.mute().await?;

        let difficulty = self.difficulty().await;
        let opener = self.language.generate_topic(&difficulty).await;

        let id = self.state.lock().await.push_ai_message(opener.as_str());
        tracing::info!("New topic {:?} as {}.", opener, id);
        self.play_audio(id.clone(), &opener).await?;
        Ok(id)
    }

    /// Reveals, hides, or fetches the translation of a message.
    pub async fn toggle_translation(&self, id: &MessageId) -> TranslationAction {
        let action = self.state.lock().await.begin_translation(id);
        if let TranslationAction::Fetch { text } = &action {
            let translation = self.language.translate(text).await;
            self.state
                .lock()
                .await
                .finish_translation(id, translation);
        }
        action
    }

    pub async fn toggle_blur(&self, id: &MessageId) -> Option<bool> {
        self.state.lock().await.toggle_blur(id)
    }

    pub async fn toggle_favorite(&self, id: &MessageId) -> Option<bool> {
        self.state.lock().await.toggle_favorite(id)
    }

    pub async fn toggle_blind_mode(&self) -> bool {
        let mode = self.state.lock().await.toggle_blind_mode();
        tracing::info!("Blind mode {}.", if mode { "on" } else { "off" });
        mode
    }

    /// Speaks `text` with the current voice settings, replacing any playback.
    pub async fn play_audio(&self, id: MessageId, text: &str) -> Result<()> {
        let voice = VoiceRequest::from_settings(&*self.settings.read().await);
        self.speak(id, text, voice).await
    }

    async fn speak(&self, id: MessageId, text: &str, voice: VoiceRequest) -> Result<()> {
        self.command_tx
            .send(Command::Speak {
                id,
                text: text.to_string(),
                voice,
            })
            .await
            .context("Failed to send Speak command")
    }

    /// The audio button on a message: stops it when it is the one playing,
    /// otherwise plays it. Unknown ids are ignored.
    pub async fn toggle_audio(&self, id: &MessageId) -> Result<()> {
        let (playing, text) = {
            let state = self.state.lock().await;
            let text = state.message(id).map(|m| m.text.clone());
            (state.playing() == Some(id), text)
        };
        if playing {
            return self.mute().await;
        }
        match text {
            Some(text) => self.play_audio(id.clone(), &text).await,
            None => Ok(()),
        }
    }

    /// Plays the hint on screen, if any.
    pub async fn play_hint(&self) -> Result<()> {
        let text = self.state.lock().await.hint().map(|h| h.text.clone());
        match text {
            Some(text) => self.play_audio(MessageId::hint(), &text).await,
            None => Ok(()),
        }
    }

    /// Silences playback and clears the playing marker.
    pub async fn mute(&self) -> Result<()> {
        self.state.lock().await.clear_playing();
        self.command_tx
            .send(Command::StopAudio)
            .await
            .context("Failed to send StopAudio command")
    }

    pub async fn start_recording(&self) {
        self.state.lock().await.set_recording(true);
    }

    /// Releases the record button. Sends the typed text, or a stand-in voice message.
    pub async fn stop_recording(&self, typed: Option<&str>) -> Result<MessageId> {
        self.state.lock().await.set_recording(false);
        let text = typed
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(SIMULATED_VOICE_MESSAGE);
        self.send(text).await
    }

    pub async fn feedback(&self, id: &MessageId) -> Option<FeedbackView> {
        self.state.lock().await.feedback(id)
    }

    /// Reads a scored message aloud in a plain US or UK voice.
    /// Returns false when the message has no score sheet.
    pub async fn play_reference(&self, id: &MessageId, accent: Accent) -> Result<bool> {
        let Some(view) = self.feedback(id).await else {
            return Ok(false);
        };
        self.speak(id.clone(), &view.text, VoiceRequest::reference(accent))
            .await?;
        Ok(true)
    }

    pub async fn on_speech_event(&self, event: SpeechEvent) {
        tracing::debug!("Speech event: {:?}", event);
        self.state.lock().await.apply_speech_event(&event);
    }
}

/// Executes session commands against a synthesizer until the command channel closes.
pub async fn run_commands<E: SpeechEngine + 'static>(
    synthesizer: Arc<VoiceSynthesizer<E>>,
    mut command_rx: mpsc::Receiver<Command>,
) {
    while let Some(command) = command_rx.recv().await {
        match command {
            Command::Speak { id, text, voice } => {
                tracing::debug!("COMMAND RECEIVED: Speak {} with {:?}", id, voice);
                synthesizer.play(id, &text, &voice).await;
            }
            Command::StopAudio => {
                tracing::debug!("COMMAND RECEIVED: StopAudio");
                synthesizer.cancel_all().await;
            }
        }
    }
    synthesizer.cancel_all().await;
    tracing::info!("Command channel closed, speech runtime stopped.");
}

/// Feeds synthesizer notifications back into the session until the channel closes.
pub async fn run_speech_events(session: ChatSession, mut event_rx: mpsc::Receiver<SpeechEvent>) {
    while let Some(event) = event_rx.recv().await {
        session.on_speech_event(event).await;
    }
}
