//! Voice synthesis adapter.
//!
//! Maps the symbolic voice picked in settings to pitch, rate and a preferred
//! gender, picks the closest installed voice, and keeps at most one utterance
//! audible at a time. The actual audio comes from a [`SpeechEngine`].

use crate::SpeechEvent;
use crate::message::MessageId;
use crate::settings::{Accent, UserSettings, VoiceId};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;

static MALE_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bmale\b|david|daniel|mark|george|james").expect("male voice pattern is valid")
});

static FEMALE_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)female|samantha|zira|victoria|susan|google us english")
        .expect("female voice pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

/// How a symbolic voice is approximated on a generic synthesizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceProfile {
    pub pitch: f64,
    pub rate_multiplier: f64,
    pub gender: Gender,
}

impl VoiceProfile {
    pub fn for_voice(voice: VoiceId) -> Self {
        let (pitch, rate_multiplier, gender) = match voice {
            VoiceId::Zhilin => (1.4, 1.0, Gender::Female),
            VoiceId::Gentle => (1.1, 0.95, Gender::Female),
            VoiceId::Taiwan => (1.6, 1.05, Gender::Female),
            VoiceId::Sister => (0.9, 1.0, Gender::Female),
            VoiceId::Shota => (1.4, 1.0, Gender::Male),
            VoiceId::Handsome => (1.0, 1.0, Gender::Male),
            VoiceId::Magnetic => (0.6, 1.0, Gender::Male),
            VoiceId::UsStandard => (1.0, 1.0, Gender::Female),
        };
        Self {
            pitch,
            rate_multiplier,
            gender,
        }
    }
}

/// Everything the synthesizer needs to voice one piece of text, resolved from settings.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceRequest {
    pub language_tag: String,
    pub pitch: f64,
    pub rate: f64,
    pub gender: Gender,
}

impl VoiceRequest {
    pub fn from_settings(settings: &UserSettings) -> Self {
        let profile = VoiceProfile::for_voice(settings.voice_id);
        Self {
            language_tag: settings.accent.language_tag().to_string(),
            pitch: profile.pitch,
            rate: settings.speed * profile.rate_multiplier,
            gender: profile.gender,
        }
    }

    /// Plain reading of a sentence in the given accent, used by the score sheet.
    pub fn reference(accent: Accent) -> Self {
        Self {
            language_tag: accent.language_tag().to_string(),
            pitch: 1.0,
            rate: 1.0,
            gender: Gender::Female,
        }
    }
}

/// An installed voice as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub name: String,
    pub lang: String,
}

impl VoiceInfo {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Picks the installed voice closest to the requested language and gender.
///
/// Returns `None` only when no voices are known yet, in which case the engine
/// default should be used.
pub fn select_voice<'a>(voices: &'a [VoiceInfo], lang: &str, gender: Gender) -> Option<&'a VoiceInfo> {
    let first = voices.first()?;

    let exact: Vec<&VoiceInfo> = voices
        .iter()
        .filter(|v| v.lang == lang || v.lang.replace('_', "-") == lang)
        .collect();
    let candidates = if exact.is_empty() {
        let base = lang.split('-').next().unwrap_or(lang);
        voices.iter().filter(|v| v.lang.starts_with(base)).collect()
    } else {
        exact
    };

    if candidates.is_empty() {
        return Some(first);
    }

    let pattern = match gender {
        Gender::Male => &*MALE_NAMES,
        Gender::Female => &*FEMALE_NAMES,
    };
    candidates
        .iter()
        .find(|v| pattern.is_match(&v.name))
        .or_else(|| candidates.iter().find(|v| v.name.contains("Google")))
        .or_else(|| candidates.first())
        .copied()
}

/// One concrete thing to say.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub pitch: f64,
    pub rate: f64,
    pub voice: Option<VoiceInfo>,
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech engine unavailable: {0}")]
    Unavailable(String),
    #[error("speech engine failed: {0}")]
    Engine(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A text-to-speech backend.
///
/// `speak` resolves when the utterance has finished playing. Dropping the
/// returned future must silence the utterance; that is how playback is cancelled.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn voices(&self) -> Result<Vec<VoiceInfo>, SpeechError>;

    async fn speak(&self, utterance: &Utterance) -> Result<(), SpeechError>;
}

struct Playback {
    id: MessageId,
    handle: JoinHandle<()>,
}

/// Drives a [`SpeechEngine`] so that only one utterance is audible at a time.
pub struct VoiceSynthesizer<E> {
    engine: Arc<E>,
    voices: RwLock<Vec<VoiceInfo>>,
    current: Mutex<Option<Playback>>,
    events: mpsc::Sender<SpeechEvent>,
}

impl<E: SpeechEngine + 'static> VoiceSynthesizer<E> {
    pub fn new(engine: E, events: mpsc::Sender<SpeechEvent>) -> Self {
        Self {
            engine: Arc::new(engine),
            voices: RwLock::new(Vec::new()),
            current: Mutex::new(None),
            events,
        }
    }

    /// Reloads the installed voice list. Keeps the previous list if the engine fails.
    pub async fn refresh_voices(&self) -> usize {
        match self.engine.voices().await {
            Ok(voices) if !voices.is_empty() => {
                let count = voices.len();
                *self.voices.write().await = voices;
                tracing::debug!("Loaded {} synthesis voices.", count);
                count
            }
            Ok(_) => self.voices.read().await.len(),
            Err(e) => {
                tracing::warn!("Could not list synthesis voices: {}", e);
                self.voices.read().await.len()
            }
        }
    }

    pub async fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.read().await.clone()
    }

    pub async fn build_utterance(&self, text: &str, request: &VoiceRequest) -> Utterance {
        let voices = self.voices.read().await;
        let voice = select_voice(&voices, &request.language_tag, request.gender).cloned();
        Utterance {
            text: text.to_string(),
            lang: request.language_tag.clone(),
            pitch: request.pitch,
            rate: request.rate,
            voice,
        }
    }

    /// Starts speaking `text`, cancelling whatever was playing first.
    pub async fn play(&self, id: MessageId, text: &str, request: &VoiceRequest) {
        let utterance = self.build_utterance(text, request).await;

        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            tracing::debug!("Cancelling playback of {} for {}.", previous.id, id);
            self.stop(previous).await;
        }

        let engine = self.engine.clone();
        let events = self.events.clone();
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            let _ = events.send(SpeechEvent::Started(task_id.clone())).await;
            let outcome = match engine.speak(&utterance).await {
                Ok(()) => SpeechEvent::Finished(task_id),
                Err(e) => {
                    tracing::warn!("Playback of {} failed: {}", task_id, e);
                    SpeechEvent::Failed(task_id)
                }
            };
            let _ = events.send(outcome).await;
        });

        *current = Some(Playback { id, handle });
    }

    /// Silences any active utterance.
    pub async fn cancel_all(&self) {
        let playback = self.current.lock().await.take();
        if let Some(playback) = playback {
            tracing::debug!("Stopping playback of {}.", playback.id);
            self.stop(playback).await;
        }
    }

    /// Aborts a playback and reports its end unless the task already did.
    /// The event lands after any `Started` the task queued.
    async fn stop(&self, playback: Playback) {
        if playback.handle.is_finished() {
            return;
        }
        playback.handle.abort();
        let _ = self.events.send(SpeechEvent::Finished(playback.id)).await;
    }

    /// The id whose utterance is still running, if any.
    pub async fn active(&self) -> Option<MessageId> {
        self.current
            .lock()
            .await
            .as_ref()
            .filter(|p| !p.handle.is_finished())
            .map(|p| p.id.clone())
    }
}
