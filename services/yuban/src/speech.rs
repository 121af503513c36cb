//! Speech engines behind the core `SpeechEngine` trait.
//!
//! `EspeakEngine` shells out to `espeak-ng`, one child process per utterance.
//! `SilentEngine` is used when no synthesizer is installed: it logs the text and
//! takes roughly as long as speaking it would, so playback state still cycles.

use crate::config::SpeechBackend;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use yuban_core::voice::{SpeechEngine, SpeechError, Utterance, VoiceInfo};

const ESPEAK: &str = "espeak-ng";
/// espeak-ng's default words per minute.
const ESPEAK_BASE_WPM: f64 = 175.0;
const SILENT_MS_PER_CHAR: f64 = 60.0;

/// Maps a 0..2 pitch (1 = normal) onto espeak's 0..99 scale.
pub fn espeak_pitch(pitch: f64) -> u8 {
    (pitch * 50.0).round().clamp(0.0, 99.0) as u8
}

pub fn espeak_wpm(rate: f64) -> u32 {
    (ESPEAK_BASE_WPM * rate).round().clamp(80.0, 450.0) as u32
}

/// Parses the table printed by `espeak-ng --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  2  en-gb           --/M      English_(Great_Britain) gmw/en        (en 2)
/// ```
pub fn parse_espeak_voices(listing: &str) -> Vec<VoiceInfo> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let _priority = columns.next()?;
            let lang = columns.next()?;
            let _gender = columns.next()?;
            let name = columns.next()?;
            Some(VoiceInfo::new(name, bcp47(lang)))
        })
        .collect()
}

/// espeak writes `en-us`; voice matching expects `en-US`.
fn bcp47(lang: &str) -> String {
    match lang.split_once('-') {
        Some((base, region)) if region.len() == 2 => {
            format!("{}-{}", base, region.to_ascii_uppercase())
        }
        _ => lang.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct EspeakEngine;

impl EspeakEngine {
    /// Checks that `espeak-ng` can be launched.
    pub async fn detect() -> Result<Self, SpeechError> {
        let status = Command::new(ESPEAK)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| SpeechError::Unavailable(format!("{ESPEAK}: {e}")))?;
        if !status.success() {
            return Err(SpeechError::Unavailable(format!(
                "{ESPEAK} --version exited with {status}"
            )));
        }
        Ok(Self)
    }

    fn command_for(utterance: &Utterance) -> Command {
        let voice = utterance
            .voice
            .as_ref()
            .map(|v| v.name.clone())
            .unwrap_or_else(|| utterance.lang.to_ascii_lowercase());

        let mut cmd = Command::new(ESPEAK);
        cmd.arg("-v")
            .arg(voice)
            .arg("-p")
            .arg(espeak_pitch(utterance.pitch).to_string())
            .arg("-s")
            .arg(espeak_wpm(utterance.rate).to_string())
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SpeechEngine for EspeakEngine {
    async fn voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
        let output = Command::new(ESPEAK).arg("--voices=en").output().await?;
        if !output.status.success() {
            return Err(SpeechError::Engine(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(parse_espeak_voices(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn speak(&self, utterance: &Utterance) -> Result<(), SpeechError> {
        let mut child = Self::command_for(utterance).spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(utterance.text.as_bytes()).await?;
            // Closing stdin lets espeak start speaking.
            drop(stdin);
        }
        let output = child.wait_with_output().await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SpeechError::Engine(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SilentEngine;

impl SilentEngine {
    pub fn duration_for(utterance: &Utterance) -> Duration {
        let chars = utterance.text.chars().count() as f64;
        let rate = if utterance.rate > 0.0 { utterance.rate } else { 1.0 };
        Duration::from_millis((chars * SILENT_MS_PER_CHAR / rate) as u64)
    }
}

#[async_trait]
impl SpeechEngine for SilentEngine {
    async fn voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
        Ok(Vec::new())
    }

    async fn speak(&self, utterance: &Utterance) -> Result<(), SpeechError> {
        tracing::info!(
            "(silent) [{} pitch={:.2} rate={:.2}] {}",
            utterance.lang,
            utterance.pitch,
            utterance.rate,
            utterance.text
        );
        tokio::time::sleep(Self::duration_for(utterance)).await;
        Ok(())
    }
}

/// The engine picked at startup.
pub enum Engine {
    Espeak(EspeakEngine),
    Silent(SilentEngine),
}

impl Engine {
    /// Falls back to the silent engine when espeak-ng is missing.
    pub async fn for_backend(backend: SpeechBackend) -> Self {
        match backend {
            SpeechBackend::Silent => Engine::Silent(SilentEngine),
            SpeechBackend::Espeak => match EspeakEngine::detect().await {
                Ok(engine) => Engine::Espeak(engine),
                Err(e) => {
                    tracing::warn!("{}; continuing without audio output.", e);
                    Engine::Silent(SilentEngine)
                }
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Engine::Espeak(_) => ESPEAK,
            Engine::Silent(_) => "silent",
        }
    }
}

#[async_trait]
impl SpeechEngine for Engine {
    async fn voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
        match self {
            Engine::Espeak(engine) => engine.voices().await,
            Engine::Silent(engine) => engine.voices().await,
        }
    }

    async fn speak(&self, utterance: &Utterance) -> Result<(), SpeechError> {
        match self {
            Engine::Espeak(engine) => engine.speak(utterance).await,
            Engine::Silent(engine) => engine.speak(utterance).await,
        }
    }
}
