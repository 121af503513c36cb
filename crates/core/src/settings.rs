use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Vocabulary levels offered by the settings sheet, easiest first.
pub const DIFFICULTY_LEVELS: [&str; 15] = [
    "学前", "小学", "初中", "高中", "四级", "六级", "考研", "商务", "专四专八", "雅思", "托福", "GRE",
    "GMAT", "SAT", "高难度",
];

/// Error returned when a settings value falls outside its option set.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SettingsError {
    #[error("speed must be a positive number, got {0}")]
    InvalidSpeed(f64),
    #[error("unknown accent '{0}', expected US or UK")]
    UnknownAccent(String),
    #[error("unknown voice '{0}'")]
    UnknownVoice(String),
    #[error("unknown font size '{0}', expected standard or large")]
    UnknownFontSize(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Accent {
    #[default]
    US,
    UK,
}

impl Accent {
    /// BCP 47 tag handed to the synthesizer.
    pub fn language_tag(self) -> &'static str {
        match self {
            Accent::US => "en-US",
            Accent::UK => "en-GB",
        }
    }
}

impl FromStr for Accent {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "US" => Ok(Accent::US),
            "UK" | "GB" => Ok(Accent::UK),
            _ => Err(SettingsError::UnknownAccent(s.to_string())),
        }
    }
}

/// Symbolic voice names. The synthesizer approximates each timbre with pitch and rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceId {
    #[default]
    Zhilin,
    Gentle,
    Taiwan,
    Sister,
    Shota,
    Handsome,
    Magnetic,
    UsStandard,
}

impl VoiceId {
    pub const ALL: [VoiceId; 8] = [
        VoiceId::Zhilin,
        VoiceId::Gentle,
        VoiceId::Taiwan,
        VoiceId::Sister,
        VoiceId::Shota,
        VoiceId::Handsome,
        VoiceId::Magnetic,
        VoiceId::UsStandard,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VoiceId::Zhilin => "zhilin",
            VoiceId::Gentle => "gentle",
            VoiceId::Taiwan => "taiwan",
            VoiceId::Sister => "sister",
            VoiceId::Shota => "shota",
            VoiceId::Handsome => "handsome",
            VoiceId::Magnetic => "magnetic",
            VoiceId::UsStandard => "us_standard",
        }
    }

    /// Label shown in the voice picker.
    pub fn display_name(self) -> &'static str {
        match self {
            VoiceId::Zhilin => "志林姐姐",
            VoiceId::Gentle => "温柔甜妹",
            VoiceId::Taiwan => "可爱台妹",
            VoiceId::Sister => "知心姐姐",
            VoiceId::Shota => "可爱正太",
            VoiceId::Handsome => "年轻帅哥",
            VoiceId::Magnetic => "磁性嗓音",
            VoiceId::UsStandard => "美式标准",
        }
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceId {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VoiceId::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SettingsError::UnknownVoice(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    #[default]
    Standard,
    Large,
}

impl FromStr for FontSize {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(FontSize::Standard),
            "large" => Ok(FontSize::Large),
            _ => Err(SettingsError::UnknownFontSize(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub accent: Accent,
    pub voice_id: VoiceId,
    pub difficulty: String,
    pub speed: f64,
    pub auto_score: bool,
    pub font_size: FontSize,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            accent: Accent::US,
            voice_id: VoiceId::Zhilin,
            difficulty: DIFFICULTY_LEVELS[0].to_string(),
            speed: 1.0,
            auto_score: true,
            font_size: FontSize::Standard,
        }
    }
}

/// A partial settings record. `None` leaves the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsUpdate {
    pub accent: Option<Accent>,
    pub voice_id: Option<VoiceId>,
    pub difficulty: Option<String>,
    pub speed: Option<f64>,
    pub auto_score: Option<bool>,
    pub font_size: Option<FontSize>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == SettingsUpdate::default()
    }
}

impl UserSettings {
    /// Shallow merge. A rejected update leaves every field untouched.
    pub fn apply(&mut self, update: SettingsUpdate) -> Result<(), SettingsError> {
        if let Some(speed) = update.speed {
            if !speed.is_finite() || speed <= 0.0 {
                return Err(SettingsError::InvalidSpeed(speed));
            }
        }

        if let Some(accent) = update.accent {
            self.accent = accent;
        }
        if let Some(voice_id) = update.voice_id {
            self.voice_id = voice_id;
        }
        if let Some(difficulty) = update.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(speed) = update.speed {
            self.speed = speed;
        }
        if let Some(auto_score) = update.auto_score {
            self.auto_score = auto_score;
        }
        if let Some(font_size) = update.font_size {
            self.font_size = font_size;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_first_launch() {
        let settings = UserSettings::default();
        assert_eq!(settings.accent, Accent::US);
        assert_eq!(settings.voice_id, VoiceId::Zhilin);
        assert_eq!(settings.difficulty, "学前");
        assert_eq!(settings.speed, 1.0);
        assert!(settings.auto_score);
        assert_eq!(settings.font_size, FontSize::Standard);
    }

    #[test]
    fn test_apply_only_touches_given_fields() {
        let mut settings = UserSettings::default();
        settings
            .apply(SettingsUpdate {
                accent: Some(Accent::UK),
                difficulty: Some("雅思".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(settings.accent, Accent::UK);
        assert_eq!(settings.difficulty, "雅思");
        assert_eq!(settings.voice_id, VoiceId::Zhilin);
        assert_eq!(settings.speed, 1.0);
        assert!(settings.auto_score);
    }

    #[test]
    fn test_apply_rejects_non_positive_speed_atomically() {
        let mut settings = UserSettings::default();
        let err = settings
            .apply(SettingsUpdate {
                accent: Some(Accent::UK),
                speed: Some(0.0),
                ..Default::default()
            })
            .unwrap_err();

        assert_eq!(err, SettingsError::InvalidSpeed(0.0));
        assert_eq!(settings, UserSettings::default());
    }

    #[test]
    fn test_parse_option_sets() {
        assert_eq!("uk".parse::<Accent>().unwrap(), Accent::UK);
        assert_eq!("magnetic".parse::<VoiceId>().unwrap(), VoiceId::Magnetic);
        assert_eq!("US_STANDARD".parse::<VoiceId>().unwrap(), VoiceId::UsStandard);
        assert_eq!("large".parse::<FontSize>().unwrap(), FontSize::Large);
        assert!("fr".parse::<Accent>().is_err());
        assert!("robot".parse::<VoiceId>().is_err());
    }

    #[test]
    fn test_settings_record_shape() {
        let json = serde_json::to_value(UserSettings::default()).unwrap();
        assert_eq!(json["accent"], "US");
        assert_eq!(json["voiceId"], "zhilin");
        assert_eq!(json["autoScore"], true);
        assert_eq!(json["fontSize"], "standard");

        let update: SettingsUpdate =
            serde_json::from_str(r#"{"voiceId": "us_standard", "speed": 1.5}"#).unwrap();
        assert_eq!(update.voice_id, Some(VoiceId::UsStandard));
        assert_eq!(update.speed, Some(1.5));
        assert!(update.accent.is_none());
    }
}
