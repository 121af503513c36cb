//! Line-oriented terminal front end.
//!
//! Plain text is sent as a chat message; lines starting with `/` are commands.
//! Messages are addressed by their 1-based position in `/list`.

use anyhow::Result;
use std::fmt::Write as _;
use yuban_core::language::Hint;
use yuban_core::message::{Message, MessageId, Sender, TranslationStatus};
use yuban_core::session::{ChatSession, SIMULATED_VOICE_MESSAGE, SessionSnapshot};
use yuban_core::settings::{
    Accent, DIFFICULTY_LEVELS, FontSize, SettingsError, SettingsUpdate, UserSettings, VoiceId,
};
use yuban_core::state::TranslationAction;

pub const HELP: &str = "\
Type a message and press Enter to send it.
  /hint            show or hide a suggested reply (then /play hint)
  /topic           let the partner start a new topic
  /mute            stop playback
  /blind           toggle blind mode
  /tr N            show, hide or fetch the translation of message N
  /blur N          blur or reveal message N
  /fav N           favorite message N
  /play N|hint     play or stop message N, or the hint
  /score N         show the score sheet of message N
  /ref N us|uk     hear message N read in a reference accent
  /rec             start recording
  /stop [text]     stop recording and send text (or a voice message)
  /set key=value   change settings: accent voice difficulty speed autoscore font
  /settings        show settings
  /list            redraw the conversation
  /help            show this help
  /quit            leave";

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Message(usize),
    Hint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Send(String),
    Hint,
    Topic,
    Mute,
    Blind,
    Translate(usize),
    Blur(usize),
    Favorite(usize),
    Play(Target),
    Score(usize),
    Reference(usize, Accent),
    Record,
    Stop(Option<String>),
    Set(SettingsUpdate),
    Settings,
    List,
    Help,
    Quit,
}

impl ReplCommand {
    /// Commands that wait on the language service. The front end runs these in
    /// the background so input stays responsive.
    pub fn is_slow(&self) -> bool {
        matches!(
            self,
            ReplCommand::Send(_)
                | ReplCommand::Hint
                | ReplCommand::Topic
                | ReplCommand::Translate(_)
                | ReplCommand::Stop(_)
        )
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
    #[error("unknown command /{0}, try /help")]
    UnknownCommand(String),
    #[error("/{0} needs a message number")]
    MissingPosition(String),
    #[error("'{0}' is not a message number")]
    BadPosition(String),
    #[error("expected key=value, got '{0}'")]
    BadAssignment(String),
    #[error("unknown setting '{0}'")]
    UnknownSetting(String),
    #[error("'{0}' is not a boolean")]
    BadBool(String),
    #[error("'{0}' is not a number")]
    BadNumber(String),
    #[error("unknown difficulty '{0}'")]
    UnknownDifficulty(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ReplCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(ReplCommand::Send(line.to_string())));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    let name = name.to_ascii_lowercase();
    let position = |args: &str| parse_position(&name, args);

    let command = match name.as_str() {
        "hint" => ReplCommand::Hint,
        "topic" => ReplCommand::Topic,
        "mute" => ReplCommand::Mute,
        "blind" => ReplCommand::Blind,
        "tr" => ReplCommand::Translate(position(args)?),
        "blur" => ReplCommand::Blur(position(args)?),
        "fav" => ReplCommand::Favorite(position(args)?),
        "play" if args.eq_ignore_ascii_case("hint") => ReplCommand::Play(Target::Hint),
        "play" => ReplCommand::Play(Target::Message(position(args)?)),
        "score" => ReplCommand::Score(position(args)?),
        "ref" => {
            let mut parts = args.split_whitespace();
            let n = position(parts.next().unwrap_or(""))?;
            let accent = match parts.next() {
                Some(accent) => accent.parse()?,
                None => Accent::US,
            };
            ReplCommand::Reference(n, accent)
        }
        "rec" => ReplCommand::Record,
        "stop" => ReplCommand::Stop((!args.is_empty()).then(|| args.to_string())),
        "set" => ReplCommand::Set(parse_settings(args)?),
        "settings" => ReplCommand::Settings,
        "list" => ReplCommand::List,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        _ => return Err(ParseError::UnknownCommand(name.clone())),
    };
    Ok(Some(command))
}

fn parse_position(command: &str, arg: &str) -> Result<usize, ParseError> {
    if arg.is_empty() {
        return Err(ParseError::MissingPosition(command.to_string()));
    }
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ParseError::BadPosition(arg.to_string())),
    }
}

/// Parses `key=value` pairs into a partial settings record.
pub fn parse_settings(args: &str) -> Result<SettingsUpdate, ParseError> {
    let mut update = SettingsUpdate::default();
    for pair in args.split_whitespace() {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ParseError::BadAssignment(pair.to_string()))?;
        match key.to_ascii_lowercase().as_str() {
            "accent" => update.accent = Some(value.parse()?),
            "voice" => update.voice_id = Some(value.parse()?),
            "difficulty" | "level" => {
                if !DIFFICULTY_LEVELS.contains(&value) {
                    return Err(ParseError::UnknownDifficulty(value.to_string()));
                }
                update.difficulty = Some(value.to_string());
            }
            "speed" => {
                let speed = value
                    .parse::<f64>()
                    .map_err(|_| ParseError::BadNumber(value.to_string()))?;
                update.speed = Some(speed);
            }
            "autoscore" | "auto_score" => {
                update.auto_score = Some(parse_bool(value)?);
            }
            "font" | "fontsize" | "font_size" => update.font_size = Some(value.parse()?),
            _ => return Err(ParseError::UnknownSetting(key.to_string())),
        }
    }
    if update.is_empty() {
        return Err(ParseError::BadAssignment(args.to_string()));
    }
    Ok(update)
}

fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(ParseError::BadBool(value.to_string())),
    }
}

fn resolve(snapshot: &SessionSnapshot, n: usize) -> Option<MessageId> {
    snapshot.messages.get(n.checked_sub(1)?).map(|m| m.id.clone())
}

/// Runs a command against the session and returns what to print.
pub async fn execute(session: &ChatSession, command: ReplCommand) -> Result<String> {
    let snapshot = session.snapshot().await;
    let missing = |n: usize| format!("No message #{n}.");

    let out = match command {
        ReplCommand::Send(text) => {
            let reply = session.send(&text).await?;
            render_exchange(session, &text, &reply).await
        }
        ReplCommand::Hint => match session.request_hint().await {
            Some(hint) => render_hint(&hint),
            None if snapshot.hint.is_some() => "Hint hidden.".to_string(),
            None if snapshot.hint_pending => "Still thinking of a hint...".to_string(),
            None if !snapshot.messages.iter().any(|m| m.sender == Sender::Ai) => {
                "No AI message to hint about.".to_string()
            }
            None => "Hint dismissed before it arrived.".to_string(),
        },
        ReplCommand::Topic => {
            let id = session.change_topic().await?;
            render_exchange(session, "", &id).await
        }
        ReplCommand::Mute => {
            session.mute().await?;
            "Muted.".to_string()
        }
        ReplCommand::Blind => {
            if session.toggle_blind_mode().await {
                "Blind mode on.".to_string()
            } else {
                "Blind mode off.".to_string()
            }
        }
        ReplCommand::Translate(n) => {
            let Some(id) = resolve(&snapshot, n) else {
                return Ok(missing(n));
            };
            match session.toggle_translation(&id).await {
                TranslationAction::NotFound => missing(n),
                TranslationAction::Toggled { visible: false } => {
                    format!("Translation of #{n} hidden.")
                }
                TranslationAction::Toggled { visible: true } | TranslationAction::Fetch { .. } => {
                    render_message_at(session, n).await
                }
            }
        }
        ReplCommand::Blur(n) => {
            let toggled = match resolve(&snapshot, n) {
                Some(id) => session.toggle_blur(&id).await,
                None => None,
            };
            match toggled {
                Some(true) => format!("#{n} blurred."),
                Some(false) => render_message_at(session, n).await,
                None => missing(n),
            }
        }
        ReplCommand::Favorite(n) => {
            let toggled = match resolve(&snapshot, n) {
                Some(id) => session.toggle_favorite(&id).await,
                None => None,
            };
            match toggled {
                Some(true) => format!("#{n} added to favorites."),
                Some(false) => format!("#{n} removed from favorites."),
                None => missing(n),
            }
        }
        ReplCommand::Play(Target::Hint) => {
            if snapshot.hint.is_none() {
                "No hint on screen.".to_string()
            } else {
                session.play_hint().await?;
                "Playing hint.".to_string()
            }
        }
        ReplCommand::Play(Target::Message(n)) => {
            let Some(id) = resolve(&snapshot, n) else {
                return Ok(missing(n));
            };
            let was_playing = snapshot.playing.as_ref() == Some(&id);
            session.toggle_audio(&id).await?;
            if was_playing {
                format!("Stopped #{n}.")
            } else {
                format!("Playing #{n}.")
            }
        }
        ReplCommand::Score(n) => {
            let view = match resolve(&snapshot, n) {
                Some(id) => session.feedback(&id).await,
                None => None,
            };
            match view {
                Some(view) => format!(
                    "\"{}\"\n  pronunciation {}: {}\n  grammar {}: {}",
                    view.text,
                    view.scores.pronunciation,
                    view.feedback.pronunciation,
                    view.scores.grammar,
                    view.feedback.grammar
                ),
                None => format!("#{n} has no score sheet."),
            }
        }
        ReplCommand::Reference(n, accent) => {
            let played = match resolve(&snapshot, n) {
                Some(id) => session.play_reference(&id, accent).await?,
                None => false,
            };
            if played {
                format!("Playing #{n} in a {accent:?} reference voice.")
            } else {
                format!("#{n} has no score sheet.")
            }
        }
        ReplCommand::Record => {
            session.start_recording().await;
            "Recording... type /stop [text] to send.".to_string()
        }
        ReplCommand::Stop(text) => {
            if !snapshot.recording {
                return Ok("Not recording.".to_string());
            }
            let reply = session.stop_recording(text.as_deref()).await?;
            let said = text
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(SIMULATED_VOICE_MESSAGE);
            render_exchange(session, said, &reply).await
        }
        ReplCommand::Set(update) => match session.update_settings(update).await {
            Ok(settings) => render_settings(&settings),
            Err(e) => format!("Settings unchanged: {e}"),
        },
        ReplCommand::Settings => render_settings(&session.settings().await),
        ReplCommand::List => {
            let settings = session.settings().await;
            render_snapshot(&snapshot, &settings)
        }
        ReplCommand::Help => HELP.to_string(),
        ReplCommand::Quit => String::new(),
    };
    Ok(out)
}

/// Renders the AI message `reply` preceded by the learner's message `said`.
/// Other exchanges may have landed in between, so both are looked up rather
/// than taken from the end of the list.
async fn render_exchange(session: &ChatSession, said: &str, reply: &MessageId) -> String {
    let snapshot = session.snapshot().await;
    let settings = session.settings().await;
    let Some(at) = snapshot.messages.iter().position(|m| &m.id == reply) else {
        return String::new();
    };
    let asked = snapshot.messages[..at]
        .iter()
        .rposition(|m| m.sender == Sender::User && m.text == said);

    let separator = match settings.font_size {
        FontSize::Standard => "\n",
        FontSize::Large => "\n\n",
    };
    asked
        .into_iter()
        .chain(Some(at))
        .map(|i| render_message(i + 1, &snapshot.messages[i], &snapshot, &settings))
        .collect::<Vec<_>>()
        .join(separator)
}

async fn render_message_at(session: &ChatSession, n: usize) -> String {
    let snapshot = session.snapshot().await;
    let settings = session.settings().await;
    match snapshot.messages.get(n - 1) {
        Some(message) => render_message(n, message, &snapshot, &settings),
        None => format!("No message #{n}."),
    }
}

pub fn render_snapshot(snapshot: &SessionSnapshot, settings: &UserSettings) -> String {
    let mut out = render_messages(snapshot, settings, 0);
    if let Some(hint) = &snapshot.hint {
        let _ = write!(out, "\n{}", render_hint(hint));
    } else if snapshot.hint_pending {
        out.push_str("\n(thinking of a hint...)");
    }
    if snapshot.blind_mode {
        out.push_str("\n[blind mode]");
    }
    if snapshot.recording {
        out.push_str("\n[recording]");
    }
    out
}

fn render_messages(snapshot: &SessionSnapshot, settings: &UserSettings, start: usize) -> String {
    let separator = match settings.font_size {
        FontSize::Standard => "\n",
        FontSize::Large => "\n\n",
    };
    snapshot
        .messages
        .iter()
        .enumerate()
        .skip(start)
        .map(|(i, m)| render_message(i + 1, m, snapshot, settings))
        .collect::<Vec<_>>()
        .join(separator)
}

pub fn render_message(
    n: usize,
    message: &Message,
    snapshot: &SessionSnapshot,
    settings: &UserSettings,
) -> String {
    let speaker = match message.sender {
        Sender::Ai => "AI ",
        Sender::User => "You",
    };
    let mut line = format!("#{n} {speaker} ");
    if snapshot.playing.as_ref() == Some(&message.id) {
        line.push_str("♪ ");
    }
    if message.is_favorited {
        line.push_str("★ ");
    }
    if message.is_blurred {
        let _ = write!(line, "{}", "░".repeat(message.text.chars().count().min(24)));
    } else {
        line.push_str(&message.text);
    }

    if settings.auto_score {
        if let Some(scores) = &message.scores {
            let _ = write!(
                line,
                "  [pronunciation {} | grammar {}]",
                scores.pronunciation, scores.grammar
            );
        }
    }

    if message.show_translation {
        match &message.translation {
            TranslationStatus::Ready(text) => {
                let _ = write!(line, "\n      {text}");
            }
            TranslationStatus::Fetching => line.push_str("\n      (translating...)"),
            TranslationStatus::Idle | TranslationStatus::Failed => {}
        }
    }
    line
}

fn render_hint(hint: &Hint) -> String {
    format!("Hint: {}\n      {}", hint.text, hint.translation)
}

pub fn render_settings(settings: &UserSettings) -> String {
    let voice = settings.voice_id;
    format!(
        "accent={:?} voice={} ({}) difficulty={} speed={} autoscore={} font={:?}\nvoices: {}",
        settings.accent,
        voice,
        voice.display_name(),
        settings.difficulty,
        settings.speed,
        settings.auto_score,
        settings.font_size,
        VoiceId::ALL
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{Notify, mpsc};
    use yuban_core::Command;
    use yuban_core::language::{LanguageService, OfflineLanguageService, fallback};
    use yuban_core::message::demo_conversation;

    fn demo_session() -> (ChatSession, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(32);
        let session = ChatSession::new(
            Arc::new(OfflineLanguageService),
            UserSettings::default(),
            demo_conversation(),
            tx,
        );
        (session, rx)
    }

    #[test]
    fn test_plain_text_is_sent() {
        assert_eq!(
            parse_line("  Hello there ").unwrap(),
            Some(ReplCommand::Send("Hello there".to_string()))
        );
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn test_commands_with_positions() {
        assert_eq!(parse_line("/tr 2").unwrap(), Some(ReplCommand::Translate(2)));
        assert_eq!(parse_line("/PLAY hint").unwrap(), Some(ReplCommand::Play(Target::Hint)));
        assert_eq!(
            parse_line("/ref 2 uk").unwrap(),
            Some(ReplCommand::Reference(2, Accent::UK))
        );
        assert_eq!(
            parse_line("/ref 2").unwrap(),
            Some(ReplCommand::Reference(2, Accent::US))
        );
        assert_eq!(
            parse_line("/tr").unwrap_err(),
            ParseError::MissingPosition("tr".to_string())
        );
        assert_eq!(
            parse_line("/blur 0").unwrap_err(),
            ParseError::BadPosition("0".to_string())
        );
        assert_eq!(
            parse_line("/dance").unwrap_err(),
            ParseError::UnknownCommand("dance".to_string())
        );
    }

    #[test]
    fn test_stop_keeps_typed_text() {
        assert_eq!(parse_line("/stop").unwrap(), Some(ReplCommand::Stop(None)));
        assert_eq!(
            parse_line("/stop I like tea").unwrap(),
            Some(ReplCommand::Stop(Some("I like tea".to_string())))
        );
    }

    #[test]
    fn test_set_parses_every_key() {
        let update = parse_settings("accent=uk voice=magnetic difficulty=雅思 speed=1.5 autoscore=off font=large").unwrap();
        assert_eq!(update.accent, Some(Accent::UK));
        assert_eq!(update.voice_id, Some(VoiceId::Magnetic));
        assert_eq!(update.difficulty.as_deref(), Some("雅思"));
        assert_eq!(update.speed, Some(1.5));
        assert_eq!(update.auto_score, Some(false));
        assert_eq!(update.font_size, Some(FontSize::Large));
    }

    #[test]
    fn test_set_rejects_bad_input() {
        assert!(matches!(parse_settings("speed"), Err(ParseError::BadAssignment(_))));
        assert!(matches!(parse_settings("volume=3"), Err(ParseError::UnknownSetting(_))));
        assert!(matches!(parse_settings("speed=fast"), Err(ParseError::BadNumber(_))));
        assert!(matches!(parse_settings("difficulty=easy"), Err(ParseError::UnknownDifficulty(_))));
        assert!(matches!(
            parse_settings("voice=robot"),
            Err(ParseError::Settings(SettingsError::UnknownVoice(_)))
        ));
        assert!(matches!(parse_settings(""), Err(ParseError::BadAssignment(_))));
    }

    #[tokio::test]
    async fn test_list_hides_blurred_text() {
        let (session, _rx) = demo_session();
        let out = execute(&session, ReplCommand::List).await.unwrap();

        let snapshot = session.snapshot().await;
        let blurred = snapshot.messages.iter().find(|m| m.is_blurred).unwrap();
        assert!(!out.contains(&blurred.text));
        assert!(out.contains("#1 AI"));
        assert!(out.contains("[pronunciation 86 | grammar 95]"));
    }

    #[tokio::test]
    async fn test_send_prints_both_new_messages() {
        let (session, mut rx) = demo_session();
        let out = execute(&session, ReplCommand::Send("Hi!".to_string()))
            .await
            .unwrap();

        assert!(out.contains("#4 You Hi!"));
        assert!(out.contains(&format!("#5 AI  {}", fallback::OFFLINE_REPLY)));
        assert!(matches!(rx.recv().await, Some(Command::Speak { .. })));
    }

    /// Holds replies to "first" and every hint until released.
    #[derive(Default)]
    struct HeldService {
        release_reply: Notify,
        release_hint: Notify,
    }

    #[async_trait]
    impl LanguageService for HeldService {
        async fn generate_reply(&self, _history: &[String], latest: &str) -> String {
            if latest == "first" {
                self.release_reply.notified().await;
            }
            format!("Re: {latest}")
        }

        async fn translate(&self, text: &str) -> String {
            text.to_string()
        }

        async fn generate_hint(&self, _context: &str, _difficulty: &str) -> Hint {
            self.release_hint.notified().await;
            Hint {
                text: "Sounds good.".to_string(),
                translation: "听起来不错。".to_string(),
            }
        }

        async fn generate_topic(&self, _difficulty: &str) -> String {
            "Any plans for the weekend?".to_string()
        }
    }

    fn held_session(messages: Vec<Message>) -> (ChatSession, Arc<HeldService>, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(32);
        let service = Arc::new(HeldService::default());
        let session = ChatSession::new(service.clone(), UserSettings::default(), messages, tx);
        (session, service, rx)
    }

    async fn wait_until(session: &ChatSession, check: impl Fn(&SessionSnapshot) -> bool) {
        for _ in 0..100 {
            if check(&session.snapshot().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session never reached the expected state");
    }

    #[tokio::test]
    async fn test_overlapping_sends_print_their_own_exchange() {
        let (session, service, _rx) = held_session(Vec::new());

        let slow = tokio::spawn({
            let session = session.clone();
            async move { execute(&session, ReplCommand::Send("first".to_string())).await }
        });
        wait_until(&session, |s| s.messages.iter().any(|m| m.text == "first")).await;

        let fast = execute(&session, ReplCommand::Send("second".to_string()))
            .await
            .unwrap();
        assert!(fast.contains("#2 You second"));
        assert!(fast.contains("#3 AI  Re: second"));
        assert!(!fast.contains("first"));

        service.release_reply.notify_one();
        let slow = slow.await.unwrap().unwrap();
        assert!(slow.contains("#1 You first"));
        assert!(slow.contains("#4 AI  Re: first"));
        assert!(!slow.contains("second"));
    }

    #[tokio::test]
    async fn test_hint_messages_follow_hint_state() {
        let (empty, _, _empty_rx) = held_session(Vec::new());
        let out = execute(&empty, ReplCommand::Hint).await.unwrap();
        assert_eq!(out, "No AI message to hint about.");

        let (session, service, _rx) = held_session(demo_conversation());
        let pending = tokio::spawn({
            let session = session.clone();
            async move { execute(&session, ReplCommand::Hint).await }
        });
        wait_until(&session, |s| s.hint_pending).await;

        let out = execute(&session, ReplCommand::Hint).await.unwrap();
        assert_eq!(out, "Still thinking of a hint...");

        service.release_hint.notify_one();
        let shown = pending.await.unwrap().unwrap();
        assert!(shown.starts_with("Hint: Sounds good."));

        let out = execute(&session, ReplCommand::Hint).await.unwrap();
        assert_eq!(out, "Hint hidden.");
    }

    #[tokio::test]
    async fn test_out_of_range_positions_are_reported() {
        let (session, _rx) = demo_session();
        let out = execute(&session, ReplCommand::Blur(9)).await.unwrap();
        assert_eq!(out, "No message #9.");
        let out = execute(&session, ReplCommand::Score(1)).await.unwrap();
        assert_eq!(out, "#1 has no score sheet.");
    }

    #[tokio::test]
    async fn test_invalid_speed_leaves_settings_alone() {
        let (session, _rx) = demo_session();
        let update = SettingsUpdate {
            speed: Some(-1.0),
            ..SettingsUpdate::default()
        };
        let out = execute(&session, ReplCommand::Set(update)).await.unwrap();
        assert!(out.starts_with("Settings unchanged"));
        assert_eq!(session.settings().await.speed, 1.0);
    }

    #[tokio::test]
    async fn test_stop_without_recording_does_nothing() {
        let (session, _rx) = demo_session();
        let out = execute(&session, ReplCommand::Stop(None)).await.unwrap();
        assert_eq!(out, "Not recording.");
        assert_eq!(session.snapshot().await.messages.len(), 3);
    }
}
