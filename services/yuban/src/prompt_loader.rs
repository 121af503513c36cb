use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const REPLY: &str = include_str!("../prompts/reply.md");
const TRANSLATE: &str = include_str!("../prompts/translate.md");
const HINT: &str = include_str!("../prompts/hint.md");
const TOPIC: &str = include_str!("../prompts/topic.md");

pub fn load_prompts(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem for prompt file")?
                .to_string();

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

            prompts.insert(prompt_key, content);
        }
    }

    Ok(prompts)
}

/// The four templates the language service fills in.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompts {
    pub reply: String,
    pub translate: String,
    pub hint: String,
    pub topic: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            reply: REPLY.to_string(),
            translate: TRANSLATE.to_string(),
            hint: HINT.to_string(),
            topic: TOPIC.to_string(),
        }
    }
}

impl Prompts {
    /// Built-in templates, with any `reply.md`, `translate.md`, `hint.md` or
    /// `topic.md` found in `dir` taking their place.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut prompts = Self::default();
        let Some(dir) = dir else {
            return Ok(prompts);
        };

        let mut overrides = load_prompts(dir)?;
        for (key, slot) in [
            ("reply", &mut prompts.reply),
            ("translate", &mut prompts.translate),
            ("hint", &mut prompts.hint),
            ("topic", &mut prompts.topic),
        ] {
            if let Some(text) = overrides.remove(key) {
                tracing::debug!("Using prompt override for {}", key);
                *slot = text;
            }
        }
        for key in overrides.keys() {
            tracing::warn!("Ignoring unknown prompt file: {}.md", key);
        }
        Ok(prompts)
    }
}

/// Substitutes each `{name}` in `template` with its value.
///
/// The template is scanned once; inserted values are never rescanned, so a
/// value may itself contain text like `{message}`. Unknown names are left as is.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let template = template.trim_end();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_prompts_successfully() -> Result<()> {
        let dir = tempdir()?;
        let dir_path = dir.path();

        // `{{...}}` escapes the braces, so `{history}` is written to the file.
        let mut file1 = File::create(dir_path.join("reply.md"))?;
        writeln!(file1, "Reply to {{message}} after {{history}}")?;

        let mut file2 = File::create(dir_path.join("topic.md"))?;
        writeln!(file2, "New topic.")?;

        // Not markdown, ignored.
        let mut ignored_file = File::create(dir_path.join("config.txt"))?;
        writeln!(ignored_file, "some config")?;

        std::fs::create_dir(dir_path.join("subdir"))?;

        let prompts = load_prompts(dir_path)?;

        assert_eq!(prompts.len(), 2, "Should only load .md files");
        assert_eq!(
            prompts.get("reply").unwrap(),
            "Reply to {message} after {history}\n"
        );
        assert_eq!(prompts.get("topic").unwrap(), "New topic.\n");
        assert!(prompts.get("config").is_none());
        assert!(prompts.get("config.txt").is_none());

        Ok(())
    }

    #[test]
    fn test_load_prompts_from_nonexistent_dir() {
        let dir_path = Path::new("nonexistent_dir_for_testing_prompts");
        assert!(load_prompts(dir_path).is_err());
    }

    #[test]
    fn test_load_prompts_from_empty_dir() -> Result<()> {
        let dir = tempdir()?;
        let prompts = load_prompts(dir.path())?;
        assert!(prompts.is_empty());
        Ok(())
    }

    #[test]
    fn test_overrides_replace_only_named_templates() -> Result<()> {
        let dir = tempdir()?;
        let mut file = File::create(dir.path().join("translate.md"))?;
        write!(file, "Say \"{{text}}\" in Chinese")?;

        let prompts = Prompts::load(Some(dir.path()))?;
        let defaults = Prompts::default();

        assert_eq!(prompts.translate, "Say \"{text}\" in Chinese");
        assert_eq!(prompts.reply, defaults.reply);
        assert_eq!(prompts.hint, defaults.hint);
        assert_eq!(prompts.topic, defaults.topic);
        Ok(())
    }

    #[test]
    fn test_builtin_templates_carry_their_placeholders() {
        let prompts = Prompts::default();
        assert!(prompts.reply.contains("{history}") && prompts.reply.contains("{message}"));
        assert!(prompts.translate.contains("{text}"));
        assert!(prompts.hint.contains("{context}") && prompts.hint.contains("{difficulty}"));
        assert!(prompts.topic.contains("{difficulty}"));
    }

    #[test]
    fn test_render_fills_every_occurrence() {
        let out = render(
            "{difficulty} learner, {difficulty} words: \"{context}\"\n",
            &[("difficulty", "Beginner"), ("context", "Hi")],
        );
        assert_eq!(out, "Beginner learner, Beginner words: \"Hi\"");
    }

    #[test]
    fn test_render_leaves_placeholders_inside_values_alone() {
        let prompts = Prompts::default();
        let out = render(
            &prompts.reply,
            &[
                ("history", r#"["What does {message} mean?"]"#),
                ("message", "ok"),
            ],
        );
        assert!(out.contains(r#"["What does {message} mean?"]"#));
        assert!(!out.contains("What does ok mean?"));
    }

    #[test]
    fn test_render_keeps_unknown_and_unclosed_braces() {
        let out = render("{greeting} {name} and {json: {\"a\": 1}", &[("name", "Ann")]);
        assert_eq!(out, "{greeting} Ann and {json: {\"a\": 1}");
    }
}
