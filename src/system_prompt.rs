//! Persona defaults: the system instruction seeded into every transcript and
//! the greeting spoken when a call connects.
//!
//! Both are opaque strings to the rest of the crate. The system instruction
//! can be replaced inline (`SYSTEM_PROMPT`) or from a file
//! (`SYSTEM_PROMPT_FILE`, which wins over the inline value).

use std::path::Path;

/// Built-in phone persona
pub const DEFAULT_SYSTEM_PROMPT: &str = r"You are a friendly representative speaking with a caller over the phone.

CONVERSATION RULES:
1. Keep each response under 15 seconds of speech: concise but warm.
2. Ask one question at a time and wait for the answer.
3. If the caller's words seem cut off or hesitant, wait for a fuller message before replying.
4. Build on what the caller has already told you.
5. If the caller is not interested, thank them and end politely.
6. If they are interested, collect the key details and offer a follow-up.

RESPONSE FORMAT:
- Plain spoken sentences only: no lists, markdown, emoji or URLs.
- Spell out numbers and symbols the way you would say them aloud.
- End with one specific question or a natural transition.

Remember: this is a real conversation, not a script.";

/// Spoken by the speech provider before the first prompt
pub const DEFAULT_WELCOME_GREETING: &str =
    "Hi! Thanks for taking my call. Do you have a minute to chat?";

/// Voice used when `TTS_VOICE` is unset
pub const DEFAULT_TTS_VOICE: &str = "ZF6FPAbjXT4488VcRRnw-flash_v2_5-1.2_1.0_1.0";

pub const DEFAULT_TTS_PROVIDER: &str = "ElevenLabs";

/// Pick the system instruction: file, then inline text, then the built-in
/// persona. Blank values count as unset.
pub fn resolve_system_prompt(
    inline: Option<&str>,
    file: Option<&Path>,
) -> std::io::Result<String> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)?;
        if let Some(prompt) = non_blank(&content) {
            tracing::info!(path = %path.display(), chars = prompt.chars().count(), "Loaded system prompt file");
            return Ok(prompt);
        }
        tracing::warn!(path = %path.display(), "System prompt file is empty, ignoring");
    }

    Ok(inline
        .and_then(non_blank)
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()))
}

/// Dedent and trim so prompts written as indented blocks read cleanly.
fn non_blank(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()?;

    let dedented: Vec<&str> = lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or("").trim_end())
        .collect();
    Some(dedented.join("\n").trim().to_string())
}
