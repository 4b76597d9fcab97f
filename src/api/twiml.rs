//! Call-answer markup
//!
//! Tells the telephony provider to open a `ConversationRelay` WebSocket back
//! to this server and which speech settings to use.

use crate::config::VoiceConfig;

/// Render the `<Response>` document for a call, with the relay reachable at
/// `wss://{domain}/ws`.
pub fn render(voice: &VoiceConfig, domain: &str) -> String {
    let url = format!("wss://{domain}/ws");
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "<Response><Connect>",
            r#"<ConversationRelay url="{url}" ttsProvider="{provider}" voice="{voice}" "#,
            r#"elevenlabsTextNormalization="on" welcomeGreeting="{greeting}"/>"#,
            "</Connect></Response>"
        ),
        url = escape_attr(&url),
        provider = escape_attr(&voice.tts_provider),
        voice = escape_attr(&voice.voice),
        greeting = escape_attr(&voice.welcome_greeting),
    )
}

/// Escape a value for a double-quoted XML attribute.
pub fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}
