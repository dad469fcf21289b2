use chrono::Utc;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;

pub const JARVIS_PROMPT: &str = "You are Jarvis, a calm, intelligent, and loyal AI assistant inspired by Iron Man.
Your tone should be confident, concise, and slightly witty.
If the user asks something unclear, ask for clarification politely.";

/// Speaker tag the model is asked to continue after.
pub const REPLY_MARKER: &str = "Jarvis:";

pub const PROCESSING_REPLY: &str = "I'm processing that, sir.";

pub const APOLOGY_REPLIES: &[&str] = &[
    "Apologies, sir. I ran into an issue while thinking.",
    "Apologies, sir. My connection to the thinking core is down for a moment.",
    "Forgive me, sir. I couldn't complete that thought. Please try again shortly.",
];

/// Why the upstream reply could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Transport error, timeout or non-2xx status.
    Unavailable,
    /// The upstream answered but the body had no usable text.
    Unexpected,
}

enum RuleReply {
    Fixed(&'static str),
    Clock,
}

static RULES: Lazy<Vec<(Regex, RuleReply)>> = Lazy::new(|| {
    let rule = |pattern: &str, reply| (Regex::new(pattern).expect("valid rule pattern"), reply);
    vec![
        rule(
            r"(?i)\b(hello|hi|hey|good (morning|afternoon|evening))\b",
            RuleReply::Fixed("Hello, sir. How can I help?"),
        ),
        rule(
            r"(?i)\b(thanks|thank you|cheers)\b",
            RuleReply::Fixed("Always a pleasure, sir."),
        ),
        rule(r"(?i)\bwhat time is it\b|\bcurrent time\b", RuleReply::Clock),
        rule(
            r"(?i)\bwho are you\b|\byour name\b",
            RuleReply::Fixed("I'm Jarvis, sir. Your personal assistant."),
        ),
    ]
});

pub fn build_prompt(text: &str) -> String {
    format!("{JARVIS_PROMPT}\n\nUser: {text}\n{REPLY_MARKER}")
}

/// Strips the prompt echo from generated text, keeping whatever follows the
/// last speaker marker.
pub fn extract_reply(generated: &str) -> Option<String> {
    let reply = generated
        .rsplit(REPLY_MARKER)
        .next()
        .unwrap_or(generated)
        .trim();

    if reply.is_empty() {
        None
    } else {
        Some(reply.to_string())
    }
}

pub fn rule_based_reply(text: &str) -> Option<String> {
    RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, reply)| match reply {
            RuleReply::Fixed(reply) => (*reply).to_string(),
            RuleReply::Clock => format!("It's {} UTC, sir.", Utc::now().format("%H:%M")),
        })
}

/// Reply used when the generation API could not answer.
pub fn fallback_reply(text: &str, reason: FallbackReason) -> String {
    if let Some(reply) = rule_based_reply(text) {
        return reply;
    }

    match reason {
        FallbackReason::Unexpected => PROCESSING_REPLY.to_string(),
        FallbackReason::Unavailable => APOLOGY_REPLIES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(PROCESSING_REPLY)
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_ends_with_reply_marker() {
        let prompt = build_prompt("Status report");
        assert!(prompt.starts_with(JARVIS_PROMPT));
        assert!(prompt.ends_with("User: Status report\nJarvis:"));
    }

    #[test]
    fn extract_reply_drops_prompt_echo() {
        let generated = format!("{}  All systems nominal. ", build_prompt("Status?"));
        assert_eq!(
            extract_reply(&generated).as_deref(),
            Some("All systems nominal.")
        );
        assert_eq!(extract_reply("plain answer").as_deref(), Some("plain answer"));
        assert_eq!(extract_reply("User: hi\nJarvis:   "), None);
    }

    #[test]
    fn rules_take_priority_over_canned_replies() {
        assert_eq!(
            fallback_reply("hey there", FallbackReason::Unavailable),
            "Hello, sir. How can I help?"
        );
        assert!(fallback_reply("what time is it?", FallbackReason::Unexpected).ends_with("UTC, sir."));
    }

    #[test]
    fn canned_replies_depend_on_reason() {
        assert_eq!(
            fallback_reply("dim the lab lights", FallbackReason::Unexpected),
            PROCESSING_REPLY
        );
        let reply = fallback_reply("dim the lab lights", FallbackReason::Unavailable);
        assert!(APOLOGY_REPLIES.contains(&reply.as_str()));
    }

    #[test]
    fn greeting_rule_needs_whole_word() {
        assert!(rule_based_reply("this is a chip shortage").is_none());
    }
}
