//! Rule-based reply generation
//!
//! Replies are chosen by the first trigger phrase found (case-insensitively)
//! in the transcript. Anything unmatched is echoed back.

use chrono::{DateTime, Local};

/// What a matched rule replies with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Fixed text
    Static(String),
    /// Current local time as `HH:MM AM/PM`
    CurrentTime,
}

/// Ordered trigger table with an echo fallback
#[derive(Debug, Clone)]
pub struct ResponseGenerator {
    rules: Vec<(String, Reply)>,
}

impl Default for ResponseGenerator {
    fn default() -> Self {
        Self::new(vec![
            ("hello", Reply::Static("Hello! How can I help you today?".into())),
            ("hi", Reply::Static("Hi there! What can I do for you?".into())),
            (
                "weather",
                Reply::Static(
                    "I don't have access to real-time weather data, but I can help you with other questions!"
                        .into(),
                ),
            ),
            ("time", Reply::CurrentTime),
            (
                "name",
                Reply::Static(
                    "I'm your local voice assistant, running entirely on your machine!".into(),
                ),
            ),
            (
                "how are you",
                Reply::Static("I'm functioning perfectly! How can I assist you?".into()),
            ),
            (
                "thank",
                Reply::Static("You're welcome! Is there anything else I can help with?".into()),
            ),
            ("bye", Reply::Static("Goodbye! Have a great day!".into())),
        ])
    }
}

impl ResponseGenerator {
    /// Build from `(trigger, reply)` pairs in priority order
    #[must_use]
    pub fn new<S: Into<String>>(rules: Vec<(S, Reply)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(trigger, reply)| (trigger.into().to_lowercase(), reply))
                .collect(),
        }
    }

    /// Reply to `text` using the current local time
    #[must_use]
    pub fn generate(&self, text: &str) -> String {
        self.generate_at(text, Local::now())
    }

    /// Reply to `text` as if the local time were `now`
    #[must_use]
    pub fn generate_at(&self, text: &str, now: DateTime<Local>) -> String {
        let lowered = text.to_lowercase();

        let matched = self
            .rules
            .iter()
            .find(|(trigger, _)| lowered.contains(trigger.as_str()));

        match matched {
            Some((trigger, Reply::Static(reply))) => {
                tracing::debug!(trigger = %trigger, "reply rule matched");
                reply.clone()
            }
            Some((trigger, Reply::CurrentTime)) => {
                tracing::debug!(trigger = %trigger, "reply rule matched");
                format!("The current time is {}", now.format("%I:%M %p"))
            }
            None => format!(
                "You said: '{text}'. I'm a simple demo assistant. Try asking about the time, weather, or just say hello!"
            ),
        }
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
