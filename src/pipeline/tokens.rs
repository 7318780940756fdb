//! Word-by-word reply streaming

use std::time::Duration;

use super::events::{EventEmitter, OutboundEvent};
use crate::Result;

/// Split a reply into whitespace-delimited tokens, each followed by a space
#[must_use]
pub fn split_tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(|word| format!("{word} ")).collect()
}

/// Emit each token of `text` in order, sleeping `delay` after every token
///
/// # Errors
///
/// Returns [`crate::Error::ConnectionClosed`] if the client went away mid-stream
pub async fn stream_tokens(emitter: &EventEmitter, text: &str, delay: Duration) -> Result<usize> {
    let tokens = split_tokens(text);
    let count = tokens.len();

    for token in tokens {
        emitter.emit(OutboundEvent::Token { text: token }).await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(count)
}
