//! Conversation pipeline
//!
//! Connection state, turn orchestration, reply generation and the outbound
//! event protocol.

mod events;
mod responder;
mod state;
mod tokens;
mod turn;

pub use events::{EventEmitter, OutboundEvent, Status};
pub use responder::{Reply, ResponseGenerator};
pub use state::{ConnectionState, Phase};
pub use tokens::{split_tokens, stream_tokens};
pub use turn::{TurnController, TurnOutcome};
