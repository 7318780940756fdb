//! WebSocket handler for streaming voice sessions
//!
//! Clients stream binary frames of 16-bit PCM and receive JSON events. Each
//! connection owns its own detection state; at most one turn runs at a time.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};

use super::ApiState;
use crate::pipeline::{
    ConnectionState, EventEmitter, OutboundEvent, Phase, Status, TurnOutcome,
};
use crate::voice::{EndpointEvent, Utterance};
use crate::Result;

/// Capacity of a connection's outbound event queue
const OUTBOUND_BUFFER: usize = 32;

/// Turn running inside a connection's receive loop
type PendingTurn = Option<BoxFuture<'static, TurnOutcome>>;

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/audio", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();

    tracing::info!(connection_id = %connection_id, "client connected");

    // Create channel for sending events back to client
    let (emitter, mut rx) = EventEmitter::channel(OUTBOUND_BUFFER);

    // Spawn task to forward events from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "failed to serialize event"),
            }
        }
    });

    // Handle incoming frames
    let recv_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut session = Session::new(state, emitter);

        if session.emitter.status(Status::Idle).await.is_err() {
            return 0;
        }

        loop {
            tokio::select! {
                msg = receiver.next() => {
                    let keep_going = match msg {
                        Some(Ok(Message::Binary(bytes))) => session.on_frame(&bytes).await.is_ok(),
                        Some(Ok(Message::Text(text))) => {
                            tracing::debug!(connection_id = %recv_id, len = text.as_str().len(), "ignoring text message");
                            true
                        }
                        Some(Ok(Message::Close(_))) | None => false,
                        Some(Ok(_)) => true,
                        Some(Err(e)) => {
                            tracing::debug!(connection_id = %recv_id, error = %e, "receive failed");
                            false
                        }
                    };
                    if !keep_going {
                        break;
                    }
                }
                outcome = poll_turn(&mut session.turn), if session.turn.is_some() => {
                    session.turn = None;
                    if session.on_turn_finished(outcome).await.is_err() {
                        break;
                    }
                }
            }
        }

        // Dropping the session cancels any turn still in flight
        session.state.frames_received()
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        frames = &mut recv_task => {
            send_task.abort();
            tracing::debug!(connection_id = %connection_id, frames = frames.unwrap_or_default(), "receive loop finished");
        }
    }

    tracing::info!(connection_id = %connection_id, "client disconnected");
}

/// Await the pending turn, or never resolve if there is none
async fn poll_turn(turn: &mut PendingTurn) -> TurnOutcome {
    match turn {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

/// Receive-side state of one connection
struct Session {
    api: Arc<ApiState>,
    emitter: EventEmitter,
    state: ConnectionState,
    turn: PendingTurn,
}

impl Session {
    fn new(api: Arc<ApiState>, emitter: EventEmitter) -> Self {
        let state = ConnectionState::new(&api.config);
        Self {
            api,
            emitter,
            state,
            turn: None,
        }
    }

    async fn on_frame(&mut self, bytes: &[u8]) -> Result<()> {
        match self.state.ingest(bytes, Instant::now()) {
            EndpointEvent::SpeechStarted if self.state.phase() == Phase::Idle => {
                self.state.set_phase(Phase::Listening);
                self.emitter.status(Status::Listening).await?;
            }
            EndpointEvent::Endpoint(utterance) => self.start_turn(utterance),
            EndpointEvent::SpeechStarted | EndpointEvent::Silence | EndpointEvent::Buffered => {}
        }
        Ok(())
    }

    async fn on_turn_finished(&mut self, outcome: TurnOutcome) -> Result<()> {
        if outcome == TurnOutcome::Disconnected {
            return Err(crate::Error::ConnectionClosed);
        }

        // Speech that began mid-turn is announced only after that turn's idle
        let pending = self.state.finish_turn(Instant::now());
        if pending.is_some() || self.state.phase() == Phase::Listening {
            self.emitter
                .emit(OutboundEvent::status(Status::Listening))
                .await?;
        }
        if let Some(utterance) = pending {
            self.start_turn(utterance);
        }
        Ok(())
    }

    fn start_turn(&mut self, utterance: Utterance) {
        self.state.begin_turn();

        let controller = self.api.turn_controller();
        let emitter = self.emitter.clone();
        self.turn = Some(Box::pin(async move {
            controller.run(utterance, &emitter).await
        }));
    }
}
