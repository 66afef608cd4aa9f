//! WebSocket message dispatch
//!
//! Maps each client action onto the engine and turns refusals into protocol
//! errors. State changes reach every client through the engine broadcast, so
//! only direct answers are returned here.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::GameEngine;

/// Handle client messages and return optional response
pub async fn handle_message(msg: ClientMessage, engine: &GameEngine) -> Option<ServerMessage> {
    match msg {
        ClientMessage::StartNewRound => match engine.start_new_round().await {
            Ok(()) => None,
            Err(e) => Some(e.into()),
        },

        ClientMessage::SubmitGuess { text } => match engine.submit_guess(&text).await {
            Ok(outcome) => Some(ServerMessage::GuessResult { outcome }),
            Err(e) => Some(e.into()),
        },

        ClientMessage::RequestHint => match engine.request_hint().await {
            Ok(hint) => Some(ServerMessage::Hint { hint }),
            Err(e) => Some(e.into()),
        },

        ClientMessage::ReportImageFailed { url } => {
            engine.report_image_failed(&url).await;
            None
        }

        ClientMessage::GetState => Some(ServerMessage::State {
            snapshot: engine.snapshot().await,
        }),
    }
}
