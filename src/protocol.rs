use crate::state::{EngineError, EngineSnapshot};
use crate::types::*;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// "Next round" (also retries a stalled load)
    StartNewRound,
    SubmitGuess {
        text: String,
    },
    RequestHint,
    /// A displayed image failed to render on the client
    ReportImageFailed {
        url: String,
    },
    GetState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        snapshot: EngineSnapshot,
        server_now: String,
    },
    State {
        snapshot: EngineSnapshot,
    },
    GuessResult {
        outcome: GuessOutcome,
    },
    Hint {
        hint: Hint,
    },
    /// The catalog locked this session out
    Blocked {
        msg: String,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl From<EngineError> for ServerMessage {
    fn from(err: EngineError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_tags() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"t": "submit_guess", "text": "Heat"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SubmitGuess {
                text: "Heat".to_string()
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"t": "start_new_round"}"#).unwrap();
        assert_eq!(msg, ClientMessage::StartNewRound);

        let msg: ClientMessage =
            serde_json::from_str(r#"{"t": "report_image_failed", "url": "http://x"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::ReportImageFailed { .. }));
    }

    #[test]
    fn test_unknown_client_message_is_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"t": "host_reset_game"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_engine_error_maps_to_error_message() {
        let msg = ServerMessage::from(EngineError::WrongPhase {
            action: "submit a guess",
            phase: RoundPhase::Loading,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["t"], "error");
        assert_eq!(json["code"], "WRONG_PHASE");
    }

    #[test]
    fn test_blocked_message_shape() {
        let msg = ServerMessage::Blocked {
            msg: "blocked".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["t"], "blocked");
        assert_eq!(json["msg"], "blocked");
    }
}
