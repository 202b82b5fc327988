//! OCPP-J RPC framing
//!
//! OCPP 1.6 JSON runs over WebSocket with three array-shaped frames:
//! - CALL: [2, messageId, action, payload]
//! - CALLRESULT: [3, messageId, payload]
//! - CALLERROR: [4, messageId, errorCode, errorDescription, errorDetails]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite;
use uuid::Uuid;

use super::types::*;

/// OCPP message type identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Call = 2,
    CallResult = 3,
    CallError = 4,
}

/// RPC error codes carried in CALLERROR frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    NotImplemented,
    NotSupported,
    InternalError,
    ProtocolError,
    SecurityError,
    FormationViolation,
    PropertyConstraintViolation,
    // Spelled as in the 1.6 JSON schema
    #[serde(rename = "OccurenceConstraintViolation")]
    OccurrenceConstraintViolation,
    TypeConstraintViolation,
    GenericError,
}

/// OCPP 1.6 Core profile actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    // CP -> CS
    StatusNotification,

    // CS -> CP
    ChangeAvailability,
    ChangeConfiguration,
    ClearCache,
    GetConfiguration,
    RemoteStartTransaction,
    RemoteStopTransaction,
    Reset,
    UnlockConnector,

    // Bidirectional
    DataTransfer,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::str::FromStr for Action {
    type Err = OcppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "StatusNotification" => Ok(Action::StatusNotification),
            "ChangeAvailability" => Ok(Action::ChangeAvailability),
            "ChangeConfiguration" => Ok(Action::ChangeConfiguration),
            "ClearCache" => Ok(Action::ClearCache),
            "GetConfiguration" => Ok(Action::GetConfiguration),
            "RemoteStartTransaction" => Ok(Action::RemoteStartTransaction),
            "RemoteStopTransaction" => Ok(Action::RemoteStopTransaction),
            "Reset" => Ok(Action::Reset),
            "UnlockConnector" => Ok(Action::UnlockConnector),
            "DataTransfer" => Ok(Action::DataTransfer),
            _ => Err(OcppError::UnknownAction(s.to_string())),
        }
    }
}

/// Errors in OCPP message handling and transport
#[derive(Debug, Error)]
pub enum OcppError {
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid message format")]
    InvalidFormat,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A CALL naming an action this charge point does not implement.
    /// Carries the message id so a CALLERROR can still be returned.
    #[error("Unsupported action {action} in call {message_id}")]
    UnsupportedAction { message_id: String, action: String },

    #[error("Unknown message type: {0}")]
    UnknownMessageType(i64),

    #[error("OCPP error from central system: {code:?} - {description}")]
    RemoteError {
        code: ErrorCode,
        description: String,
        details: Value,
    },

    #[error("Invalid central system URL: {0}")]
    InvalidUrl(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[source] Box<tungstenite::Error>),

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed")]
    ConnectionClosed,
}

impl From<tungstenite::Error> for OcppError {
    fn from(err: tungstenite::Error) -> Self {
        OcppError::WebSocket(Box::new(err))
    }
}

/// OCPP CALL message (request)
#[derive(Debug, Clone)]
pub struct Call {
    pub message_id: String,
    pub action: Action,
    pub payload: Value,
}

impl Call {
    /// Create a new CALL message with auto-generated ID
    pub fn new(action: Action, payload: impl Serialize) -> Result<Self, OcppError> {
        Ok(Self {
            message_id: Uuid::new_v4().to_string(),
            action,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Create StatusNotification call
    pub fn status_notification(
        connector_id: i32,
        error_code: ChargePointErrorCode,
        status: ChargePointStatus,
    ) -> Result<Self, OcppError> {
        Self::new(
            Action::StatusNotification,
            StatusNotificationRequest::new(connector_id, error_code, status),
        )
    }

    /// Decode the payload as a specific request type
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, OcppError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Serialize to OCPP wire format: [2, messageId, action, payload]
    pub fn to_bytes(&self) -> Result<Vec<u8>, OcppError> {
        let array = serde_json::json!([
            MessageType::Call as i32,
            &self.message_id,
            self.action.to_string(),
            &self.payload
        ]);
        Ok(serde_json::to_vec(&array)?)
    }
}

/// OCPP CALLRESULT message (success response)
#[derive(Debug, Clone)]
pub struct CallResult {
    pub message_id: String,
    pub payload: Value,
}

impl CallResult {
    /// Create a new CALLRESULT message
    pub fn new(message_id: String, payload: impl Serialize) -> Result<Self, OcppError> {
        Ok(Self {
            message_id,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Serialize to OCPP wire format: [3, messageId, payload]
    pub fn to_bytes(&self) -> Result<Vec<u8>, OcppError> {
        let array = serde_json::json!([
            MessageType::CallResult as i32,
            &self.message_id,
            &self.payload
        ]);
        Ok(serde_json::to_vec(&array)?)
    }

    /// Parse the payload as a specific response type
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, OcppError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// OCPP CALLERROR message (error response)
#[derive(Debug, Clone)]
pub struct CallError {
    pub message_id: String,
    pub error_code: ErrorCode,
    pub error_description: String,
    pub error_details: Value,
}

impl CallError {
    /// Create a new CALLERROR message
    pub fn new(
        message_id: String,
        error_code: ErrorCode,
        error_description: impl Into<String>,
    ) -> Self {
        Self {
            message_id,
            error_code,
            error_description: error_description.into(),
            error_details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Serialize to OCPP wire format: [4, messageId, errorCode, errorDescription, errorDetails]
    pub fn to_bytes(&self) -> Result<Vec<u8>, OcppError> {
        let array = serde_json::json!([
            MessageType::CallError as i32,
            &self.message_id,
            &self.error_code,
            &self.error_description,
            &self.error_details
        ]);
        Ok(serde_json::to_vec(&array)?)
    }
}

impl From<CallError> for OcppError {
    fn from(err: CallError) -> Self {
        OcppError::RemoteError {
            code: err.error_code,
            description: err.error_description,
            details: err.error_details,
        }
    }
}

/// Parsed OCPP message (any type)
#[derive(Debug, Clone)]
pub enum OcppMessage {
    Call(Call),
    CallResult(CallResult),
    CallError(CallError),
}

fn message_id(value: &Value) -> Result<String, OcppError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(OcppError::InvalidFormat)
}

impl OcppMessage {
    /// Parse an OCPP message from JSON bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, OcppError> {
        let array: Vec<Value> = serde_json::from_slice(bytes)?;

        let msg_type = array
            .first()
            .and_then(Value::as_i64)
            .ok_or(OcppError::InvalidFormat)?;

        match (msg_type, array.as_slice()) {
            (2, [_, id, action, payload]) => {
                let message_id = message_id(id)?;
                let action_str = action.as_str().ok_or(OcppError::InvalidFormat)?;

                let action: Action = action_str.parse().map_err(|_| OcppError::UnsupportedAction {
                    message_id: message_id.clone(),
                    action: action_str.to_string(),
                })?;

                Ok(OcppMessage::Call(Call {
                    message_id,
                    action,
                    payload: payload.clone(),
                }))
            }
            (3, [_, id, payload]) => Ok(OcppMessage::CallResult(CallResult {
                message_id: message_id(id)?,
                payload: payload.clone(),
            })),
            (4, [_, id, code, description, details]) => {
                let error_code: ErrorCode =
                    serde_json::from_value(code.clone()).unwrap_or(ErrorCode::GenericError);

                Ok(OcppMessage::CallError(CallError {
                    message_id: message_id(id)?,
                    error_code,
                    error_description: description.as_str().unwrap_or("").to_string(),
                    error_details: details.clone(),
                }))
            }
            (2..=4, _) => Err(OcppError::InvalidFormat),
            (other, _) => Err(OcppError::UnknownMessageType(other)),
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, OcppError> {
        match self {
            OcppMessage::Call(c) => c.to_bytes(),
            OcppMessage::CallResult(r) => r.to_bytes(),
            OcppMessage::CallError(e) => e.to_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_notification_serialization() {
        let call = Call::status_notification(
            1,
            ChargePointErrorCode::NoError,
            ChargePointStatus::Available,
        )
        .unwrap();
        let text = String::from_utf8(call.to_bytes().unwrap()).unwrap();

        assert!(text.starts_with("[2,"));
        assert!(text.contains("\"StatusNotification\""));
        assert!(text.contains("\"connectorId\":1"));
        assert!(text.contains("\"status\":\"Available\""));
    }

    #[test]
    fn test_call_parsing() {
        let json = r#"[2, "msg-123", "Reset", {"type": "Soft"}]"#;
        let msg = OcppMessage::parse(json.as_bytes()).unwrap();

        match msg {
            OcppMessage::Call(call) => {
                assert_eq!(call.message_id, "msg-123");
                assert_eq!(call.action, Action::Reset);
                let req: ResetRequest = call.parse_payload().unwrap();
                assert_eq!(req.reset_type, ResetType::Soft);
            }
            _ => panic!("Expected Call"),
        }
    }

    #[test]
    fn test_unknown_action_keeps_message_id() {
        let json = r#"[2, "msg-9", "TriggerMessage", {}]"#;
        let err = OcppMessage::parse(json.as_bytes()).unwrap_err();

        match err {
            OcppError::UnsupportedAction { message_id, action } => {
                assert_eq!(message_id, "msg-9");
                assert_eq!(action, "TriggerMessage");
            }
            other => panic!("Expected UnsupportedAction, got {other:?}"),
        }
    }

    #[test]
    fn test_call_result_parsing() {
        let json = r#"[3, "msg-123", {}]"#;
        let msg = OcppMessage::parse(json.as_bytes()).unwrap();

        match msg {
            OcppMessage::CallResult(result) => {
                assert_eq!(result.message_id, "msg-123");
                let _: StatusNotificationResponse = result.parse_payload().unwrap();
            }
            _ => panic!("Expected CallResult"),
        }
    }

    #[test]
    fn test_call_error_parsing() {
        let json = r#"[4, "msg-123", "OccurenceConstraintViolation", "missing field", {}]"#;
        let msg = OcppMessage::parse(json.as_bytes()).unwrap();

        match msg {
            OcppMessage::CallError(error) => {
                assert_eq!(error.message_id, "msg-123");
                assert_eq!(error.error_code, ErrorCode::OccurrenceConstraintViolation);
                assert_eq!(error.error_description, "missing field");
            }
            _ => panic!("Expected CallError"),
        }
    }

    #[test]
    fn test_unrecognised_error_code_falls_back() {
        let json = r#"[4, "msg-1", "SomethingElse", "", {}]"#;
        match OcppMessage::parse(json.as_bytes()).unwrap() {
            OcppMessage::CallError(error) => assert_eq!(error.error_code, ErrorCode::GenericError),
            _ => panic!("Expected CallError"),
        }
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            OcppMessage::parse(b"[]"),
            Err(OcppError::InvalidFormat)
        ));
        assert!(matches!(
            OcppMessage::parse(br#"[3, "only-id"]"#),
            Err(OcppError::InvalidFormat)
        ));
        assert!(matches!(
            OcppMessage::parse(br#"[7, "x", {}]"#),
            Err(OcppError::UnknownMessageType(7))
        ));
        assert!(matches!(
            OcppMessage::parse(b"not json"),
            Err(OcppError::JsonError(_))
        ));
    }

    #[test]
    fn test_call_error_serialization() {
        let err = CallError::new("abc".into(), ErrorCode::NotImplemented, "nope");
        let text = String::from_utf8(err.to_bytes().unwrap()).unwrap();
        assert_eq!(text, r#"[4,"abc","NotImplemented","nope",{}]"#);
    }
}
