//! Inbound Core profile calls
//!
//! The central system may call into the charge point at any time. A
//! [`CoreHandler`] answers those calls; every method has a default that
//! declines the request, so an implementor only overrides what it supports.

use serde::Serialize;
use tracing::{debug, warn};

use super::messages::{Action, Call, CallError, CallResult, ErrorCode, OcppError, OcppMessage};
use super::types::*;

/// Handler for calls initiated by the central system
pub trait CoreHandler: Send + Sync {
    fn on_change_availability(&self, _req: ChangeAvailabilityRequest) -> ChangeAvailabilityResponse {
        ChangeAvailabilityResponse {
            status: AvailabilityStatus::Rejected,
        }
    }

    fn on_change_configuration(
        &self,
        _req: ChangeConfigurationRequest,
    ) -> ChangeConfigurationResponse {
        ChangeConfigurationResponse {
            status: ConfigurationStatus::NotSupported,
        }
    }

    fn on_clear_cache(&self, _req: ClearCacheRequest) -> ClearCacheResponse {
        ClearCacheResponse {
            status: GenericStatus::Rejected,
        }
    }

    fn on_data_transfer(&self, _req: DataTransferRequest) -> DataTransferResponse {
        DataTransferResponse {
            status: DataTransferStatus::UnknownVendorId,
            data: None,
        }
    }

    /// Reports every requested key as unknown
    fn on_get_configuration(&self, req: GetConfigurationRequest) -> GetConfigurationResponse {
        GetConfigurationResponse {
            configuration_key: None,
            unknown_key: req.key.filter(|keys| !keys.is_empty()),
        }
    }

    fn on_remote_start_transaction(
        &self,
        _req: RemoteStartTransactionRequest,
    ) -> RemoteStartTransactionResponse {
        RemoteStartTransactionResponse {
            status: GenericStatus::Rejected,
        }
    }

    fn on_remote_stop_transaction(
        &self,
        _req: RemoteStopTransactionRequest,
    ) -> RemoteStopTransactionResponse {
        RemoteStopTransactionResponse {
            status: GenericStatus::Rejected,
        }
    }

    fn on_reset(&self, _req: ResetRequest) -> ResetResponse {
        ResetResponse {
            status: GenericStatus::Rejected,
        }
    }

    fn on_unlock_connector(&self, _req: UnlockConnectorRequest) -> UnlockConnectorResponse {
        UnlockConnectorResponse {
            status: UnlockStatus::NotSupported,
        }
    }
}

fn reply<T: Serialize>(message_id: &str, payload: T) -> OcppMessage {
    match CallResult::new(message_id.to_string(), payload) {
        Ok(result) => OcppMessage::CallResult(result),
        Err(e) => OcppMessage::CallError(CallError::new(
            message_id.to_string(),
            ErrorCode::InternalError,
            e.to_string(),
        )),
    }
}

fn handle<Req, Resp>(call: &Call, f: impl FnOnce(Req) -> Resp) -> OcppMessage
where
    Req: for<'de> serde::Deserialize<'de>,
    Resp: Serialize,
{
    match call.parse_payload::<Req>() {
        Ok(req) => reply(&call.message_id, f(req)),
        Err(OcppError::JsonError(e)) => {
            warn!("Malformed {} payload: {}", call.action, e);
            OcppMessage::CallError(CallError::new(
                call.message_id.clone(),
                ErrorCode::FormationViolation,
                e.to_string(),
            ))
        }
        Err(e) => OcppMessage::CallError(CallError::new(
            call.message_id.clone(),
            ErrorCode::GenericError,
            e.to_string(),
        )),
    }
}

/// Route an inbound call to the handler and build the frame to send back
pub fn dispatch(handler: &dyn CoreHandler, call: &Call) -> OcppMessage {
    debug!("Dispatching {} ({})", call.action, call.message_id);

    match call.action {
        Action::ChangeAvailability => handle(call, |r| handler.on_change_availability(r)),
        Action::ChangeConfiguration => handle(call, |r| handler.on_change_configuration(r)),
        Action::ClearCache => handle(call, |r| handler.on_clear_cache(r)),
        Action::DataTransfer => handle(call, |r| handler.on_data_transfer(r)),
        Action::GetConfiguration => handle(call, |r| handler.on_get_configuration(r)),
        Action::RemoteStartTransaction => {
            handle(call, |r| handler.on_remote_start_transaction(r))
        }
        Action::RemoteStopTransaction => handle(call, |r| handler.on_remote_stop_transaction(r)),
        Action::Reset => handle(call, |r| handler.on_reset(r)),
        Action::UnlockConnector => handle(call, |r| handler.on_unlock_connector(r)),
        // Charge point initiated, never accepted from the central system
        Action::StatusNotification => OcppMessage::CallError(CallError::new(
            call.message_id.clone(),
            ErrorCode::NotSupported,
            format!("{} is not a central system call", call.action),
        )),
    }
}
