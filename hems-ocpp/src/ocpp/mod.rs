//! OCPP 1.6 protocol implementation
//!
//! This module provides the charge point side of OCPP-J:
//! - `types`: Core profile message types and data structures
//! - `messages`: RPC framing (CALL, CALLRESULT, CALLERROR)
//! - `handler`: capability trait answering central system calls
//! - `client`: WebSocket client and the `ChargePoint` seam used by the reporter

pub mod types;
pub mod messages;
pub mod handler;
pub mod client;

pub use types::*;
pub use messages::*;
pub use handler::{dispatch, CoreHandler};
pub use client::{build_ocpp_url, ChargePoint, OcppClient, OcppClientConfig, OCPP_SUBPROTOCOL};
