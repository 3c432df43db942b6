//! Failure taxonomy for bridge calls.
//!
//! Every variant is a terminal outcome for the call it resolves. The front end
//! receives `{ code, message }` so it can branch on `code` and show `message`.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::types::{Capability, OperationKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("permission denied: {0}")]
    PermissionDenied(Capability),

    #[error("a permission request for {0} is already in progress")]
    PermissionRequestInProgress(Capability),

    #[error("cannot start the document picker: {0}")]
    DispatchUnavailable(String),

    #[error("{0} cancelled by user")]
    UserCancelled(OperationKind),

    #[error("a {0} call is already pending")]
    CallAlreadyPending(OperationKind),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("I/O failure: {0}")]
    IoFailure(String),

    #[error("Path is required")]
    MissingPath,

    #[error("document picker failed: {0}")]
    PickerFailed(String),

    #[error("bridge closed before the call resolved")]
    BridgeClosed,
}

impl BridgeError {
    /// Stable name the front end can match on.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::PermissionDenied(_) => "PermissionDenied",
            BridgeError::PermissionRequestInProgress(_) => "PermissionRequestInProgress",
            BridgeError::DispatchUnavailable(_) => "DispatchUnavailable",
            BridgeError::UserCancelled(_) => "UserCancelled",
            BridgeError::CallAlreadyPending(_) => "CallAlreadyPending",
            BridgeError::MalformedPayload(_) => "MalformedPayload",
            BridgeError::IoFailure(_) => "IOFailure",
            BridgeError::MissingPath => "MissingPath",
            BridgeError::PickerFailed(_) => "PickerFailed",
            BridgeError::BridgeClosed => "BridgeClosed",
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::IoFailure(e.to_string())
    }
}

impl Serialize for BridgeError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BridgeError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
