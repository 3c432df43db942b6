//! Core data types for the file bridge
//!
//! This module contains the structures shared by the state machine and the bridge surface:
//! - Operation kinds, requests and request tokens
//! - Permission capabilities and their status
//! - External picker events and resource handles
//! - Wire-level options and responses for `saveFile`, `openFile` and `readFile`

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two picker-backed operations. Each kind has its own pending slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Save,
    Open,
}

impl OperationKind {
    pub const ALL: [OperationKind; 2] = [OperationKind::Save, OperationKind::Open];
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Save => f.write_str("save"),
            OperationKind::Open => f.write_str("open"),
        }
    }
}

/// Capabilities the environment's permission subsystem can grant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    ReadStorage,
    WriteStorage,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ReadStorage => f.write_str("read storage"),
            Capability::WriteStorage => f.write_str("write storage"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Unknown,
}

/// How `fileContent` is encoded on the wire
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "utf8", alias = "raw")]
    Raw,
    #[default]
    #[serde(rename = "base64")]
    Base64,
}

/// Opaque correlation token for one external round-trip.
///
/// Tokens come from a monotonically increasing counter and are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(pub u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A validated call, owned by the pending slot until it resolves
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub target_name: String,
    pub mime_type: String,
    /// Decoded bytes to write (save only)
    pub payload: Option<Vec<u8>>,
    pub encoding: Encoding,
    pub accepted_extensions: Vec<String>,
}

/// URI-like handle returned by the document picker
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(pub String);

impl ResourceHandle {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path component of the handle.
    ///
    /// `content://authority/document/12` gives `/document/12` and
    /// `file:///tmp/a%20b.json` gives `/tmp/a b.json`. Only URI handles are
    /// percent-decoded; a plain path is a literal file name and comes back
    /// unchanged, `%` included.
    pub fn path(&self) -> String {
        let Some((_, rest)) = self.0.split_once("://") else {
            return self.0.clone();
        };
        let raw = match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "",
        };
        // Query and fragment are not part of the path
        let raw = raw.split(['?', '#']).next().unwrap_or_default();
        urlencoding::decode(raw)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| raw.to_string())
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the user did with the picker
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PickerOutcome {
    Completed(ResourceHandle),
    Cancelled,
    Failed(String),
}

/// Out-of-band completion of a dispatched picker, tagged with its token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultEvent {
    pub token: RequestToken,
    pub outcome: PickerOutcome,
}

/// Per-kind position in the call lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationState {
    Idle,
    AwaitingPermission,
    Dispatched,
}

/// Arguments of `saveFile`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFileOptions {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_content: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Arguments of `openFile`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenFileOptions {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["*".to_string()]
}

/// Arguments of `readFile`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReadFileOptions {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFileResponse {
    pub uri: String,
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFileResponse {
    pub uri: String,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFileResponse {
    pub data: String,
}

/// Successful outcome of a picker-backed call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Saved(SaveFileResponse),
    Opened(OpenFileResponse),
}

/// Snapshot of one kind's lifecycle, for diagnostics
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindStatus {
    pub kind: OperationKind,
    pub state: OperationState,
    /// Token of the dispatched picker, if any
    pub token: Option<RequestToken>,
    /// RFC 3339 time the picker was dispatched
    pub pending_since: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BridgeStatus {
    pub operations: Vec<KindStatus>,
}
