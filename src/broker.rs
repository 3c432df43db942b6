//! Result correlator: the per-kind state machine behind `saveFile` and `openFile`.
//!
//! ```text
//! Idle --call--> AwaitingPermission --granted--> Dispatched --result--> Idle
//!   \                     \--denied--> Idle (PermissionDenied)
//!    \--call, already granted--> Dispatched
//! ```
//!
//! The broker owns the pending slots and the permission gate. It is not
//! thread-safe on purpose: [`crate::service`] runs it on a single task and
//! feeds it calls and environment events one at a time. Byte I/O is split
//! out through [`Broker::settle`] so that task never blocks on a file.

use tokio::sync::oneshot;

use crate::codec;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::permission::{Ensure, PermissionGate, PermissionSource};
use crate::picker::{DocumentPicker, PickerDispatch};
use crate::slot::PendingSlots;
use crate::store::{ByteStore, SharedStore};
use crate::types::{
    BridgeStatus, Capability, KindStatus, OpenFileOptions, OpenFileResponse, OperationKind,
    OperationRequest, OperationState, PermissionStatus, PickerOutcome, ReadFileOptions,
    ReadFileResponse, ResourceHandle, Resolution, ResultEvent, SaveFileOptions, SaveFileResponse,
};

/// Prompts and pickers of the host environment. Bytes go through a separate
/// [`ByteStore`].
pub trait Platform: PermissionSource + DocumentPicker {}

impl<T: PermissionSource + DocumentPicker> Platform for T {}

/// The original caller of a picker-backed operation. Resolved at most once.
pub trait Caller {
    fn resolve(self, result: Result<Resolution, BridgeError>);
}

pub type Reply = oneshot::Sender<Result<Resolution, BridgeError>>;

impl Caller for Reply {
    fn resolve(self, result: Result<Resolution, BridgeError>) {
        if self.send(result).is_err() {
            tracing::debug!("caller dropped before its result was delivered");
        }
    }
}

/// A matched picker result, taken out of its slot
#[derive(Debug)]
pub enum Settlement<C> {
    /// Nothing left to do but answer the caller
    Resolved {
        caller: C,
        result: Result<Resolution, BridgeError>,
    },
    /// The payload still has to be written behind `handle`
    Write {
        caller: C,
        handle: ResourceHandle,
        bytes: Vec<u8>,
    },
}

impl<C: Caller> Settlement<C> {
    /// Run the remaining I/O on the current thread and resolve the caller
    pub fn finish(self, store: &dyn ByteStore) {
        match self {
            Settlement::Resolved { caller, result } => caller.resolve(result),
            Settlement::Write {
                caller,
                handle,
                bytes,
            } => caller.resolve(write_payload(store, &handle, &bytes)),
        }
    }
}

/// Continuation parked in the permission gate while a prompt is up
#[derive(Debug)]
pub struct PendingAction<C> {
    pub kind: OperationKind,
    pub request: OperationRequest,
    pub caller: C,
}

pub struct Broker<E, C> {
    platform: E,
    store: SharedStore,
    config: BridgeConfig,
    gate: PermissionGate<PendingAction<C>>,
    slots: PendingSlots<C>,
    pickers: PickerDispatch,
}

impl<E: Platform, C: Caller> Broker<E, C> {
    pub fn new(platform: E, store: SharedStore, config: BridgeConfig) -> Self {
        Self {
            platform,
            store,
            config,
            gate: PermissionGate::new(),
            slots: PendingSlots::new(),
            pickers: PickerDispatch::new(),
        }
    }

    pub fn platform(&self) -> &E {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut E {
        &mut self.platform
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self, kind: OperationKind) -> OperationState {
        if self.slots.is_pending(kind) {
            OperationState::Dispatched
        } else if self.gate.any_waiting(|action| action.kind == kind) {
            OperationState::AwaitingPermission
        } else {
            OperationState::Idle
        }
    }

    pub fn status(&self) -> BridgeStatus {
        let operations = OperationKind::ALL
            .iter()
            .map(|&kind| KindStatus {
                kind,
                state: self.state(kind),
                token: self.slots.token(kind),
                pending_since: self.slots.pending_since(kind).map(|t| t.to_rfc3339()),
            })
            .collect();
        BridgeStatus { operations }
    }

    pub fn save_file(&mut self, options: SaveFileOptions, caller: C) {
        tracing::debug!("saveFile called");
        if self.state(OperationKind::Save) != OperationState::Idle {
            caller.resolve(Err(BridgeError::CallAlreadyPending(OperationKind::Save)));
            return;
        }
        match self.save_request(options) {
            Ok(request) => self.begin(request, caller),
            Err(e) => {
                tracing::warn!(error = %e, "rejecting saveFile before dispatch");
                caller.resolve(Err(e));
            }
        }
    }

    pub fn open_file(&mut self, options: OpenFileOptions, caller: C) {
        tracing::debug!("openFile called");
        if self.state(OperationKind::Open) != OperationState::Idle {
            caller.resolve(Err(BridgeError::CallAlreadyPending(OperationKind::Open)));
            return;
        }
        let request = self.open_request(options);
        self.begin(request, caller);
    }

    /// `readFile` has no picker round-trip and resolves immediately
    pub fn read_file(&self, options: ReadFileOptions) -> Result<ReadFileResponse, BridgeError> {
        read_text(self.store.as_ref(), options)
    }

    /// Decision from the environment's permission subsystem
    pub fn on_permission_result(&mut self, capability: Capability, status: PermissionStatus) {
        let Some((action, status)) = self.gate.on_decision(capability, status) else {
            return;
        };
        match status {
            PermissionStatus::Granted => {
                tracing::info!(kind = %action.kind, %capability, "permission granted, continuing");
                self.dispatch(action);
            }
            // A dismissed prompt counts as a denial
            PermissionStatus::Denied | PermissionStatus::Unknown => {
                tracing::info!(kind = %action.kind, %capability, "permission denied");
                action.caller.resolve(Err(BridgeError::PermissionDenied(capability)));
            }
        }
    }

    /// Out-of-band completion of a picker, writing inline
    pub fn on_picker_result(&mut self, event: ResultEvent) {
        if let Some(settlement) = self.settle(event) {
            settlement.finish(self.store.as_ref());
        }
    }

    /// Match a picker result to its pending call and free the slot.
    ///
    /// Returns `None` for stale or unknown tokens. A completed save comes
    /// back as [`Settlement::Write`]; the caller is resolved once the bytes
    /// are written.
    pub fn settle(&mut self, event: ResultEvent) -> Option<Settlement<C>> {
        let ResultEvent { token, outcome } = event;
        let Some(kind) = self.slots.kind_for(token) else {
            tracing::warn!(%token, "dropping picker result with no matching pending call");
            return None;
        };
        let (request, caller) = self.slots.take_matching(kind, token)?;
        tracing::debug!(%kind, %token, "picker result matched");

        let handle = match outcome {
            PickerOutcome::Completed(handle) => handle,
            PickerOutcome::Cancelled => {
                return Some(rejected(caller, BridgeError::UserCancelled(kind)))
            }
            PickerOutcome::Failed(reason) => {
                return Some(rejected(caller, BridgeError::PickerFailed(reason)))
            }
        };
        Some(match kind {
            OperationKind::Save => Settlement::Write {
                caller,
                handle,
                bytes: request.payload.unwrap_or_default(),
            },
            OperationKind::Open => Settlement::Resolved {
                caller,
                result: Ok(Resolution::Opened(OpenFileResponse {
                    path: handle.path(),
                    uri: handle.to_string(),
                })),
            },
        })
    }

    /// Environment teardown: every waiting caller is discarded unresolved
    pub fn teardown(&mut self) {
        let parked = self.gate.clear().len();
        let dispatched = OperationKind::ALL
            .iter()
            .filter_map(|&kind| self.slots.clear(kind))
            .count();
        if parked + dispatched > 0 {
            tracing::warn!(parked, dispatched, "teardown discarded pending calls");
        }
    }

    fn save_request(&self, options: SaveFileOptions) -> Result<OperationRequest, BridgeError> {
        let encoding = match options.encoding.as_deref() {
            Some(name) => codec::parse_encoding(name)?,
            None => self.config.default_encoding,
        };
        let payload = codec::decode(&options.file_content, encoding)?;
        Ok(OperationRequest {
            kind: OperationKind::Save,
            target_name: non_blank(options.file_name).unwrap_or_else(|| self.config.default_file_name.clone()),
            mime_type: non_blank(options.mime_type)
                .unwrap_or_else(|| self.config.default_save_mime_type.clone()),
            payload: Some(payload),
            encoding,
            accepted_extensions: Vec::new(),
        })
    }

    fn open_request(&self, options: OpenFileOptions) -> OperationRequest {
        OperationRequest {
            kind: OperationKind::Open,
            target_name: String::new(),
            mime_type: non_blank(options.mime_type)
                .unwrap_or_else(|| self.config.default_open_mime_type.clone()),
            payload: None,
            encoding: self.config.default_encoding,
            accepted_extensions: options.extensions,
        }
    }

    fn begin(&mut self, request: OperationRequest, caller: C) {
        let kind = request.kind;
        let action = PendingAction { kind, request, caller };
        let Some(capability) = self.config.capability_for(kind) else {
            self.dispatch(action);
            return;
        };
        match self.gate.ensure_granted(&mut self.platform, capability, action) {
            Ok(Ensure::Granted(action)) => self.dispatch(action),
            Ok(Ensure::Requested) => {
                tracing::info!(%kind, %capability, "awaiting permission");
            }
            Err((e, action)) => action.caller.resolve(Err(e)),
        }
    }

    fn dispatch(&mut self, action: PendingAction<C>) {
        let PendingAction { kind, request, caller } = action;
        let dispatched = match kind {
            OperationKind::Save => {
                self.pickers
                    .dispatch_save(&mut self.platform, &request.target_name, &request.mime_type)
            }
            OperationKind::Open => self.pickers.dispatch_open(
                &mut self.platform,
                &request.mime_type,
                &request.accepted_extensions,
            ),
        };
        match dispatched {
            Ok(token) => {
                tracing::info!(%kind, %token, "picker dispatched");
                if let Err((e, caller)) = self.slots.put(kind, token, request, caller) {
                    caller.resolve(Err(e));
                }
            }
            Err(e) => {
                tracing::warn!(%kind, error = %e, "picker dispatch failed");
                caller.resolve(Err(e));
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn rejected<C>(caller: C, error: BridgeError) -> Settlement<C> {
    tracing::info!(error = %error, "call rejected");
    Settlement::Resolved {
        caller,
        result: Err(error),
    }
}

/// Write a save payload behind `handle`. Blocking.
pub fn write_payload(
    store: &dyn ByteStore,
    handle: &ResourceHandle,
    bytes: &[u8],
) -> Result<Resolution, BridgeError> {
    store.write(handle, bytes).map_err(|e| {
        tracing::warn!(uri = %handle, error = %e, "Error writing to file");
        BridgeError::IoFailure(format!("Error writing to file: {}", e))
    })?;
    tracing::info!(uri = %handle, bytes = bytes.len(), "File successfully saved");
    Ok(Resolution::Saved(SaveFileResponse {
        uri: handle.to_string(),
        success: true,
    }))
}

/// Body of `readFile`. Blocking.
pub fn read_text(store: &dyn ByteStore, options: ReadFileOptions) -> Result<ReadFileResponse, BridgeError> {
    let path = options
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or(BridgeError::MissingPath)?;
    let bytes = store.read(&path).map_err(|e| {
        tracing::warn!(%path, error = %e, "Error reading file");
        BridgeError::IoFailure(format!("Error reading file: {}", e))
    })?;
    Ok(ReadFileResponse {
        data: codec::bytes_to_text(&bytes),
    })
}
