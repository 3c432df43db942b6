//! Pending-call slots: one in-flight picker round-trip per operation kind.
//!
//! The slot owns the request and the caller handle from dispatch until the
//! matching picker result arrives. A callback whose token does not match the
//! stored entry is ignored, which makes duplicate delivery a no-op.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::BridgeError;
use crate::types::{OperationKind, OperationRequest, RequestToken};

#[derive(Debug)]
pub struct PendingEntry<C> {
    pub token: RequestToken,
    pub request: OperationRequest,
    pub caller: C,
    pub dispatched_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct PendingSlots<C> {
    entries: HashMap<OperationKind, PendingEntry<C>>,
}

impl<C> PendingSlots<C> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Store a dispatched call. Fails if `kind` already holds one; the
    /// existing entry is left untouched and the new caller is handed back.
    pub fn put(
        &mut self,
        kind: OperationKind,
        token: RequestToken,
        request: OperationRequest,
        caller: C,
    ) -> Result<(), (BridgeError, C)> {
        if self.entries.contains_key(&kind) {
            return Err((BridgeError::CallAlreadyPending(kind), caller));
        }
        self.entries.insert(
            kind,
            PendingEntry {
                token,
                request,
                caller,
                dispatched_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Remove and return the entry for `kind` only if its token matches
    pub fn take_matching(&mut self, kind: OperationKind, token: RequestToken) -> Option<(OperationRequest, C)> {
        match self.entries.get(&kind) {
            Some(entry) if entry.token == token => self
                .entries
                .remove(&kind)
                .map(|entry| (entry.request, entry.caller)),
            _ => None,
        }
    }

    /// Drop the entry for `kind` without resolving it
    pub fn clear(&mut self, kind: OperationKind) -> Option<PendingEntry<C>> {
        self.entries.remove(&kind)
    }

    pub fn kind_for(&self, token: RequestToken) -> Option<OperationKind> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.token == token)
            .map(|(kind, _)| *kind)
    }

    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn token(&self, kind: OperationKind) -> Option<RequestToken> {
        self.entries.get(&kind).map(|entry| entry.token)
    }

    pub fn pending_since(&self, kind: OperationKind) -> Option<DateTime<Utc>> {
        self.entries.get(&kind).map(|entry| entry.dispatched_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C> Default for PendingSlots<C> {
    fn default() -> Self {
        Self::new()
    }
}
