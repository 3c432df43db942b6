//! Permission gate in front of every picker dispatch.
//!
//! The environment owns the actual permission state. The gate only reads it and,
//! when a capability is missing, asks the environment to prompt and parks the
//! caller's continuation until the decision comes back through
//! [`PermissionGate::on_decision`]. One prompt per capability at a time.

use std::collections::HashMap;

use crate::error::BridgeError;
use crate::types::{Capability, PermissionStatus};

/// The environment's permission subsystem
pub trait PermissionSource {
    /// Current status, never blocks
    fn permission_status(&self, capability: Capability) -> PermissionStatus;

    /// Show the system prompt. The decision is delivered later, out of band.
    fn request_permission(&mut self, capability: Capability);
}

/// Result of [`PermissionGate::ensure_granted`]
#[derive(Debug)]
pub enum Ensure<K> {
    /// Already granted; the continuation is handed straight back to run now
    Granted(K),
    /// A prompt is up and the continuation is parked
    Requested,
}

/// Parked continuations, at most one per capability
#[derive(Debug)]
pub struct PermissionGate<K> {
    waiting: HashMap<Capability, K>,
}

impl<K> PermissionGate<K> {
    pub fn new() -> Self {
        Self {
            waiting: HashMap::new(),
        }
    }

    pub fn check_granted<P: PermissionSource + ?Sized>(&self, source: &P, capability: Capability) -> bool {
        source.permission_status(capability) == PermissionStatus::Granted
    }

    pub fn ensure_granted<P: PermissionSource + ?Sized>(
        &mut self,
        source: &mut P,
        capability: Capability,
        continuation: K,
    ) -> Result<Ensure<K>, (BridgeError, K)> {
        if self.waiting.contains_key(&capability) {
            return Err((BridgeError::PermissionRequestInProgress(capability), continuation));
        }
        if self.check_granted(source, capability) {
            return Ok(Ensure::Granted(continuation));
        }

        tracing::debug!(%capability, "requesting permission");
        self.waiting.insert(capability, continuation);
        source.request_permission(capability);
        Ok(Ensure::Requested)
    }

    /// Release the parked continuation for `capability`, once.
    ///
    /// Returns `None` when nothing was waiting (late or duplicate decision).
    pub fn on_decision(&mut self, capability: Capability, status: PermissionStatus) -> Option<(K, PermissionStatus)> {
        match self.waiting.remove(&capability) {
            Some(continuation) => Some((continuation, status)),
            None => {
                tracing::warn!(%capability, ?status, "permission decision with nothing waiting");
                None
            }
        }
    }

    pub fn is_waiting(&self, capability: Capability) -> bool {
        self.waiting.contains_key(&capability)
    }

    /// True if any parked continuation satisfies `pred`
    pub fn any_waiting(&self, pred: impl Fn(&K) -> bool) -> bool {
        self.waiting.values().any(pred)
    }

    /// Drop every parked continuation
    pub fn clear(&mut self) -> Vec<K> {
        self.waiting.drain().map(|(_, k)| k).collect()
    }
}

impl<K> Default for PermissionGate<K> {
    fn default() -> Self {
        Self::new()
    }
}
