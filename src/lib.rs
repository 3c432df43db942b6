//! Native "save file" / "open file" bridge for web front ends.
//!
//! A call from the front end goes through a permission gate, starts the
//! platform's document picker and is parked in a per-kind pending slot until
//! the picker reports back on a different path. The broker then writes or
//! reads through the byte store, off the state-owning task, and resolves the
//! original call exactly once.
//!
//! - [`service::FileBridge`] - async handle; one task owns all state
//! - [`broker::Broker`] - the per-kind state machine
//! - [`plugin`] - Tauri registration (feature `tauri`)

pub mod broker;
pub mod codec;
pub mod config;
pub mod error;
pub mod permission;
pub mod picker;
pub mod service;
pub mod slot;
pub mod store;
pub mod types;

#[cfg(feature = "tauri")]
pub mod plugin;

pub use broker::{Broker, Caller, Platform, Settlement};
pub use config::{BridgeConfig, ConfigError};
pub use error::BridgeError;
pub use service::{BridgeEvent, EventSink, FileBridge};
pub use store::{ByteStore, SharedStore};
pub use types::{
    Capability, OpenFileOptions, OpenFileResponse, OperationKind, OperationState, PermissionStatus,
    PickerOutcome, ReadFileOptions, ReadFileResponse, RequestToken, ResourceHandle, SaveFileOptions,
    SaveFileResponse,
};

#[cfg(feature = "tauri")]
pub use plugin::{init, init_with_config, FileBridgeExt};
