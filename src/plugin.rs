// Tauri plugin for the file bridge
// Registers `save_file`, `open_file`, `read_file` and `bridge_status` under `plugin:file-bridge|...`
// and backs the broker with the dialog plugin (pickers) and the fs plugin (bytes).

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tauri::{
    plugin::{Builder, TauriPlugin},
    AppHandle, Manager, Runtime, State,
};
use tauri_plugin_dialog::DialogExt;
use tauri_plugin_fs::{FilePath, FsExt, OpenOptions};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::permission::PermissionSource;
use crate::picker::{CreateDocument, DocumentPicker, OpenDocument};
use crate::service::{EventSink, FileBridge};
use crate::store::ByteStore;
use crate::types::{
    BridgeStatus, Capability, OpenFileOptions, OpenFileResponse, PermissionStatus, PickerOutcome,
    ReadFileOptions, ReadFileResponse, RequestToken, ResourceHandle, SaveFileOptions,
    SaveFileResponse,
};

/// Prompts and pickers backed by tauri-plugin-dialog
pub struct TauriPlatform<R: Runtime> {
    app: AppHandle<R>,
    events: EventSink,
}

impl<R: Runtime> TauriPlatform<R> {
    pub fn new(app: AppHandle<R>, events: EventSink) -> Self {
        Self { app, events }
    }
}

// Document pickers hand out per-document grants, so no runtime storage
// permission is involved on any platform the dialog plugin supports.
impl<R: Runtime> PermissionSource for TauriPlatform<R> {
    fn permission_status(&self, _capability: Capability) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn request_permission(&mut self, capability: Capability) {
        self.events.permission_result(capability, PermissionStatus::Granted);
    }
}

impl<R: Runtime> DocumentPicker for TauriPlatform<R> {
    fn create_document(&mut self, token: RequestToken, request: &CreateDocument) -> Result<(), String> {
        let events = self.events.clone();
        let mut dialog = self.app.dialog().file().set_file_name(&request.file_name);

        let extension = std::path::Path::new(&request.file_name)
            .extension()
            .and_then(|e| e.to_str());
        if let Some(ext) = extension {
            dialog = dialog.add_filter(&request.mime_type, &[ext]);
        }

        dialog.save_file(move |path| events.picker_result(token, picked(path)));
        Ok(())
    }

    fn open_document(&mut self, token: RequestToken, request: &OpenDocument) -> Result<(), String> {
        let events = self.events.clone();
        let mut dialog = self.app.dialog().file();

        // MIME entries only mean something to document providers
        if let Some(extensions) = &request.extensions {
            let filter: Vec<&str> = extensions
                .iter()
                .filter(|e| !e.contains('/'))
                .map(|e| e.trim_start_matches('.'))
                .collect();
            if !filter.is_empty() {
                dialog = dialog.add_filter(&request.mime_type, &filter);
            }
        }

        dialog.pick_file(move |path| events.picker_result(token, picked(path)));
        Ok(())
    }
}

fn picked(path: Option<FilePath>) -> PickerOutcome {
    match path {
        Some(path) => PickerOutcome::Completed(ResourceHandle::new(path.to_string())),
        None => PickerOutcome::Cancelled,
    }
}

fn to_file_path(raw: &str) -> FilePath {
    raw.parse::<FilePath>()
        .unwrap_or_else(|_| FilePath::from(PathBuf::from(raw)))
}

/// Bytes through tauri-plugin-fs, which also understands `content://` handles
pub struct TauriStore<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TauriStore<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> ByteStore for TauriStore<R> {
    fn write(&self, handle: &ResourceHandle, bytes: &[u8]) -> io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        let mut file = self.app.fs().open(to_file_path(handle.as_str()), options)?;
        file.write_all(bytes)?;
        file.flush()
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.app.fs().read(to_file_path(path))
    }
}

#[tauri::command]
async fn save_file(
    bridge: State<'_, FileBridge>,
    options: SaveFileOptions,
) -> Result<SaveFileResponse, BridgeError> {
    bridge.save_file(options).await
}

#[tauri::command]
async fn open_file(
    bridge: State<'_, FileBridge>,
    options: OpenFileOptions,
) -> Result<OpenFileResponse, BridgeError> {
    bridge.open_file(options).await
}

#[tauri::command]
async fn read_file(
    bridge: State<'_, FileBridge>,
    options: ReadFileOptions,
) -> Result<ReadFileResponse, BridgeError> {
    bridge.read_file(options).await
}

#[tauri::command]
async fn bridge_status(bridge: State<'_, FileBridge>) -> Result<BridgeStatus, BridgeError> {
    bridge.status().await
}

/// Initialize the plugin with default settings
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    init_with_config(BridgeConfig::default())
}

pub fn init_with_config<R: Runtime>(config: BridgeConfig) -> TauriPlugin<R> {
    Builder::new("file-bridge")
        .invoke_handler(tauri::generate_handler![
            save_file,
            open_file,
            read_file,
            bridge_status
        ])
        .setup(move |app, _api| {
            let handle = app.clone();
            let store = Arc::new(TauriStore::new(app.clone()));
            let (bridge, task) =
                FileBridge::new(config, store, move |events| TauriPlatform::new(handle, events));
            tauri::async_runtime::spawn(task);
            app.manage(bridge);
            Ok(())
        })
        .on_drop(|app| {
            if let Some(bridge) = app.try_state::<FileBridge>() {
                bridge.shutdown();
            }
        })
        .build()
}

/// Extension trait for easy access to the bridge from app code
pub trait FileBridgeExt<R: Runtime> {
    fn file_bridge(&self) -> FileBridge;
}

impl<R: Runtime, T: Manager<R>> FileBridgeExt<R> for T {
    fn file_bridge(&self) -> FileBridge {
        self.state::<FileBridge>().inner().clone()
    }
}
