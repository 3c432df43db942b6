//! Async front of the bridge.
//!
//! One task owns the [`Broker`] and processes commands from an unbounded
//! channel in arrival order, so slot and gate mutations never race. Bridge
//! calls go in through [`FileBridge`] and wait on a oneshot reply. Permission
//! prompts and pickers report back through an [`EventSink`], which only
//! enqueues and never touches state itself.
//!
//! File reads and writes run on tokio's blocking pool. The owning task only
//! hands them off, so a slow store never holds up queued events.

use std::future::Future;

use tokio::sync::{mpsc, oneshot};

use crate::broker::{read_text, write_payload, Broker, Caller, Platform, Reply, Settlement};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::store::SharedStore;
use crate::types::{
    BridgeStatus, Capability, OpenFileOptions, OpenFileResponse, PermissionStatus, PickerOutcome,
    ReadFileOptions, ReadFileResponse, RequestToken, Resolution, ResultEvent, SaveFileOptions,
    SaveFileResponse,
};

/// Events delivered by the environment, out of band
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    PermissionResult {
        capability: Capability,
        status: PermissionStatus,
    },
    PickerResult(ResultEvent),
    /// The host is going away; pending calls are dropped unresolved
    Teardown,
}

enum Command {
    Save {
        options: SaveFileOptions,
        reply: Reply,
    },
    Open {
        options: OpenFileOptions,
        reply: Reply,
    },
    Status {
        reply: oneshot::Sender<BridgeStatus>,
    },
    Event(BridgeEvent),
    Shutdown,
}

/// Cloneable handle the environment uses to report decisions and results
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Command>,
}

impl EventSink {
    pub fn send(&self, event: BridgeEvent) {
        if self.tx.send(Command::Event(event)).is_err() {
            tracing::warn!("bridge stopped, dropping environment event");
        }
    }

    pub fn picker_result(&self, token: RequestToken, outcome: PickerOutcome) {
        self.send(BridgeEvent::PickerResult(ResultEvent { token, outcome }));
    }

    pub fn permission_result(&self, capability: Capability, status: PermissionStatus) {
        self.send(BridgeEvent::PermissionResult { capability, status });
    }

    pub fn teardown(&self) {
        self.send(BridgeEvent::Teardown);
    }
}

/// Caller-side handle to the bridge task
#[derive(Clone)]
pub struct FileBridge {
    tx: mpsc::UnboundedSender<Command>,
    store: SharedStore,
}

impl FileBridge {
    /// Build the bridge and the task that drives it.
    ///
    /// `build` receives the event sink so the platform can report back. The
    /// returned future must be spawned on the host's runtime.
    pub fn new<E, F>(
        config: BridgeConfig,
        store: SharedStore,
        build: F,
    ) -> (Self, impl Future<Output = ()> + Send + 'static)
    where
        E: Platform + Send + 'static,
        F: FnOnce(EventSink) -> E,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let platform = build(EventSink { tx: tx.clone() });
        let broker = Broker::new(platform, store.clone(), config);
        (Self { tx, store }, run(broker, rx))
    }

    /// [`FileBridge::new`] plus `tokio::spawn`. Must be called inside a runtime.
    pub fn start<E, F>(config: BridgeConfig, store: SharedStore, build: F) -> Self
    where
        E: Platform + Send + 'static,
        F: FnOnce(EventSink) -> E,
    {
        let (bridge, task) = Self::new(config, store, build);
        tokio::spawn(task);
        bridge
    }

    pub fn event_sink(&self) -> EventSink {
        EventSink { tx: self.tx.clone() }
    }

    pub async fn save_file(&self, options: SaveFileOptions) -> Result<SaveFileResponse, BridgeError> {
        self.call(|reply| Command::Save { options, reply }).await??.into_saved()
    }

    pub async fn open_file(&self, options: OpenFileOptions) -> Result<OpenFileResponse, BridgeError> {
        self.call(|reply| Command::Open { options, reply }).await??.into_opened()
    }

    /// Reads touch no pending state, so they skip the bridge task entirely
    pub async fn read_file(&self, options: ReadFileOptions) -> Result<ReadFileResponse, BridgeError> {
        let store = self.store.clone();
        blocking(move || read_text(store.as_ref(), options)).await
    }

    pub async fn status(&self) -> Result<BridgeStatus, BridgeError> {
        self.call(|reply| Command::Status { reply }).await
    }

    /// Stop the task. Calls still pending are dropped and see `BridgeClosed`.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }

    async fn call<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| BridgeError::BridgeClosed)?;
        rx.await.map_err(|_| BridgeError::BridgeClosed)
    }
}

impl Resolution {
    fn into_saved(self) -> Result<SaveFileResponse, BridgeError> {
        match self {
            Resolution::Saved(response) => Ok(response),
            Resolution::Opened(_) => Err(BridgeError::PickerFailed(
                "open result delivered to a save call".to_string(),
            )),
        }
    }

    fn into_opened(self) -> Result<OpenFileResponse, BridgeError> {
        match self {
            Resolution::Opened(response) => Ok(response),
            Resolution::Saved(_) => Err(BridgeError::PickerFailed(
                "save result delivered to an open call".to_string(),
            )),
        }
    }
}

/// Run blocking store I/O on the blocking pool
async fn blocking<T, F>(job: F) -> Result<T, BridgeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BridgeError> + Send + 'static,
{
    tokio::task::spawn_blocking(job).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "blocking I/O job failed");
        Err(BridgeError::IoFailure(format!("I/O task failed: {}", e)))
    })
}

fn settle_picker_result<E: Platform>(broker: &mut Broker<E, Reply>, event: ResultEvent) {
    match broker.settle(event) {
        Some(Settlement::Write {
            caller,
            handle,
            bytes,
        }) => {
            let store = broker.store();
            tokio::spawn(async move {
                let result = blocking(move || write_payload(store.as_ref(), &handle, &bytes)).await;
                caller.resolve(result);
            });
        }
        Some(Settlement::Resolved { caller, result }) => caller.resolve(result),
        None => {}
    }
}

async fn run<E: Platform>(mut broker: Broker<E, Reply>, mut rx: mpsc::UnboundedReceiver<Command>) {
    tracing::info!("file bridge started");
    while let Some(command) = rx.recv().await {
        match command {
            Command::Save { options, reply } => broker.save_file(options, reply),
            Command::Open { options, reply } => broker.open_file(options, reply),
            Command::Status { reply } => {
                let _ = reply.send(broker.status());
            }
            Command::Event(BridgeEvent::PermissionResult { capability, status }) => {
                broker.on_permission_result(capability, status)
            }
            Command::Event(BridgeEvent::PickerResult(event)) => settle_picker_result(&mut broker, event),
            Command::Event(BridgeEvent::Teardown) => broker.teardown(),
            Command::Shutdown => break,
        }
    }
    broker.teardown();
    tracing::info!("file bridge stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picker::{CreateDocument, DocumentPicker, OpenDocument};
    use crate::permission::PermissionSource;
    use crate::store::{ByteStore, MemoryStore};
    use crate::types::{OperationKind, OperationState, ResourceHandle};
    use std::io;
    use std::sync::{mpsc as std_mpsc, Arc, Mutex};

    /// Grants everything and answers every picker immediately through the sink
    struct EchoPlatform {
        events: EventSink,
    }

    impl PermissionSource for EchoPlatform {
        fn permission_status(&self, _capability: Capability) -> PermissionStatus {
            PermissionStatus::Granted
        }

        fn request_permission(&mut self, _capability: Capability) {}
    }

    impl DocumentPicker for EchoPlatform {
        fn create_document(&mut self, token: RequestToken, request: &CreateDocument) -> Result<(), String> {
            let handle = ResourceHandle::new(format!("content://echo/{}", request.file_name));
            self.events.picker_result(token, PickerOutcome::Completed(handle));
            Ok(())
        }

        fn open_document(&mut self, token: RequestToken, _request: &OpenDocument) -> Result<(), String> {
            self.events.picker_result(token, PickerOutcome::Cancelled);
            Ok(())
        }
    }

    /// Every read and write blocks until the test lets one through
    struct GatedStore {
        inner: MemoryStore,
        release: Mutex<std_mpsc::Receiver<()>>,
    }

    impl GatedStore {
        fn wait(&self) {
            let _ = self.release.lock().unwrap().recv();
        }
    }

    impl ByteStore for GatedStore {
        fn write(&self, handle: &ResourceHandle, bytes: &[u8]) -> io::Result<()> {
            self.wait();
            self.inner.write(handle, bytes)
        }

        fn read(&self, path: &str) -> io::Result<Vec<u8>> {
            self.wait();
            self.inner.read(path)
        }
    }

    fn echo_bridge(store: SharedStore) -> FileBridge {
        FileBridge::start(BridgeConfig::default(), store, |events| EchoPlatform { events })
    }

    fn gated(inner: MemoryStore) -> (SharedStore, std_mpsc::Sender<()>) {
        let (release, rx) = std_mpsc::channel();
        let store = GatedStore {
            inner,
            release: Mutex::new(rx),
        };
        (Arc::new(store), release)
    }

    #[test_log::test(tokio::test)]
    async fn test_save_round_trip_through_task() {
        let store = MemoryStore::new();
        let bridge = echo_bridge(Arc::new(store.clone()));

        let response = bridge
            .save_file(SaveFileOptions {
                file_name: Some("notes.txt".to_string()),
                file_content: "aGVsbG8=".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.uri, "content://echo/notes.txt");
        assert!(response.success);
        assert_eq!(store.get("content://echo/notes.txt"), Some(b"hello".to_vec()));
    }

    #[test_log::test(tokio::test)]
    async fn test_open_cancelled_through_task() {
        let bridge = echo_bridge(Arc::new(MemoryStore::new()));
        let err = bridge.open_file(OpenFileOptions::default()).await.unwrap_err();
        assert_eq!(err, BridgeError::UserCancelled(OperationKind::Open));

        let status = bridge.status().await.unwrap();
        assert!(status
            .operations
            .iter()
            .all(|op| op.state == OperationState::Idle));
    }

    #[test_log::test(tokio::test)]
    async fn test_read_file_through_task() {
        let store = MemoryStore::new();
        store.insert("/vault.json", "{}");
        let bridge = echo_bridge(Arc::new(store));
        let response = bridge
            .read_file(ReadFileOptions {
                path: Some("/vault.json".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(response.data, "{}");
    }

    #[test_log::test(tokio::test)]
    async fn test_slow_read_does_not_hold_up_the_task() {
        let inner = MemoryStore::new();
        inner.insert("/big.json", "{}");
        let (store, release) = gated(inner);
        let bridge = echo_bridge(store);

        let reader = bridge.clone();
        let read = tokio::spawn(async move {
            reader
                .read_file(ReadFileOptions {
                    path: Some("/big.json".to_string()),
                })
                .await
        });

        // Status and a full open round-trip are answered while the read is stuck
        bridge.status().await.unwrap();
        let err = bridge.open_file(OpenFileOptions::default()).await.unwrap_err();
        assert_eq!(err, BridgeError::UserCancelled(OperationKind::Open));
        assert!(!read.is_finished());

        release.send(()).unwrap();
        assert_eq!(read.await.unwrap().unwrap().data, "{}");
    }

    #[test_log::test(tokio::test)]
    async fn test_slow_write_does_not_hold_up_other_events() {
        let inner = MemoryStore::new();
        let (store, release) = gated(inner.clone());
        let bridge = echo_bridge(store);

        let saver = bridge.clone();
        let save = tokio::spawn(async move {
            saver
                .save_file(SaveFileOptions {
                    file_name: Some("big.json".to_string()),
                    file_content: "e30=".to_string(),
                    ..Default::default()
                })
                .await
        });

        let err = bridge.open_file(OpenFileOptions::default()).await.unwrap_err();
        assert_eq!(err, BridgeError::UserCancelled(OperationKind::Open));
        assert!(!save.is_finished());

        release.send(()).unwrap();
        assert_eq!(save.await.unwrap().unwrap().uri, "content://echo/big.json");
        assert_eq!(inner.get("content://echo/big.json"), Some(b"{}".to_vec()));
    }

    #[test_log::test(tokio::test)]
    async fn test_calls_after_shutdown_see_bridge_closed() {
        let bridge = echo_bridge(Arc::new(MemoryStore::new()));
        bridge.shutdown();
        let err = bridge.status().await.unwrap_err();
        assert_eq!(err, BridgeError::BridgeClosed);
        let err = bridge.open_file(OpenFileOptions::default()).await.unwrap_err();
        assert_eq!(err, BridgeError::BridgeClosed);
    }
}
