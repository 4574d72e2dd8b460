//! Storage coordinator — routes graph CRUD to the remote or local store.
//!
//! The coordinator starts in `Remote` mode if the backend answers the startup
//! probe and in `Local` mode otherwise. A remote failure switches to `Local`;
//! saves are then retried once against the local store so they are never
//! lost. While in `Local`, the recovery probe task flips back to `Remote` as
//! soon as the backend answers again. Records written locally stay local.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use knowgraph_core::{Error, GraphRecord, KnowGraphConfig, Result};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::local::LocalStore;
use crate::probe::{AvailabilityProbe, DEFAULT_PROBE_TIMEOUT};
use crate::remote::RemoteStore;
use crate::transfer;

/// Which backend currently serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Remote,
    Local,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Non-fatal, user-visible transition message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The backend failed; requests now go to local storage.
    FellBack { reason: String },
    /// The backend answered the probe again.
    Recovered,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FellBack { reason } => {
                write!(f, "Server unavailable, using local storage ({})", reason)
            }
            Self::Recovered => write!(f, "Server is back online"),
        }
    }
}

/// Successful result plus where it came from.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub served_by: StorageMode,
    pub notice: Option<Notice>,
}

impl<T> Outcome<T> {
    fn new(value: T, served_by: StorageMode) -> Self {
        Self {
            value,
            served_by,
            notice: None,
        }
    }

    fn with_notice(mut self, notice: Notice) -> Self {
        self.notice = Some(notice);
        self
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Single CRUD surface over the remote and local graph stores.
pub struct StorageCoordinator {
    remote: RemoteStore,
    local: LocalStore,
    probe: AvailabilityProbe,
    probe_interval: Duration,
    mode: watch::Sender<StorageMode>,
    notices: broadcast::Sender<Notice>,
}

impl StorageCoordinator {
    /// Build a coordinator in a known mode without probing.
    pub fn new(
        remote: RemoteStore,
        local: LocalStore,
        probe: AvailabilityProbe,
        probe_interval: Duration,
        initial: StorageMode,
    ) -> Self {
        let (mode, _) = watch::channel(initial);
        let (notices, _) = broadcast::channel(16);
        Self {
            remote,
            local,
            probe,
            probe_interval,
            mode,
            notices,
        }
    }

    /// Build a coordinator, probing the backend once to pick the initial mode.
    pub async fn start(
        remote: RemoteStore,
        local: LocalStore,
        probe: AvailabilityProbe,
        probe_interval: Duration,
    ) -> Self {
        let initial = if probe.check().await {
            StorageMode::Remote
        } else {
            StorageMode::Local
        };
        info!(
            "StorageCoordinator initialized: mode={}, api={}",
            initial,
            remote.base_url()
        );
        Self::new(remote, local, probe, probe_interval, initial)
    }

    /// Build stores from configuration and probe once.
    pub async fn connect(config: &KnowGraphConfig) -> Result<Self> {
        let remote = RemoteStore::new(&config.api_url, config.request_timeout())?;
        let local = LocalStore::open(&config.data_paths.local)?;
        let probe = AvailabilityProbe::new(
            &remote,
            DEFAULT_PROBE_TIMEOUT.min(config.request_timeout()),
        );
        Ok(Self::start(remote, local, probe, config.probe_interval()).await)
    }

    // ---------------------------------------------------------------
    // Mode
    // ---------------------------------------------------------------

    pub fn mode(&self) -> StorageMode {
        *self.mode.borrow()
    }

    /// Watch mode transitions.
    pub fn subscribe(&self) -> watch::Receiver<StorageMode> {
        self.mode.subscribe()
    }

    /// Receive fallback/recovery notices as they happen.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Explicit toggle. `Remote` is not re-probed.
    pub fn force_mode(&self, mode: StorageMode) {
        if self.set_mode(mode) {
            info!("Storage mode forced to {}", mode);
        }
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    /// Returns true if the mode changed.
    fn set_mode(&self, new: StorageMode) -> bool {
        self.mode.send_if_modified(|current| {
            if *current == new {
                false
            } else {
                *current = new;
                true
            }
        })
    }

    fn fall_back(&self, cause: &Error) -> Notice {
        let notice = Notice::FellBack {
            reason: cause.to_string(),
        };
        if self.set_mode(StorageMode::Local) {
            warn!("Remote store failed, switching to local storage: {}", cause);
            let _ = self.notices.send(notice.clone());
        }
        notice
    }

    // ---------------------------------------------------------------
    // Recovery
    // ---------------------------------------------------------------

    /// Run one probe cycle. Only probes while in `Local`; returns true if the
    /// coordinator switched back to `Remote`.
    pub async fn run_probe_cycle(&self) -> bool {
        if self.mode() == StorageMode::Remote {
            return false;
        }
        if !self.probe.check().await {
            debug!("Remote still unavailable");
            return false;
        }
        // A forced switch may have happened while the probe was in flight.
        if self.set_mode(StorageMode::Remote) {
            info!("Remote store reachable again, switching to remote storage");
            let _ = self.notices.send(Notice::Recovered);
            return true;
        }
        false
    }

    /// Spawn the periodic recovery probe. The task ends once the coordinator
    /// is dropped.
    pub fn spawn_recovery_probe(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.probe_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(coordinator) = weak.upgrade() else {
                    break;
                };
                coordinator.run_probe_cycle().await;
            }
        })
    }

    // ---------------------------------------------------------------
    // CRUD
    // ---------------------------------------------------------------

    pub async fn list_graphs(&self) -> Result<Outcome<Vec<GraphRecord>>> {
        if self.mode() == StorageMode::Local {
            return Ok(Outcome::new(self.local.list()?, StorageMode::Local));
        }
        match self.remote.list().await {
            Ok(graphs) => Ok(Outcome::new(graphs, StorageMode::Remote)),
            Err(e) if e.is_remote_unavailable() => {
                let notice = self.fall_back(&e);
                let graphs = self.local.list()?;
                Ok(Outcome::new(graphs, StorageMode::Local).with_notice(notice))
            }
            Err(e) => Err(e),
        }
    }

    /// Reads fall back to local storage only when it holds the same id.
    pub async fn load_graph(&self, id: &str) -> Result<Outcome<GraphRecord>> {
        if self.mode() == StorageMode::Local {
            return Ok(Outcome::new(self.local.get(id)?, StorageMode::Local));
        }
        match self.remote.get(id).await {
            Ok(graph) => Ok(Outcome::new(graph, StorageMode::Remote)),
            Err(e) if e.is_remote_unavailable() => {
                let notice = self.fall_back(&e);
                if !self.local.contains(id) {
                    return Err(Error::NotFound(format!(
                        "graph {} (server unavailable and no local copy)",
                        id
                    )));
                }
                let graph = self.local.get(id)?;
                Ok(Outcome::new(graph, StorageMode::Local).with_notice(notice))
            }
            Err(e) => Err(e),
        }
    }

    /// Saves are retried once against local storage if the remote fails.
    pub async fn save_graph(&self, record: &GraphRecord) -> Result<Outcome<GraphRecord>> {
        record.validate()?;

        if self.mode() == StorageMode::Local {
            return Ok(Outcome::new(self.local.save(record)?, StorageMode::Local));
        }
        match self.remote.save(record).await {
            Ok(saved) => Ok(Outcome::new(saved, StorageMode::Remote)),
            Err(e) if e.is_remote_unavailable() => {
                let notice = self.fall_back(&e);
                match self.local.save(record) {
                    Ok(saved) => Ok(Outcome::new(saved, StorageMode::Local).with_notice(notice)),
                    Err(local_err) => Err(Error::StorageWriteFailure(format!(
                        "save failed on server ({}) and locally ({})",
                        e, local_err
                    ))),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Returns false when no graph matched. After a remote failure only a
    /// locally known id is deleted locally.
    pub async fn delete_graph(&self, id: &str) -> Result<Outcome<bool>> {
        if self.mode() == StorageMode::Local {
            return Ok(Outcome::new(self.local.delete(id)?, StorageMode::Local));
        }
        match self.remote.delete(id).await {
            Ok(deleted) => Ok(Outcome::new(deleted, StorageMode::Remote)),
            Err(e) if e.is_remote_unavailable() => {
                let notice = self.fall_back(&e);
                if !self.local.contains(id) {
                    return Err(e);
                }
                let deleted = self.local.delete(id)?;
                Ok(Outcome::new(deleted, StorageMode::Local).with_notice(notice))
            }
            Err(e) => Err(e),
        }
    }

    // ---------------------------------------------------------------
    // Import / Export
    // ---------------------------------------------------------------

    /// Validate an imported document and save it as a new graph.
    pub async fn import_graph(&self, json: &str) -> Result<Outcome<GraphRecord>> {
        let record = transfer::parse_graph(json)?;
        self.save_graph(&record).await
    }

    /// Load a graph and render it as pretty-printed JSON.
    pub async fn export_graph(&self, id: &str) -> Result<Outcome<String>> {
        let loaded = self.load_graph(id).await?;
        let json = transfer::to_json(&loaded.value)?;
        Ok(Outcome {
            value: json,
            served_by: loaded.served_by,
            notice: loaded.notice,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FileKeyValueStore, MemoryKeyValueStore};
    use knowgraph_core::NodeRecord;

    /// Nothing listens on port 9, so every remote call fails fast.
    const DEAD_API: &str = "http://127.0.0.1:9/api";

    fn offline_coordinator(initial: StorageMode) -> StorageCoordinator {
        let remote = RemoteStore::new(DEAD_API, Duration::from_secs(1)).unwrap();
        let probe = AvailabilityProbe::new(&remote, Duration::from_millis(500));
        let local = LocalStore::new(Arc::new(MemoryKeyValueStore::new()));
        StorageCoordinator::new(remote, local, probe, Duration::from_secs(30), initial)
    }

    fn demo() -> GraphRecord {
        GraphRecord::new("Demo").with_node(NodeRecord::new("1", "A"))
    }

    #[tokio::test]
    async fn test_start_offline_picks_local() {
        let remote = RemoteStore::new(DEAD_API, Duration::from_secs(1)).unwrap();
        let probe = AvailabilityProbe::new(&remote, Duration::from_millis(500));
        let local = LocalStore::new(Arc::new(MemoryKeyValueStore::new()));
        let coordinator =
            StorageCoordinator::start(remote, local, probe, Duration::from_secs(30)).await;
        assert_eq!(coordinator.mode(), StorageMode::Local);
    }

    #[tokio::test]
    async fn test_save_falls_back_when_remote_down() {
        let coordinator = offline_coordinator(StorageMode::Remote);
        let mut notices = coordinator.notices();

        let outcome = coordinator.save_graph(&demo()).await.unwrap();
        assert_eq!(outcome.served_by, StorageMode::Local);
        assert!(matches!(outcome.notice, Some(Notice::FellBack { .. })));
        assert!(outcome.value.id.is_some());
        assert_eq!(outcome.value.created_at, outcome.value.updated_at);
        assert_eq!(coordinator.mode(), StorageMode::Local);
        assert!(matches!(notices.try_recv(), Ok(Notice::FellBack { .. })));

        let listed = coordinator.list_graphs().await.unwrap();
        assert_eq!(listed.value.len(), 1);
        assert!(listed.value[0].same_content(&demo()));
        assert!(listed.notice.is_none());
    }

    #[tokio::test]
    async fn test_save_fails_when_both_stores_fail() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKeyValueStore::new(&dir.path().join("kv")).unwrap();
        std::fs::remove_dir_all(dir.path().join("kv")).unwrap();

        let remote = RemoteStore::new(DEAD_API, Duration::from_secs(1)).unwrap();
        let probe = AvailabilityProbe::new(&remote, Duration::from_millis(500));
        let local = LocalStore::new(Arc::new(kv));
        let coordinator = StorageCoordinator::new(
            remote,
            local,
            probe,
            Duration::from_secs(30),
            StorageMode::Remote,
        );

        let err = coordinator.save_graph(&demo()).await.unwrap_err();
        assert!(matches!(err, Error::StorageWriteFailure(_)));
        assert_eq!(coordinator.mode(), StorageMode::Local);

        // already local: the local failure surfaces directly
        let err = coordinator.save_graph(&demo()).await.unwrap_err();
        assert!(matches!(err, Error::StorageWriteFailure(_)));
    }

    #[tokio::test]
    async fn test_invalid_input_not_retried() {
        let coordinator = offline_coordinator(StorageMode::Remote);
        let err = coordinator.save_graph(&GraphRecord::new("")).await.unwrap_err();
        assert!(err.is_invalid_input());
        // validation happens before any remote call, so no transition
        assert_eq!(coordinator.mode(), StorageMode::Remote);
    }

    #[tokio::test]
    async fn test_load_fallback_requires_local_copy() {
        let coordinator = offline_coordinator(StorageMode::Local);
        let saved = coordinator.save_graph(&demo()).await.unwrap().value;
        let id = saved.id.clone().unwrap();

        coordinator.force_mode(StorageMode::Remote);
        let loaded = coordinator.load_graph(&id).await.unwrap();
        assert_eq!(loaded.served_by, StorageMode::Local);
        assert!(loaded.notice.is_some());
        assert_eq!(loaded.value.id, saved.id);

        coordinator.force_mode(StorageMode::Remote);
        let err = coordinator.load_graph("remote-only").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(coordinator.mode(), StorageMode::Local);
    }

    #[tokio::test]
    async fn test_delete_fallback() {
        let coordinator = offline_coordinator(StorageMode::Local);
        let id = coordinator.save_graph(&demo()).await.unwrap().value.id.unwrap();

        coordinator.force_mode(StorageMode::Remote);
        let err = coordinator.delete_graph("missing").await.unwrap_err();
        assert!(err.is_remote_unavailable());

        coordinator.force_mode(StorageMode::Remote);
        assert!(coordinator.delete_graph(&id).await.unwrap().value);
        assert!(coordinator.load_graph(&id).await.unwrap_err().is_not_found());
        assert!(!coordinator.delete_graph(&id).await.unwrap().value);
    }

    #[tokio::test]
    async fn test_list_falls_back() {
        let coordinator = offline_coordinator(StorageMode::Remote);
        let listed = coordinator.list_graphs().await.unwrap();
        assert!(listed.value.is_empty());
        assert_eq!(listed.served_by, StorageMode::Local);
        assert!(listed.notice.is_some());
    }

    #[tokio::test]
    async fn test_force_mode_publishes() {
        let coordinator = offline_coordinator(StorageMode::Local);
        let mut rx = coordinator.subscribe();

        coordinator.force_mode(StorageMode::Remote);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), StorageMode::Remote);

        // forcing the current mode is a no-op
        coordinator.force_mode(StorageMode::Remote);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_probe_cycle_stays_local_while_down() {
        let coordinator = offline_coordinator(StorageMode::Local);
        assert!(!coordinator.run_probe_cycle().await);
        assert_eq!(coordinator.mode(), StorageMode::Local);
    }

    #[tokio::test]
    async fn test_import_rejects_missing_name_without_state_change() {
        let coordinator = offline_coordinator(StorageMode::Local);
        let err = coordinator
            .import_graph(r#"{"nodes": [], "edges": []}"#)
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(coordinator.list_graphs().await.unwrap().value.is_empty());
    }

    #[tokio::test]
    async fn test_import_then_export() {
        let coordinator = offline_coordinator(StorageMode::Local);
        let imported = coordinator
            .import_graph(r#"{"name": "Imp", "nodes": [{"id": "1", "label": "A"}], "edges": []}"#)
            .await
            .unwrap()
            .value;
        let id = imported.id.unwrap();

        let exported = coordinator.export_graph(&id).await.unwrap().value;
        assert!(exported.contains("\"name\": \"Imp\""));
        assert!(exported.contains("\"createdAt\""));
    }

    #[test]
    fn test_notice_display() {
        assert_eq!(Notice::Recovered.to_string(), "Server is back online");
        let fell = Notice::FellBack {
            reason: "timeout".into(),
        };
        assert!(fell.to_string().contains("timeout"));
    }
}
