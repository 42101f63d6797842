// src/sync.rs
//
// Durable FIFO queue of mutations captured while the store is unreachable,
// replayed on the next offline->online transition.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::app_state::AppState;
use crate::store::{DocumentWriter, MongoDB, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Create,
    Update,
    Delete,
}

/// One pending mutation against a named collection. Persisted verbatim so a
/// restart resumes where the process left off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncItem {
    #[serde(rename = "type")]
    pub kind: SyncKind,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: i64,
}

impl SyncItem {
    pub fn create(collection: &str, data: Value) -> Self {
        SyncItem {
            kind: SyncKind::Create,
            collection: collection.to_string(),
            id: None,
            data: Some(data),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn update(collection: &str, id: &str, data: Value) -> Self {
        SyncItem {
            kind: SyncKind::Update,
            collection: collection.to_string(),
            id: Some(id.to_string()),
            data: Some(data),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn delete(collection: &str, id: &str) -> Self {
        SyncItem {
            kind: SyncKind::Delete,
            collection: collection.to_string(),
            id: Some(id.to_string()),
            data: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

pub struct SyncQueue {
    items: Mutex<Vec<SyncItem>>,
    in_progress: AtomicBool,
    path: PathBuf,
}

impl SyncQueue {
    /// Loads the persisted queue (a single JSON array) from `path`, starting
    /// empty when the file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        let items: Vec<SyncItem> = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(items) => items,
                Err(e) => {
                    error!("Discarding unreadable sync queue at {:?}: {}", path, e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        if !items.is_empty() {
            info!("{} pending sync item(s) loaded from {:?}", items.len(), path);
        }
        SyncQueue {
            items: Mutex::new(items),
            in_progress: AtomicBool::new(false),
            path: path.to_path_buf(),
        }
    }

    pub fn enqueue(&self, item: SyncItem) {
        let snapshot = {
            let mut items = self.items.lock().unwrap();
            items.push(item);
            items.clone()
        };
        self.persist(&snapshot);
        info!("{} item(s) waiting for sync", snapshot.len());
    }

    pub fn pending_count(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Drains the queue head-first against `store`. No-op when empty or when
    /// a drain is already running. A failed item stays at the head and ends
    /// the drain; the next online transition retries it.
    pub async fn process_queue<S: DocumentWriter>(&self, store: &S) {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            return;
        }
        loop {
            let item = {
                let items = self.items.lock().unwrap();
                match items.first() {
                    Some(item) => item.clone(),
                    None => break,
                }
            };
            match apply_item(&item, store).await {
                Ok(()) => {
                    let snapshot = {
                        let mut items = self.items.lock().unwrap();
                        items.remove(0);
                        items.clone()
                    };
                    self.persist(&snapshot);
                    info!("Synced one item; {} remaining", snapshot.len());
                }
                Err(e) => {
                    warn!("Sync failed, will retry after the next reconnect: {}", e);
                    break;
                }
            }
        }
        self.in_progress.store(false, Ordering::SeqCst);
    }

    fn persist(&self, items: &[SyncItem]) {
        match serde_json::to_string(items) {
            Ok(raw) => {
                if let Err(e) = std::fs::write(&self.path, raw) {
                    error!("Failed to persist sync queue to {:?}: {}", self.path, e);
                }
            }
            Err(e) => error!("Failed to serialize sync queue: {}", e),
        }
    }
}

/// Dispatches a single item. Update/delete entries that lost their id fail
/// without touching the store.
async fn apply_item<S: DocumentWriter>(item: &SyncItem, store: &S) -> Result<(), StoreError> {
    match item.kind {
        SyncKind::Create => {
            let data = item
                .data
                .as_ref()
                .ok_or_else(|| StoreError("create item has no data".into()))?;
            store.insert(&item.collection, data).await
        }
        SyncKind::Update => {
            let id = item
                .id
                .as_ref()
                .ok_or_else(|| StoreError("update item has no id".into()))?;
            let data = item
                .data
                .as_ref()
                .ok_or_else(|| StoreError("update item has no data".into()))?;
            store.update(&item.collection, id, data).await
        }
        SyncKind::Delete => {
            let id = item
                .id
                .as_ref()
                .ok_or_else(|| StoreError("delete item has no id".into()))?;
            store.remove(&item.collection, id).await
        }
    }
}

/// Boolean online/offline stream, fed by the store ping loop.
pub struct NetworkMonitor {
    online_tx: watch::Sender<bool>,
}

impl NetworkMonitor {
    pub fn new() -> Self {
        let (online_tx, _) = watch::channel(true);
        NetworkMonitor { online_tx }
    }

    pub fn is_online(&self) -> bool {
        *self.online_tx.borrow()
    }

    pub fn set_online(&self, online: bool) -> bool {
        let was = *self.online_tx.borrow();
        if was != online {
            if online {
                info!("Store connection restored");
            } else {
                warn!("Store connection lost; queueing mutations");
            }
            self.online_tx.send_replace(online);
        }
        was != online
    }
}

/// Pings the store on an interval and replays the queue on every
/// offline->online edge. Spawned once at startup.
pub async fn run_network_monitor(
    monitor: Arc<NetworkMonitor>,
    db: Arc<MongoDB>,
    queue: Arc<SyncQueue>,
    interval_secs: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    let mut first_tick = true;
    loop {
        ticker.tick().await;
        let online = db.ping().await;
        let changed = monitor.set_online(online);
        // Replay only on the reconnect edge (the first tick counts as one, so
        // a queue reloaded from disk drains at startup). A head item that
        // keeps failing waits for the next transition instead of retrying
        // every tick.
        if online && (changed || first_tick) {
            queue.process_queue(&*db).await;
        }
        first_tick = false;
    }
}

#[derive(Serialize)]
struct SyncStatus {
    online: bool,
    pending: usize,
    syncing: bool,
}

/// GET /sync/status
pub async fn sync_status(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(SyncStatus {
        online: data.network.is_online(),
        pending: data.sync.pending_count(),
        syncing: data.sync.is_syncing(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingWriter {
        ops: StdMutex<Vec<String>>,
        fail_after: Option<usize>,
    }

    impl RecordingWriter {
        fn failing_after(n: usize) -> Self {
            RecordingWriter {
                ops: StdMutex::new(Vec::new()),
                fail_after: Some(n),
            }
        }

        fn record(&self, op: String) -> Result<(), StoreError> {
            let mut ops = self.ops.lock().unwrap();
            if let Some(limit) = self.fail_after {
                if ops.len() >= limit {
                    return Err(StoreError("connection refused".into()));
                }
            }
            ops.push(op);
            Ok(())
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }
    }

    impl DocumentWriter for RecordingWriter {
        async fn insert(&self, collection: &str, _data: &Value) -> Result<(), StoreError> {
            self.record(format!("create:{}", collection))
        }

        async fn update(&self, collection: &str, id: &str, _data: &Value) -> Result<(), StoreError> {
            self.record(format!("update:{}:{}", collection, id))
        }

        async fn remove(&self, collection: &str, id: &str) -> Result<(), StoreError> {
            self.record(format!("delete:{}:{}", collection, id))
        }
    }

    fn temp_queue() -> SyncQueue {
        let path =
            std::env::temp_dir().join(format!("sync-queue-{}.json", uuid::Uuid::new_v4()));
        SyncQueue::load(&path)
    }

    fn persisted_len(queue: &SyncQueue) -> usize {
        let raw = std::fs::read_to_string(&queue.path).unwrap();
        serde_json::from_str::<Vec<SyncItem>>(&raw).unwrap().len()
    }

    #[tokio::test]
    async fn replays_in_fifo_order() {
        let queue = temp_queue();
        queue.enqueue(SyncItem::create("tasks", json!({"title": "a"})));
        queue.enqueue(SyncItem::update("tasks", "t1", json!({"title": "b"})));
        queue.enqueue(SyncItem::delete("messages", "m1"));

        let writer = RecordingWriter::default();
        queue.process_queue(&writer).await;

        assert_eq!(
            writer.ops(),
            vec!["create:tasks", "update:tasks:t1", "delete:messages:m1"]
        );
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(persisted_len(&queue), 0);
        let _ = std::fs::remove_file(&queue.path);
    }

    #[tokio::test]
    async fn failure_stops_the_drain_and_keeps_the_rest() {
        let queue = temp_queue();
        queue.enqueue(SyncItem::create("tasks", json!({"n": 1})));
        queue.enqueue(SyncItem::create("tasks", json!({"n": 2})));
        queue.enqueue(SyncItem::create("tasks", json!({"n": 3})));
        assert_eq!(persisted_len(&queue), 3);

        let writer = RecordingWriter::failing_after(2);
        queue.process_queue(&writer).await;

        assert_eq!(writer.ops().len(), 2);
        assert_eq!(queue.pending_count(), 1);
        assert_eq!(persisted_len(&queue), 1);
        assert!(!queue.is_syncing());

        // The drain guard resets, so the next trigger finishes the job.
        let writer = RecordingWriter::default();
        queue.process_queue(&writer).await;
        assert_eq!(queue.pending_count(), 0);
        let _ = std::fs::remove_file(&queue.path);
    }

    #[tokio::test]
    async fn update_without_id_fails_without_a_store_call() {
        let queue = temp_queue();
        let mut item = SyncItem::update("tasks", "t1", json!({"title": "x"}));
        item.id = None;
        queue.enqueue(item);

        let writer = RecordingWriter::default();
        queue.process_queue(&writer).await;

        assert!(writer.ops().is_empty());
        assert_eq!(queue.pending_count(), 1);
        let _ = std::fs::remove_file(&queue.path);
    }

    #[test]
    fn monitor_reports_a_change_only_on_transitions() {
        let monitor = NetworkMonitor::new();
        // Starts online; repeating the same state is not an edge.
        assert!(!monitor.set_online(true));
        assert!(monitor.set_online(false));
        assert!(!monitor.set_online(false));
        assert!(monitor.set_online(true));
        assert!(!monitor.set_online(true));
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn empty_queue_is_a_noop() {
        let queue = temp_queue();
        let writer = RecordingWriter::default();
        queue.process_queue(&writer).await;
        assert!(writer.ops().is_empty());
        let _ = std::fs::remove_file(&queue.path);
    }

    #[tokio::test]
    async fn survives_a_reload_from_disk() {
        let queue = temp_queue();
        queue.enqueue(SyncItem::delete("tags", "g1"));
        queue.enqueue(SyncItem::create("tasks", json!({"title": "later"})));
        let path = queue.path.clone();
        drop(queue);

        let reloaded = SyncQueue::load(&path);
        assert_eq!(reloaded.pending_count(), 2);
        let writer = RecordingWriter::default();
        reloaded.process_queue(&writer).await;
        assert_eq!(writer.ops(), vec!["delete:tags:g1", "create:tasks"]);
        let _ = std::fs::remove_file(&path);
    }
}
