//! Offline action queue and the worker that replays it.
//!
//! Mutations made while offline are appended to a queue persisted under
//! [`OFFLINE_ACTION_QUEUE`]. Each queued action moves through
//!
//! ```text
//! Pending ──► InFlight ──┬──► Synced    (dropped from the queue)
//!                        └──► Retained  (kept, in order, for the next drain)
//! ```
//!
//! A drain replays a snapshot of the queue strictly in insertion order. Every action is
//! attempted even when an earlier one fails. Only one drain runs at a time; actions queued
//! while a drain is running are kept for the next one.
//!
//! Lists and items created offline carry a temporary id. When such a create replays, the
//! server's id replaces the temporary one in every later action and in the local caches. The
//! mapping is kept under [`ID_REMAPS`] so ids still held by callers resolve after the drain.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    api::RemoteApi,
    connectivity::Connectivity,
    error::Result,
    models::{Item, ItemChanges, ItemId, ListId, NewItem, NewList, ShoppingList},
    store::{CACHED_LISTS, ID_REMAPS, LocalStore, OFFLINE_ACTION_QUEUE, cached_items_key},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListPayload {
    pub temp_id: ListId,
    pub data: NewList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemPayload {
    pub list_id: ListId,
    pub temp_id: ItemId,
    pub data: NewItem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateItemPayload {
    pub id: ItemId,
    pub data: ItemChanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: ItemId,
}

/// A mutation waiting for the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfflineAction {
    CreateList(CreateListPayload),
    CreateItem(CreateItemPayload),
    UpdateItem(UpdateItemPayload),
    DeleteItem(ItemRef),
    ToggleItem(ItemRef),
}

impl OfflineAction {
    pub fn kind(&self) -> &'static str {
        match self {
            OfflineAction::CreateList(_) => "CREATE_LIST",
            OfflineAction::CreateItem(_) => "CREATE_ITEM",
            OfflineAction::UpdateItem(_) => "UPDATE_ITEM",
            OfflineAction::DeleteItem(_) => "DELETE_ITEM",
            OfflineAction::ToggleItem(_) => "TOGGLE_ITEM",
        }
    }

    /// Replace temporary ids with the ones the server assigned.
    fn resolve(&mut self, ids: &IdMap) {
        match self {
            OfflineAction::CreateList(_) => {}
            OfflineAction::CreateItem(p) => p.list_id = ids.list(p.list_id),
            OfflineAction::UpdateItem(p) => p.id = ids.item(p.id),
            OfflineAction::DeleteItem(r) | OfflineAction::ToggleItem(r) => r.id = ids.item(r.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: String,
    #[serde(flatten)]
    pub action: OfflineAction,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Pending,
    InFlight,
    Synced,
    Retained,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub id: String,
    pub kind: &'static str,
    pub state: ActionState,
    pub error: Option<String>,
}

/// What a drain did. `skipped` is set when another drain was already running.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub skipped: bool,
    pub outcomes: Vec<ActionOutcome>,
}

impl SyncReport {
    pub fn synced(&self) -> usize {
        self.outcomes.iter().filter(|o| o.state == ActionState::Synced).count()
    }

    pub fn retained(&self) -> usize {
        self.outcomes.iter().filter(|o| o.state == ActionState::Retained).count()
    }
}

/// A temporary id replaced by the one the server assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Remap {
    List { temp: ListId, id: ListId },
    Item { list_id: ListId, temp: ItemId, id: ItemId },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdMap {
    #[serde(default)]
    lists: HashMap<ListId, ListId>,
    #[serde(default)]
    items: HashMap<ItemId, ItemId>,
}

impl IdMap {
    pub fn list(&self, id: ListId) -> ListId {
        self.lists.get(&id).copied().unwrap_or(id)
    }

    pub fn item(&self, id: ItemId) -> ItemId {
        self.items.get(&id).copied().unwrap_or(id)
    }

    fn record(&mut self, remap: Remap) {
        match remap {
            Remap::List { temp, id } => self.lists.insert(temp, id),
            Remap::Item { temp, id, .. } => self.items.insert(temp, id),
        };
    }
}

/// Time-derived id for optimistic local records. Strictly increasing within the process.
pub fn temp_id() -> i64 {
    static LAST: AtomicI64 = AtomicI64::new(0);
    let now = Utc::now().timestamp_millis();
    let mut last = LAST.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

pub struct OfflineQueue {
    store: Arc<LocalStore>,
    draining: AtomicBool,
}

impl OfflineQueue {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            draining: AtomicBool::new(false),
        }
    }

    /// Persist an action at the back of the queue.
    pub async fn enqueue(&self, action: OfflineAction) -> Result<QueuedAction> {
        let queued = QueuedAction {
            id: Uuid::new_v4().to_string(),
            action,
            timestamp: Utc::now().timestamp_millis(),
        };
        let entry = queued.clone();
        let len = self
            .store
            .update(OFFLINE_ACTION_QUEUE, |queue: &mut Vec<QueuedAction>| {
                queue.push(entry);
                queue.len()
            })
            .await?;
        info!(action_id = %queued.id, kind = queued.action.kind(), queued = len, "Action queued for sync");
        Ok(queued)
    }

    pub async fn pending(&self) -> Result<Vec<QueuedAction>> {
        Ok(self.store.get(OFFLINE_ACTION_QUEUE).await?.unwrap_or_default())
    }

    /// Every temporary id replaced so far.
    pub async fn id_map(&self) -> Result<IdMap> {
        Ok(self.store.get(ID_REMAPS).await?.unwrap_or_default())
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Replay the queue against `api`. Returns a skipped report if a drain is already running.
    #[instrument(skip_all)]
    pub async fn drain(&self, api: &dyn RemoteApi) -> Result<SyncReport> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync already in progress, ignoring trigger");
            return Ok(SyncReport {
                skipped: true,
                outcomes: Vec::new(),
            });
        }
        let _guard = scopeguard::guard((), |_| self.draining.store(false, Ordering::Release));

        let snapshot = self.pending().await?;
        if snapshot.is_empty() {
            return Ok(SyncReport::default());
        }
        info!(count = snapshot.len(), "Syncing queued actions");

        let snapshot_ids: HashSet<String> = snapshot.iter().map(|a| a.id.clone()).collect();
        let mut ids = self.id_map().await?;
        let mut remaps = Vec::new();
        let mut remaining = Vec::new();
        let mut outcomes = Vec::with_capacity(snapshot.len());

        for mut queued in snapshot {
            queued.action.resolve(&ids);
            let kind = queued.action.kind();
            debug!(action_id = %queued.id, kind, state = ?ActionState::InFlight, "Replaying action");

            let (state, error) = match replay(api, &queued.action).await {
                Ok(remap) => {
                    if let Some(remap) = remap {
                        ids.record(remap);
                        remaps.push(remap);
                    }
                    (ActionState::Synced, None)
                }
                Err(e) => {
                    warn!(action_id = %queued.id, kind, error = %e, "Failed to replay action, keeping it queued");
                    (ActionState::Retained, Some(e.to_string()))
                }
            };
            if state == ActionState::Retained {
                remaining.push(queued.clone());
            }
            outcomes.push(ActionOutcome {
                id: queued.id,
                kind,
                state,
                error,
            });
        }

        // Keep what failed, then whatever was queued while this pass ran.
        let left = self
            .store
            .update(OFFLINE_ACTION_QUEUE, |queue: &mut Vec<QueuedAction>| {
                let mut added: Vec<QueuedAction> = queue.drain(..).filter(|a| !snapshot_ids.contains(&a.id)).collect();
                for queued in &mut added {
                    queued.action.resolve(&ids);
                }
                remaining.append(&mut added);
                *queue = remaining;
                queue.len()
            })
            .await?;

        if !remaps.is_empty() {
            self.store
                .update(ID_REMAPS, |known: &mut IdMap| remaps.iter().for_each(|r| known.record(*r)))
                .await?;
            self.remap_cache(&remaps).await?;
        }

        let report = SyncReport {
            skipped: false,
            outcomes,
        };
        if left == 0 {
            info!(synced = report.synced(), "Sync complete");
        } else {
            info!(synced = report.synced(), remaining = left, "Sync partial");
        }
        Ok(report)
    }

    /// Move cached lists and items from their temporary ids to the server's.
    async fn remap_cache(&self, remaps: &[Remap]) -> Result<()> {
        for remap in remaps {
            match *remap {
                Remap::List { temp, id } => {
                    self.store
                        .update_existing(CACHED_LISTS, |lists: &mut Vec<ShoppingList>| {
                            lists.iter_mut().filter(|l| l.id == temp).for_each(|l| l.id = id)
                        })
                        .await?;
                    if let Some(mut items) = self.store.take::<Vec<Item>>(&cached_items_key(temp)).await? {
                        items.iter_mut().for_each(|i| i.list_id = id);
                        self.store.update(&cached_items_key(id), |cached: &mut Vec<Item>| cached.extend(items)).await?;
                    }
                }
                Remap::Item { list_id, temp, id } => {
                    self.store
                        .update_existing(&cached_items_key(list_id), |items: &mut Vec<Item>| {
                            items.iter_mut().filter(|i| i.id == temp).for_each(|i| i.id = id)
                        })
                        .await?;
                }
            }
            debug!(?remap, "Replaced temporary id in local cache");
        }
        Ok(())
    }
}

async fn replay(api: &dyn RemoteApi, action: &OfflineAction) -> Result<Option<Remap>> {
    let remap = match action {
        OfflineAction::CreateList(p) => {
            let list = api.create_list(&p.data).await?;
            Some(Remap::List { temp: p.temp_id, id: list.id })
        }
        OfflineAction::CreateItem(p) => {
            let item = api.create_item(p.list_id, &p.data).await?;
            Some(Remap::Item {
                list_id: p.list_id,
                temp: p.temp_id,
                id: item.id,
            })
        }
        OfflineAction::UpdateItem(p) => {
            api.update_item(p.id, &p.data).await?;
            None
        }
        OfflineAction::DeleteItem(r) => {
            api.delete_item(r.id).await?;
            None
        }
        OfflineAction::ToggleItem(r) => {
            api.toggle_item(r.id).await?;
            None
        }
    };
    Ok(remap)
}

/// Drains the queue every time connectivity goes from offline to online.
pub struct SyncWorker {
    queue: Arc<OfflineQueue>,
    api: Arc<dyn RemoteApi>,
    connectivity: watch::Receiver<bool>,
    shutdown: CancellationToken,
}

impl SyncWorker {
    pub fn new(queue: Arc<OfflineQueue>, api: Arc<dyn RemoteApi>, connectivity: &Connectivity, shutdown: CancellationToken) -> Self {
        Self {
            queue,
            api,
            connectivity: connectivity.subscribe(),
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until the shutdown token is cancelled or the connectivity source goes away.
    pub async fn run(mut self) {
        let mut was_online = *self.connectivity.borrow_and_update();
        if was_online {
            self.drain().await;
        }

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Sync worker shutting down");
                    return;
                }
                changed = self.connectivity.changed() => {
                    if changed.is_err() {
                        info!("Connectivity source closed, stopping sync worker");
                        return;
                    }
                    let online = *self.connectivity.borrow_and_update();
                    if online && !was_online {
                        self.drain().await;
                    }
                    was_online = online;
                }
            }
        }
    }

    async fn drain(&self) {
        if let Err(e) = self.queue.drain(self.api.as_ref()).await {
            warn!(error = %e, "Sync failed");
        }
    }
}
