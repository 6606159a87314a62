//! Offline-aware facade over [`RemoteApi`].
//!
//! Reads go to the network and refresh the local cache. When the read fails for any reason and
//! a cached copy exists, the cached copy is returned. Mutations go to the network when online. When offline, or when the
//! call fails for lack of connectivity, the mutation is queued and an optimistic result is
//! returned straight away. The cached lists and items are patched either way so offline reads
//! see local changes. Ids are passed through the queue's id map first, so a temporary id handed
//! out before a sync still reaches the right server record.

use std::{future::Future, sync::Arc};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    api::RemoteApi,
    connectivity::Connectivity,
    error::Result,
    models::{Item, ItemChanges, ItemId, ListId, NewItem, NewList, ShoppingList, User},
    store::{CACHED_LISTS, LocalStore, USER_DATA, cached_items_key},
    sync::{
        CreateItemPayload, CreateListPayload, ItemRef, OfflineAction, OfflineQueue, SyncReport, SyncWorker, UpdateItemPayload,
        temp_id,
    },
};

pub struct OfflineClient {
    api: Arc<dyn RemoteApi>,
    store: Arc<LocalStore>,
    queue: Arc<OfflineQueue>,
    connectivity: Connectivity,
}

impl OfflineClient {
    pub fn new(api: Arc<dyn RemoteApi>, store: Arc<LocalStore>, connectivity: Connectivity) -> Self {
        let queue = Arc::new(OfflineQueue::new(store.clone()));
        Self {
            api,
            store,
            queue,
            connectivity,
        }
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// A worker that replays the queue whenever connectivity comes back.
    pub fn sync_worker(&self, shutdown: CancellationToken) -> SyncWorker {
        SyncWorker::new(self.queue.clone(), self.api.clone(), &self.connectivity, shutdown)
    }

    /// Replay the queue now, if nothing else is.
    pub async fn sync_now(&self) -> Result<SyncReport> {
        self.queue.drain(self.api.as_ref()).await
    }

    /// Run `call` when online. `None` means the caller should queue instead.
    async fn try_remote<T>(&self, call: impl Future<Output = Result<T>>) -> Result<Option<T>> {
        if !self.connectivity.is_online() {
            return Ok(None);
        }
        match call.await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_offline_recoverable() => {
                warn!(error = %e, "Network unavailable, queueing action");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn resolve(&self, list_id: ListId, id: ItemId) -> Result<(ListId, ItemId)> {
        let ids = self.queue.id_map().await?;
        Ok((ids.list(list_id), ids.item(id)))
    }

    async fn cached_items(&self, list_id: ListId) -> Result<Option<Vec<Item>>> {
        self.store.get(&cached_items_key(list_id)).await
    }

    async fn patch_cached_items<R>(&self, list_id: ListId, f: impl FnOnce(&mut Vec<Item>) -> R) -> Result<R> {
        self.store.update(&cached_items_key(list_id), f).await
    }

    pub async fn get_lists(&self) -> Result<Vec<ShoppingList>> {
        if self.connectivity.is_online() {
            match self.api.get_lists().await {
                Ok(lists) => {
                    self.store.set(CACHED_LISTS, &lists).await?;
                    return Ok(lists);
                }
                Err(e) => match self.store.get(CACHED_LISTS).await? {
                    Some(cached) => {
                        warn!(error = %e, "Could not fetch lists, using cache");
                        return Ok(cached);
                    }
                    None => return Err(e),
                },
            }
        }
        Ok(self.store.get(CACHED_LISTS).await?.unwrap_or_default())
    }

    pub async fn get_items(&self, list_id: ListId) -> Result<Vec<Item>> {
        let list_id = self.queue.id_map().await?.list(list_id);
        if self.connectivity.is_online() {
            match self.api.get_items(list_id).await {
                Ok(items) => {
                    self.store.set(&cached_items_key(list_id), &items).await?;
                    return Ok(items);
                }
                Err(e) => match self.cached_items(list_id).await? {
                    Some(cached) => {
                        warn!(list_id, error = %e, "Could not fetch items, using cache");
                        return Ok(cached);
                    }
                    None => return Err(e),
                },
            }
        }
        Ok(self.cached_items(list_id).await?.unwrap_or_default())
    }

    pub async fn create_list(&self, list: NewList) -> Result<ShoppingList> {
        let list = list.normalized();
        let created = match self.try_remote(self.api.create_list(&list)).await? {
            Some(created) => created,
            None => {
                let id = temp_id();
                self.queue
                    .enqueue(OfflineAction::CreateList(CreateListPayload {
                        temp_id: id,
                        data: list.clone(),
                    }))
                    .await?;
                let owner_id = self.store.get::<User>(USER_DATA).await?.map(|u| u.id).unwrap_or(0);
                optimistic_list(id, owner_id, &list)
            }
        };

        let cached = created.clone();
        self.store
            .update(CACHED_LISTS, |lists: &mut Vec<ShoppingList>| lists.insert(0, cached))
            .await?;
        Ok(created)
    }

    pub async fn create_item(&self, list_id: ListId, item: NewItem) -> Result<Item> {
        let list_id = self.queue.id_map().await?.list(list_id);
        let item = item.normalized();
        let created = match self.try_remote(self.api.create_item(list_id, &item)).await? {
            Some(created) => created,
            None => {
                let id = temp_id();
                self.queue
                    .enqueue(OfflineAction::CreateItem(CreateItemPayload {
                        list_id,
                        temp_id: id,
                        data: item.clone(),
                    }))
                    .await?;
                optimistic_item(id, list_id, &item)
            }
        };

        let cached = created.clone();
        self.patch_cached_items(list_id, |items| items.push(cached)).await?;
        Ok(created)
    }

    pub async fn update_item(&self, list_id: ListId, id: ItemId, changes: ItemChanges) -> Result<Item> {
        let (list_id, id) = self.resolve(list_id, id).await?;
        if let Some(updated) = self.try_remote(self.api.update_item(id, &changes)).await? {
            let cached = updated.clone();
            self.patch_cached_items(list_id, |items| replace(items, cached)).await?;
            return Ok(updated);
        }

        self.queue
            .enqueue(OfflineAction::UpdateItem(UpdateItemPayload {
                id,
                data: changes.clone(),
            }))
            .await?;
        self.patch_cached_items(list_id, |items| {
            let now = Utc::now();
            match items.iter_mut().find(|i| i.id == id) {
                Some(item) => {
                    changes.apply_to(item);
                    item.updated_at = now;
                    item.clone()
                }
                None => {
                    let mut item = optimistic_item(id, list_id, &NewItem::default());
                    changes.apply_to(&mut item);
                    item
                }
            }
        })
        .await
    }

    pub async fn delete_item(&self, list_id: ListId, id: ItemId) -> Result<()> {
        let (list_id, id) = self.resolve(list_id, id).await?;
        if self.try_remote(self.api.delete_item(id)).await?.is_none() {
            self.queue.enqueue(OfflineAction::DeleteItem(ItemRef { id })).await?;
        }
        self.patch_cached_items(list_id, |items| items.retain(|i| i.id != id)).await
    }

    pub async fn toggle_item(&self, list_id: ListId, id: ItemId) -> Result<Item> {
        let (list_id, id) = self.resolve(list_id, id).await?;
        if let Some(toggled) = self.try_remote(self.api.toggle_item(id)).await? {
            let cached = toggled.clone();
            self.patch_cached_items(list_id, |items| replace(items, cached)).await?;
            return Ok(toggled);
        }

        self.queue.enqueue(OfflineAction::ToggleItem(ItemRef { id })).await?;
        self.patch_cached_items(list_id, |items| {
            let now = Utc::now();
            match items.iter_mut().find(|i| i.id == id) {
                Some(item) => {
                    item.is_completed = !item.is_completed;
                    item.updated_at = now;
                    item.clone()
                }
                None => {
                    let mut item = optimistic_item(id, list_id, &NewItem::default());
                    item.is_completed = true;
                    item
                }
            }
        })
        .await
    }
}

fn replace(items: &mut Vec<Item>, item: Item) {
    match items.iter_mut().find(|i| i.id == item.id) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

fn optimistic_list(id: ListId, owner_id: i64, list: &NewList) -> ShoppingList {
    let now = Utc::now();
    ShoppingList {
        id,
        name: list.name.clone(),
        description: list.description.clone(),
        owner_id,
        is_shared: false,
        created_at: now,
        updated_at: now,
        total_items: 0,
        pending_items: 0,
        completed_items: 0,
        collaborators_count: 0,
        user_role: Some("owner".to_string()),
        is_owner: true,
        last_activity: Some(now),
    }
}

fn optimistic_item(id: ItemId, list_id: ListId, item: &NewItem) -> Item {
    let now = Utc::now();
    Item {
        id,
        list_id,
        name: item.name.clone(),
        quantity: item.quantity,
        unit: item.unit.clone(),
        price: item.price,
        is_completed: false,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::{FakeApi, item};

    async fn client(online: bool) -> (OfflineClient, Arc<FakeApi>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::open(dir.path().join("store.json")).await.unwrap());
        let api = Arc::new(FakeApi::default());
        (OfflineClient::new(api.clone(), store, Connectivity::new(online)), api, dir)
    }

    fn new_item(name: &str) -> NewItem {
        NewItem {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_offline_creates_replay_in_submission_order() {
        let (client, api, _dir) = client(false).await;

        let milk = client.create_item(1, new_item(" Milk ")).await.unwrap();
        let bread = client.create_item(1, new_item("Bread")).await.unwrap();
        assert_eq!(milk.name, "Milk");
        assert!(bread.id > milk.id);
        assert!(api.calls().is_empty());

        // Offline reads see the optimistic items
        let cached = client.get_items(1).await.unwrap();
        assert_eq!(cached.len(), 2);

        client.connectivity().set_online(true);
        let report = client.sync_now().await.unwrap();
        assert_eq!(report.synced(), 2);
        assert_eq!(api.calls(), vec!["create_item:1:Milk", "create_item:1:Bread"]);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_offline_toggle_and_delete_patch_the_cache() {
        let (client, api, _dir) = client(true).await;
        api.insert_item(item(10, 1, "Milk"));
        api.insert_item(item(11, 1, "Eggs"));
        assert_eq!(client.get_items(1).await.unwrap().len(), 2);

        client.connectivity().set_online(false);
        let toggled = client.toggle_item(1, 10).await.unwrap();
        assert!(toggled.is_completed);
        client.delete_item(1, 11).await.unwrap();

        let cached = client.get_items(1).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert!(cached[0].is_completed);
        assert_eq!(client.queue().pending().await.unwrap().len(), 2);

        client.connectivity().set_online(true);
        client.sync_now().await.unwrap();
        assert_eq!(
            api.calls(),
            vec!["get_items:1", "toggle_item:10", "delete_item:11"]
        );
        assert!(client.queue().pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_offline_update_applies_changes_locally() {
        let (client, api, _dir) = client(true).await;
        let mut priced = item(10, 1, "Milk");
        priced.price = Some("3.49".parse().unwrap());
        api.insert_item(priced);
        client.get_items(1).await.unwrap();

        client.connectivity().set_online(false);
        let updated = client
            .update_item(
                1,
                10,
                ItemChanges {
                    name: Some("Oat milk".to_string()),
                    price: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Oat milk");
        assert_eq!(updated.price, None);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_server_rejections_are_not_queued() {
        let (client, api, _dir) = client(true).await;

        let err = client.toggle_item(1, 999).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(client.queue().pending().await.unwrap().is_empty());
        assert_eq!(api.calls(), vec!["toggle_item:999"]);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_offline_list_uses_stored_owner() {
        let (client, _api, _dir) = client(false).await;

        let list = client
            .create_list(NewList {
                name: "Party".to_string(),
                description: Some("  ".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(list.owner_id, 0);
        assert_eq!(list.description, None);
        assert!(list.is_owner);

        let lists = client.get_lists().await.unwrap();
        assert_eq!(lists, vec![list]);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_failed_reads_fall_back_to_cache() {
        let (client, api, _dir) = client(true).await;
        api.insert_item(item(10, 1, "Milk"));
        assert_eq!(client.get_items(1).await.unwrap().len(), 1);

        api.fail_reads.store(true, std::sync::atomic::Ordering::SeqCst);
        let cached = client.get_items(1).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, 10);

        // Nothing cached yet, so the error comes through
        let err = client.get_lists().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_temporary_ids_resolve_after_sync() {
        let (client, api, _dir) = client(false).await;

        let list = client
            .create_list(NewList {
                name: " Party ".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let cake = client.create_item(list.id, new_item("Cake")).await.unwrap();

        client.connectivity().set_online(true);
        assert_eq!(client.sync_now().await.unwrap().synced(), 2);

        // The caches now carry the server's ids
        client.connectivity().set_online(false);
        let lists = client.get_lists().await.unwrap();
        assert_eq!(lists[0].id, 100);
        let items = client.get_items(list.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!((items[0].id, items[0].list_id), (101, 100));

        // Ids handed out before the sync still work offline
        client.create_item(list.id, new_item("Balloons")).await.unwrap();
        client.toggle_item(list.id, cake.id).await.unwrap();
        assert_eq!(client.get_items(100).await.unwrap().len(), 2);

        client.connectivity().set_online(true);
        let report = client.sync_now().await.unwrap();
        assert_eq!(report.retained(), 0);
        assert_eq!(
            api.calls(),
            vec!["create_list:Party", "create_item:100:Cake", "create_item:100:Balloons", "toggle_item:101"]
        );
    }
}
