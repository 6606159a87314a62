//! State behind the list detail screen.

use std::{cmp::Ordering, sync::Arc, time::Duration};

use rust_decimal::Decimal;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{ClientError, Result},
    models::{Item, ItemId, ListId, NewItem},
    offline::OfflineClient,
};

/// How long a swiped-away item can still be restored.
pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(3);

/// Order items for display: open items first, newest first; then completed items, most
/// recently completed first.
pub fn sort_items(items: &mut [Item]) {
    items.sort_by(compare_items);
}

fn compare_items(a: &Item, b: &Item) -> Ordering {
    match (a.is_completed, b.is_completed) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, false) => b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)),
        (true, true) => b.updated_at.cmp(&a.updated_at).then_with(|| b.id.cmp(&a.id)),
    }
}

/// Cost of what is still to buy: `price * quantity` (quantity defaults to 1) over open items
/// with a positive price.
pub fn total_price(items: &[Item]) -> Decimal {
    items
        .iter()
        .filter(|i| !i.is_completed)
        .filter_map(|i| {
            let price = i.price.filter(|p| *p > Decimal::ZERO)?;
            Some(price * i.quantity.unwrap_or(Decimal::ONE))
        })
        .sum()
}

/// How a scheduled delete ended.
#[derive(Debug)]
pub enum DeleteOutcome {
    /// The window elapsed and the server call was made
    Deleted,
    /// Undone before the window elapsed; no server call was made
    Undone,
    /// The server call failed and the item was put back
    Failed(ClientError),
}

/// Handle to a delete waiting out its undo window.
pub struct PendingDelete {
    item_id: ItemId,
    cancel: CancellationToken,
    task: JoinHandle<DeleteOutcome>,
}

impl PendingDelete {
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// Restore the item. Too late once the window has elapsed, in which case the delete's own
    /// outcome is returned.
    pub async fn undo(self) -> DeleteOutcome {
        self.cancel.cancel();
        self.wait().await
    }

    /// Wait for the window to elapse and the delete to finish.
    pub async fn wait(self) -> DeleteOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Delete task did not finish");
                DeleteOutcome::Undone
            }
        }
    }
}

pub struct ItemsViewModel {
    list_id: ListId,
    client: Arc<OfflineClient>,
    items: Arc<Mutex<Vec<Item>>>,
    undo_window: Duration,
}

impl ItemsViewModel {
    pub fn new(list_id: ListId, client: Arc<OfflineClient>) -> Self {
        Self {
            list_id,
            client,
            items: Arc::new(Mutex::new(Vec::new())),
            undo_window: DEFAULT_UNDO_WINDOW,
        }
    }

    pub fn with_undo_window(mut self, undo_window: Duration) -> Self {
        self.undo_window = undo_window;
        self
    }

    pub async fn items(&self) -> Vec<Item> {
        self.items.lock().await.clone()
    }

    pub async fn total(&self) -> Decimal {
        total_price(&self.items.lock().await)
    }

    pub async fn load(&self) -> Result<()> {
        let mut fetched = self.client.get_items(self.list_id).await?;
        sort_items(&mut fetched);
        *self.items.lock().await = fetched;
        Ok(())
    }

    pub async fn add_item(&self, item: NewItem) -> Result<Item> {
        let created = self.client.create_item(self.list_id, item).await?;
        let mut items = self.items.lock().await;
        items.push(created.clone());
        sort_items(&mut items);
        Ok(created)
    }

    /// Flip completion locally first, then confirm with the server. The local flip is reverted
    /// if the server refuses.
    pub async fn toggle(&self, id: ItemId) -> Result<()> {
        let previous = {
            let mut items = self.items.lock().await;
            let Some(item) = items.iter_mut().find(|i| i.id == id) else {
                return Ok(());
            };
            let previous = item.clone();
            item.is_completed = !item.is_completed;
            item.updated_at = chrono::Utc::now();
            sort_items(&mut items);
            previous
        };

        match self.client.toggle_item(self.list_id, id).await {
            Ok(confirmed) => {
                let mut items = self.items.lock().await;
                if let Some(item) = items.iter_mut().find(|i| i.id == id) {
                    *item = confirmed;
                }
                sort_items(&mut items);
                Ok(())
            }
            Err(e) => {
                debug!(item_id = id, error = %e, "Toggle rejected, reverting");
                let mut items = self.items.lock().await;
                if let Some(item) = items.iter_mut().find(|i| i.id == id) {
                    *item = previous;
                }
                sort_items(&mut items);
                Err(e)
            }
        }
    }

    /// Hide the item now and delete it once the undo window has elapsed. `None` if the item
    /// is not on screen.
    pub async fn schedule_delete(&self, id: ItemId) -> Option<PendingDelete> {
        let removed = {
            let mut items = self.items.lock().await;
            let index = items.iter().position(|i| i.id == id)?;
            items.remove(index)
        };

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let items = self.items.clone();
        let client = self.client.clone();
        let list_id = self.list_id;
        let window = self.undo_window;

        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    restore(&items, removed).await;
                    DeleteOutcome::Undone
                }
                _ = tokio::time::sleep(window) => {
                    match client.delete_item(list_id, id).await {
                        Ok(()) => DeleteOutcome::Deleted,
                        Err(e) => {
                            warn!(item_id = id, error = %e, "Delete failed, restoring item");
                            restore(&items, removed).await;
                            DeleteOutcome::Failed(e)
                        }
                    }
                }
            }
        });

        Some(PendingDelete {
            item_id: id,
            cancel,
            task,
        })
    }
}

async fn restore(items: &Mutex<Vec<Item>>, item: Item) {
    let mut items = items.lock().await;
    items.push(item);
    sort_items(&mut items);
}
