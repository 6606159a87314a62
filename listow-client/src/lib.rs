//! # listow-client: client core for Listow
//!
//! Everything a Listow app needs below its UI layer:
//!
//! - [`api::ApiClient`]: typed access to every endpoint of the HTTP API, with the session
//!   token kept in the [`store::LocalStore`]
//! - [`offline::OfflineClient`]: the same list and item operations, but usable without a
//!   network. Reads fall back to the local cache and mutations are queued
//! - [`sync`]: the persisted offline action queue and the [`sync::SyncWorker`] that replays
//!   it when [`connectivity::Connectivity`] reports the device back online
//! - [`view_model`]: item ordering, the running total, optimistic toggles and undoable deletes
//!
//! ```ignore
//! let store = Arc::new(LocalStore::open(data_dir.join("listow.json")).await?);
//! let api = Arc::new(ApiClient::new("https://lists.example.com/api".parse()?, store.clone())?);
//! let connectivity = Connectivity::new(true);
//! let client = Arc::new(OfflineClient::new(api, store, connectivity.clone()));
//!
//! let shutdown = CancellationToken::new();
//! client.sync_worker(shutdown.clone()).spawn();
//!
//! let items = ItemsViewModel::new(list_id, client.clone());
//! items.load().await?;
//! ```

pub mod api;
pub mod connectivity;
pub mod error;
pub mod models;
pub mod offline;
pub mod store;
pub mod sync;
pub mod view_model;

pub use api::{ApiClient, RemoteApi};
pub use connectivity::Connectivity;
pub use error::{ClientError, Result};
pub use offline::OfflineClient;
pub use store::LocalStore;
pub use sync::{OfflineQueue, SyncReport, SyncWorker};
pub use view_model::{ItemsViewModel, PendingDelete, sort_items, total_price};
