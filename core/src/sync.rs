//! Optimistic list synchronizer.
//!
//! # Design
//! `ListSynchronizer` owns the client-side cache of items and mirrors every
//! mutation to the remote API. Each mutation is applied to the cache before
//! its request is issued and is reconciled or reverted when the response
//! arrives.
//!
//! - Single logical thread: state lives in a `RefCell` that is only borrowed
//!   between suspension points, never across an `.await`.
//! - At most one operation per key is in flight. A second operation on a
//!   pending key returns `Outcome::Skipped` without touching the cache or
//!   the network. A placeholder key is always pending: its create is the
//!   operation.
//! - Every entry carries an order key, so a failed delete goes back to its
//!   exact position even when neighbouring deletes are also in flight.
//! - `refresh` and `clear` start a new epoch. Responses to operations issued
//!   in an earlier epoch release their pending marker and report errors but
//!   never write to the replaced cache.
//! - Every state change is published on a `watch` channel before the
//!   operation's future resolves.

use std::cell::RefCell;
use std::collections::HashMap;

use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::ItemClient;
use crate::config::SyncConfig;
use crate::error::{ApiError, SyncError};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{RetryTransport, Transport, UreqTransport};
use crate::types::{CreateItem, Item, ItemKey, ListItem, UpdateItem};

/// How a synchronizer operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The server accepted the change.
    Confirmed(T),
    /// The remote call failed; any optimistic change was reverted and the
    /// error is surfaced in `ListState::error`.
    Failed,
    /// Not applied: the key has an operation in flight or is not cached, or
    /// a list answer arrived after the cache was already replaced.
    Skipped,
    /// Rejected before any cache change or network call.
    Invalid,
}

impl<T> Outcome<T> {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Outcome::Confirmed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Add,
    Update,
    Delete,
}

/// What the UI renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListState {
    pub items: Vec<ListItem>,
    pub error: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone)]
struct Entry {
    order: u64,
    item: ListItem,
}

#[derive(Debug, Default)]
struct Inner {
    /// Sorted by `order`.
    entries: Vec<Entry>,
    pending: HashMap<ItemKey, PendingKind>,
    error: Option<SyncError>,
    refreshing: u32,
    epoch: u64,
    next_order: u64,
    next_placeholder: u64,
}

impl Inner {
    fn view(&self) -> ListState {
        ListState {
            items: self.entries.iter().map(|e| e.item.clone()).collect(),
            error: self.error.as_ref().map(ToString::to_string),
            loading: self.refreshing > 0,
        }
    }

    fn position(&self, key: ItemKey) -> Option<usize> {
        self.entries.iter().position(|e| e.item.key == key)
    }

    fn entry_mut(&mut self, key: ItemKey) -> Option<&mut ListItem> {
        self.entries.iter_mut().find(|e| e.item.key == key).map(|e| &mut e.item)
    }

    fn push(&mut self, item: ListItem) {
        let order = self.next_order;
        self.next_order += 1;
        self.entries.push(Entry { order, item });
    }

    fn restore(&mut self, entry: Entry) {
        let at = self.entries.partition_point(|e| e.order < entry.order);
        self.entries.insert(at, entry);
    }

    fn replace_all(&mut self, items: Vec<Item>) {
        self.entries.clear();
        self.epoch += 1;
        for item in items {
            self.push(item.into());
        }
    }

    /// Free to take a new operation: cached, not a placeholder, nothing in flight.
    fn claimable(&self, key: ItemKey) -> bool {
        !key.is_placeholder() && !self.pending.contains_key(&key) && self.position(key).is_some()
    }
}

fn apply(row: &mut ListItem, change: &UpdateItem) {
    if let Some(title) = &change.title {
        row.title = title.clone();
    }
    if let Some(completed) = change.completed {
        row.completed = completed;
    }
}

/// Client-side cache of items kept in sync with the remote API.
pub struct ListSynchronizer<T> {
    client: ItemClient,
    transport: T,
    inner: RefCell<Inner>,
    updates: watch::Sender<ListState>,
}

impl ListSynchronizer<RetryTransport<UreqTransport>> {
    /// A synchronizer talking HTTP to `config.base_url` with the configured
    /// timeout and retry budget.
    pub fn from_config(config: &SyncConfig) -> Self {
        let transport = RetryTransport::new(
            UreqTransport::new(config.timeout),
            config.read_retries,
            config.write_retries,
        );
        Self::new(ItemClient::new(&config.base_url), transport)
    }
}

impl<T: Transport> ListSynchronizer<T> {
    pub fn new(client: ItemClient, transport: T) -> Self {
        let (updates, _) = watch::channel(ListState::default());
        Self {
            client,
            transport,
            inner: RefCell::new(Inner::default()),
            updates,
        }
    }

    pub fn state(&self) -> ListState {
        self.inner.borrow().view()
    }

    pub fn items(&self) -> Vec<ListItem> {
        self.state().items
    }

    pub fn error(&self) -> Option<SyncError> {
        self.inner.borrow().error.clone()
    }

    pub fn pending(&self, key: ItemKey) -> Option<PendingKind> {
        self.inner.borrow().pending.get(&key).copied()
    }

    /// Receives a new `ListState` after every change. The receiver starts
    /// with the current state marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<ListState> {
        self.updates.subscribe()
    }

    pub fn clear_error(&self) {
        self.update(|inner| inner.error = None);
    }

    /// Drop every cached item, e.g. on sign-out. In-flight operations keep
    /// their pending markers but will not write into the emptied cache.
    pub fn clear(&self) {
        self.update(|inner| {
            inner.entries.clear();
            inner.epoch += 1;
        });
    }

    /// Replace the cache with the server's list. On failure the cache is
    /// left as it was. An answer that arrives after `clear` or after a
    /// later-issued refresh has landed is dropped and reported as `Skipped`.
    pub async fn refresh(&self) -> Outcome<usize> {
        let epoch = self.update(|inner| {
            inner.refreshing += 1;
            inner.epoch
        });

        let request = self.client.build_list_items();
        let result = self.call(Ok(request), |c, r| c.parse_list_items(r)).await;

        match result {
            Ok(items) => {
                let count = items.len();
                let applied = self.update(|inner| {
                    inner.refreshing -= 1;
                    if inner.epoch != epoch {
                        return false;
                    }
                    inner.replace_all(items);
                    inner.error = None;
                    true
                });
                if !applied {
                    debug!(count, "dropped stale refresh");
                    return Outcome::Skipped;
                }
                debug!(count, "refreshed items");
                Outcome::Confirmed(count)
            }
            Err(err) => {
                warn!(error = %err, "refresh failed");
                self.update(|inner| {
                    inner.refreshing -= 1;
                    inner.error = Some(SyncError::Refresh(err));
                });
                Outcome::Failed
            }
        }
    }

    /// Append an item. A placeholder row is visible immediately and is
    /// swapped for the server's item on success or removed on failure. The
    /// caller should keep its input text unless the outcome is `Confirmed`.
    pub async fn add(&self, title: &str) -> Outcome<Item> {
        let title = title.trim();
        if title.is_empty() {
            self.update(|inner| inner.error = Some(SyncError::EmptyTitle));
            return Outcome::Invalid;
        }

        let (key, epoch) = self.update(|inner| {
            let key = ItemKey::Placeholder(inner.next_placeholder);
            inner.next_placeholder += 1;
            inner.push(ListItem {
                key,
                title: title.to_string(),
                completed: false,
            });
            inner.pending.insert(key, PendingKind::Add);
            (key, inner.epoch)
        });
        debug!(%key, "optimistic add");

        let input = CreateItem {
            title: title.to_string(),
            completed: false,
        };
        let request = self.client.build_create_item(&input, Uuid::new_v4());
        let result = self.call(request, |c, r| c.parse_create_item(r)).await;

        match result {
            Ok(item) => {
                self.update(|inner| {
                    inner.pending.remove(&key);
                    if inner.epoch == epoch {
                        if let Some(row) = inner.entry_mut(key) {
                            *row = item.clone().into();
                        }
                    }
                });
                debug!(%key, id = item.id, "add confirmed");
                Outcome::Confirmed(item)
            }
            Err(err) => {
                warn!(%key, error = %err, "add failed, removing placeholder");
                self.update(|inner| {
                    inner.pending.remove(&key);
                    if inner.epoch == epoch {
                        if let Some(at) = inner.position(key) {
                            inner.entries.remove(at);
                        }
                    }
                    inner.error = Some(SyncError::Add(err));
                });
                Outcome::Failed
            }
        }
    }

    /// Flip `completed`. The new value shows until the server answers and
    /// is reverted only if the update fails.
    pub async fn toggle_completion(&self, key: ItemKey) -> Outcome<Item> {
        self.modify(key, |row| UpdateItem {
            title: None,
            completed: Some(!row.completed),
        })
        .await
    }

    /// Change the title. Same guard and rollback as `toggle_completion`.
    pub async fn rename(&self, key: ItemKey, title: &str) -> Outcome<Item> {
        let title = title.trim();
        if title.is_empty() {
            self.update(|inner| inner.error = Some(SyncError::EmptyTitle));
            return Outcome::Invalid;
        }
        let title = title.to_string();
        self.modify(key, move |_| UpdateItem {
            title: Some(title),
            completed: None,
        })
        .await
    }

    /// Remove an item. On failure it is put back at its original position.
    pub async fn delete(&self, key: ItemKey) -> Outcome<()> {
        let claimed = key.server_id().and_then(|id| {
            self.try_update(|inner| {
                if !inner.claimable(key) {
                    return None;
                }
                let at = inner.position(key)?;
                let removed = inner.entries.remove(at);
                inner.pending.insert(key, PendingKind::Delete);
                Some((id, removed, inner.epoch))
            })
        });
        let Some((id, removed, epoch)) = claimed else {
            debug!(%key, "delete skipped");
            return Outcome::Skipped;
        };
        debug!(%key, "optimistic delete");

        let request = self.client.build_delete_item(id);
        let result = self.call(Ok(request), |c, r| c.parse_delete_item(r)).await;

        match result {
            Ok(()) => {
                self.update(|inner| {
                    inner.pending.remove(&key);
                });
                debug!(%key, "delete confirmed");
                Outcome::Confirmed(())
            }
            Err(err) => {
                warn!(%key, error = %err, "delete failed, restoring item");
                self.update(|inner| {
                    inner.pending.remove(&key);
                    if inner.epoch == epoch {
                        inner.restore(removed);
                    }
                    inner.error = Some(SyncError::Delete(err));
                });
                Outcome::Failed
            }
        }
    }

    async fn modify(&self, key: ItemKey, change: impl FnOnce(&ListItem) -> UpdateItem) -> Outcome<Item> {
        let claimed = key.server_id().and_then(|id| {
            self.try_update(|inner| {
                if !inner.claimable(key) {
                    return None;
                }
                let epoch = inner.epoch;
                let row = inner.entry_mut(key)?;
                let prior = row.clone();
                let change = change(&*row);
                apply(row, &change);
                inner.pending.insert(key, PendingKind::Update);
                Some((id, prior, change, epoch))
            })
        });
        let Some((id, prior, change, epoch)) = claimed else {
            debug!(%key, "update skipped");
            return Outcome::Skipped;
        };
        debug!(%key, "optimistic update");

        let request = self.client.build_update_item(id, &change);
        let result = self.call(request, |c, r| c.parse_update_item(r)).await;

        match result {
            Ok(item) => {
                self.update(|inner| {
                    inner.pending.remove(&key);
                    if inner.epoch == epoch {
                        if let Some(row) = inner.entry_mut(key) {
                            row.title = item.title.clone();
                            row.completed = item.completed;
                        }
                    }
                });
                debug!(%key, "update confirmed");
                Outcome::Confirmed(item)
            }
            Err(err) => {
                warn!(%key, error = %err, "update failed, reverting");
                self.update(|inner| {
                    inner.pending.remove(&key);
                    if inner.epoch == epoch {
                        if let Some(row) = inner.entry_mut(key) {
                            *row = prior;
                        }
                    }
                    inner.error = Some(SyncError::Update(err));
                });
                Outcome::Failed
            }
        }
    }

    async fn call<R>(
        &self,
        request: Result<HttpRequest, ApiError>,
        parse: impl FnOnce(&ItemClient, HttpResponse) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let response = self.transport.execute(request?).await?;
        parse(&self.client, response)
    }

    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let (result, view) = {
            let mut inner = self.inner.borrow_mut();
            let result = f(&mut inner);
            (result, inner.view())
        };
        self.updates.send_replace(view);
        result
    }

    /// Like `update`, but publishes only when `f` made a change.
    fn try_update<R>(&self, f: impl FnOnce(&mut Inner) -> Option<R>) -> Option<R> {
        let (result, view) = {
            let mut inner = self.inner.borrow_mut();
            let result = f(&mut inner)?;
            (result, inner.view())
        };
        self.updates.send_replace(view);
        Some(result)
    }
}
