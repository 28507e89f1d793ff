//! Notification store.
//!
//! Holds a paginated window of the user's notifications plus the
//! collection-wide unread count. Pages are appended by [`NotificationStore::load_more`];
//! writes re-read the loaded window so the list is replaced with the server's
//! view after every change. The unread count is refreshed in the background by
//! a [`PollLoop`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use greenhouse_core::{Notification, NotificationId};
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::cache::{CacheState, CollectionCache, ReplaceMode, Snapshot};
use crate::config::SyncConfig;
use crate::coordinator::MutationCoordinator;
use crate::error::Result;
use crate::gateway::{NotificationGateway, PageRequest};
use crate::notice::Notifier;
use crate::poll::PollLoop;

const COLLECTION: &str = "notifications";

/// Raw cache state of the notification list.
pub type NotificationsState = CacheState<Notification, u64>;

/// Read-only view of the notification list for presentation code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationsView {
    pub items: Vec<Notification>,
    /// Unread count across the whole collection, as reported by the server.
    pub unread_count: u64,
    pub has_more: bool,
    pub is_loading: bool,
}

impl From<NotificationsState> for NotificationsView {
    fn from(state: NotificationsState) -> Self {
        Self {
            items: state.snapshot.items,
            unread_count: state.snapshot.aggregate,
            has_more: state.snapshot.has_more,
            is_loading: state.is_loading,
        }
    }
}

/// Synchronized notification list.
pub struct NotificationStore<G> {
    gateway: Arc<G>,
    coordinator: MutationCoordinator<Notification, u64>,
    page_size: u32,
    /// Set while an unqueued `load_more` is in flight.
    loading_page: AtomicBool,
}

/// Clears the page flag when the owning `load_more` finishes or is dropped.
struct PageClaim<'a>(&'a AtomicBool);

impl<'a> PageClaim<'a> {
    fn take(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then_some(Self(flag))
    }
}

impl Drop for PageClaim<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<G> std::fmt::Debug for NotificationStore<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationStore")
            .field("coordinator", &self.coordinator)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl<G: NotificationGateway> NotificationStore<G> {
    /// Create an empty store. Call [`refresh`](Self::refresh) to load it.
    #[must_use]
    pub fn new(gateway: Arc<G>, notifier: Arc<dyn Notifier>, config: &SyncConfig) -> Self {
        Self {
            gateway,
            coordinator: MutationCoordinator::new(
                COLLECTION,
                Arc::new(CollectionCache::new()),
                notifier,
                config.serialize_mutations,
            ),
            page_size: config.page_size.max(1),
            loading_page: AtomicBool::new(false),
        }
    }

    fn cache(&self) -> &Arc<CollectionCache<Notification, u64>> {
        self.coordinator.cache()
    }

    /// Current list.
    #[must_use]
    pub fn view(&self) -> NotificationsView {
        self.cache().view().into()
    }

    /// Server-reported unread count.
    #[must_use]
    pub fn unread_count(&self) -> u64 {
        self.cache().with_snapshot(|snapshot| snapshot.aggregate)
    }

    /// Whether another page is available.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.cache().with_snapshot(|snapshot| snapshot.has_more)
    }

    /// Whether an operation is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.cache().is_loading()
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NotificationsState> {
        self.cache().subscribe()
    }

    /// The window currently held: from the start up to the cursor, and at
    /// least one page.
    fn loaded_window(&self, snapshot: &Snapshot<Notification, u64>) -> PageRequest {
        let loaded = u32::try_from(snapshot.cursor).unwrap_or(u32::MAX);
        PageRequest::first(loaded.max(self.page_size))
    }

    /// Reload the first page, dropping any further pages.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure; the previous list is kept.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let page = PageRequest::first(self.page_size);
        self.coordinator
            .run("refresh", ReplaceMode::Overwrite, || {
                self.gateway.fetch_page(page)
            })
            .await
    }

    /// Append the next page. Does nothing when the last page was not full.
    ///
    /// With queued mutations, a call waits its turn and then reads the cursor
    /// left by the previous page. Otherwise a call made while another page is
    /// still loading does nothing.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure; the loaded pages are kept.
    #[instrument(skip(self))]
    pub async fn load_more(&self) -> Result<()> {
        let _claim = if self.coordinator.is_serialized() {
            None
        } else if let Some(claim) = PageClaim::take(&self.loading_page) {
            Some(claim)
        } else {
            debug!("A page is already loading");
            return Ok(());
        };

        let page_size = self.page_size;
        self.coordinator
            .run_planned("load_more", ReplaceMode::Append, |snapshot| {
                if !snapshot.has_more {
                    debug!("No more notifications to load");
                    return None;
                }
                Some(self.gateway.fetch_page(PageRequest {
                    skip: snapshot.cursor,
                    limit: page_size,
                }))
            })
            .await
    }

    /// Mark one notification as read.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure; the previous list is kept.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn mark_as_read(&self, id: NotificationId) -> Result<()> {
        self.coordinator
            .run_planned("mark_as_read", ReplaceMode::Overwrite, |snapshot| {
                Some(self.gateway.mark_as_read(&id, self.loaded_window(snapshot)))
            })
            .await
    }

    /// Mark every notification as read.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure; the previous list is kept.
    #[instrument(skip(self))]
    pub async fn mark_all_as_read(&self) -> Result<()> {
        self.coordinator
            .run_planned("mark_all_as_read", ReplaceMode::Overwrite, |snapshot| {
                Some(self.gateway.mark_all_as_read(self.loaded_window(snapshot)))
            })
            .await
    }

    /// Delete one notification.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure; the previous list is kept.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn delete(&self, id: NotificationId) -> Result<()> {
        self.coordinator
            .run_planned("delete", ReplaceMode::Overwrite, |snapshot| {
                Some(self.gateway.delete(&id, self.loaded_window(snapshot)))
            })
            .await
    }

    /// Delete every notification already read.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure; the previous list is kept.
    #[instrument(skip(self))]
    pub async fn delete_all_read(&self) -> Result<()> {
        self.coordinator
            .run_planned("delete_all_read", ReplaceMode::Overwrite, |snapshot| {
                Some(self.gateway.delete_all_read(self.loaded_window(snapshot)))
            })
            .await
    }

    /// Start refreshing the unread count every `period`.
    ///
    /// The loop stops when the returned handle is dropped or cancelled.
    #[must_use = "the poll loop stops when its handle is dropped"]
    pub fn spawn_unread_poll(&self, period: Duration) -> PollLoop {
        let gateway = Arc::clone(&self.gateway);
        PollLoop::spawn("unread_count", period, Arc::clone(self.cache()), move || {
            let gateway = Arc::clone(&gateway);
            async move { gateway.fetch_unread_count().await }
        })
    }

    /// Stop applying responses. In-flight calls finish but are ignored.
    pub fn teardown(&self) {
        self.cache().deactivate();
    }
}
