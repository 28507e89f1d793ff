//! Runs user-triggered mutations against a [`CollectionCache`].
//!
//! Every operation follows the same steps: raise the loading flag, call the
//! gateway, install the server's snapshot on success, report and return the
//! error on failure. The loading flag is owned by a guard, so it clears on
//! every exit path including cancellation of the calling future.
//!
//! Overlapping operations are not ordered unless the coordinator was built
//! with a queue: whichever response arrives last wins.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{CollectionCache, ReplaceMode, Snapshot};
use crate::error::{GatewayError, Result, SyncError};
use crate::notice::{Notice, Notifier};

/// Applies gateway results to one cache.
pub struct MutationCoordinator<T, A> {
    collection: &'static str,
    cache: Arc<CollectionCache<T, A>>,
    notifier: Arc<dyn Notifier>,
    queue: Option<Mutex<()>>,
}

impl<T, A> std::fmt::Debug for MutationCoordinator<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("collection", &self.collection)
            .field("serialized", &self.queue.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Clone, A: Clone + Default> MutationCoordinator<T, A> {
    /// Create a coordinator for `cache`.
    ///
    /// With `serialize` set, operations wait for the previous one to finish
    /// before calling the gateway.
    #[must_use]
    pub fn new(
        collection: &'static str,
        cache: Arc<CollectionCache<T, A>>,
        notifier: Arc<dyn Notifier>,
        serialize: bool,
    ) -> Self {
        Self {
            collection,
            cache,
            notifier,
            queue: serialize.then(|| Mutex::new(())),
        }
    }

    /// The cache this coordinator writes to.
    #[must_use]
    pub const fn cache(&self) -> &Arc<CollectionCache<T, A>> {
        &self.cache
    }

    /// Whether operations wait for the previous one to finish.
    #[must_use]
    pub const fn is_serialized(&self) -> bool {
        self.queue.is_some()
    }

    /// Run one operation.
    ///
    /// `call` is invoked once, after any queued operation has finished. A
    /// successful snapshot is installed with `mode`. If the cache was torn down
    /// while the call was in flight the snapshot is dropped and `Ok` is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Inactive`] if the cache was already torn down, or
    /// [`SyncError::Gateway`] when the call fails. The failure has been
    /// reported to the notifier (unless it was `Unauthorized`) before it is
    /// returned.
    pub async fn run<F, Fut>(&self, action: &'static str, mode: ReplaceMode, call: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Snapshot<T, A>, GatewayError>>,
    {
        self.run_planned(action, mode, |_| Some(call())).await
    }

    /// Run one operation whose request depends on the current snapshot.
    ///
    /// `plan` sees the snapshot once this operation's turn has come, so a
    /// queued operation builds its request from the result of the one before
    /// it. Returning `None` skips the gateway and succeeds.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_planned<P, Fut>(
        &self,
        action: &'static str,
        mode: ReplaceMode,
        plan: P,
    ) -> Result<()>
    where
        P: FnOnce(&Snapshot<T, A>) -> Option<Fut>,
        Fut: Future<Output = std::result::Result<Snapshot<T, A>, GatewayError>>,
    {
        if !self.cache.is_active() {
            return Err(SyncError::Inactive);
        }

        let _turn = match &self.queue {
            Some(queue) => Some(queue.lock().await),
            None => None,
        };
        let Some(call) = self.cache.with_snapshot(plan) else {
            debug!(collection = self.collection, action, "Nothing to request");
            return Ok(());
        };
        let _loading = self.cache.begin_loading();

        match call.await {
            Ok(snapshot) => {
                if self.cache.replace(snapshot, mode) {
                    debug!(collection = self.collection, action, "Snapshot applied");
                } else {
                    debug!(
                        collection = self.collection,
                        action, "Store torn down, response dropped"
                    );
                }
                Ok(())
            }
            Err(err) => {
                self.report(action, &err);
                Err(SyncError::Gateway(err))
            }
        }
    }

    fn report(&self, action: &'static str, err: &GatewayError) {
        if err.is_unauthorized() {
            debug!(collection = self.collection, action, "Not logged in");
            return;
        }

        warn!(collection = self.collection, action, error = %err, "Operation failed");

        if !self.cache.is_active() {
            return;
        }
        if let Some(message) = err.user_message() {
            self.notifier.notify(Notice {
                collection: self.collection,
                action,
                message,
            });
        }
    }
}
