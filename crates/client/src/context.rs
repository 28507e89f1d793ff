//! Shared sync state handed to consumers.
//!
//! A [`SyncContext`] owns the gateways and configuration. The first
//! [`attach`](SyncContext::attach) creates both stores, starts the unread-count
//! poll and loads the initial snapshots; later attaches share them. When the
//! last [`Consumer`] is dropped the stores are torn down and the poll stops.
//! A later attach starts a fresh session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, instrument};

use crate::cart::CartStore;
use crate::config::{ClientConfig, SyncConfig};
use crate::error::GatewayError;
use crate::gateway::{CartGateway, HttpGateway, NotificationGateway};
use crate::notice::Notifier;
use crate::notifications::NotificationStore;
use crate::poll::PollLoop;

/// Gateways, configuration and the current session.
///
/// Cheaply cloneable; clones share the same session.
pub struct SyncContext<C, N> {
    inner: Arc<SyncContextInner<C, N>>,
}

struct SyncContextInner<C, N> {
    cart_gateway: Arc<C>,
    notification_gateway: Arc<N>,
    notifier: Arc<dyn Notifier>,
    config: SyncConfig,
    session: Mutex<Option<Session<C, N>>>,
}

struct Session<C, N> {
    cart: Arc<CartStore<C>>,
    notifications: Arc<NotificationStore<N>>,
    poll: PollLoop,
    consumers: usize,
}

impl<C, N> Clone for SyncContext<C, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, N> std::fmt::Debug for SyncContext<C, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("config", &self.inner.config)
            .field("consumers", &self.consumer_count())
            .finish_non_exhaustive()
    }
}

impl SyncContext<HttpGateway, HttpGateway> {
    /// Build a context talking to the REST backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(
        config: &ClientConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, GatewayError> {
        let gateway = Arc::new(HttpGateway::new(&config.api)?);
        Ok(Self::new(
            Arc::clone(&gateway),
            gateway,
            notifier,
            config.sync,
        ))
    }
}

impl<C, N> SyncContext<C, N> {
    /// Number of live consumers.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.inner
            .lock_session()
            .as_ref()
            .map_or(0, |session| session.consumers)
    }
}

impl<C: CartGateway, N: NotificationGateway> SyncContext<C, N> {
    /// Create a context with no session yet.
    #[must_use]
    pub fn new(
        cart_gateway: Arc<C>,
        notification_gateway: Arc<N>,
        notifier: Arc<dyn Notifier>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SyncContextInner {
                cart_gateway,
                notification_gateway,
                notifier,
                config,
                session: Mutex::new(None),
            }),
        }
    }

    /// Register a consumer.
    ///
    /// The first consumer of a session waits for the initial cart and
    /// notification loads. Their failures are already reported through the
    /// notifier and leave the stores empty. Dropping the returned future
    /// before it resolves detaches again.
    #[instrument(skip(self))]
    pub async fn attach(&self) -> Consumer<C, N> {
        let (cart, notifications, first) = {
            let mut guard = self.inner.lock_session();
            let session = guard.get_or_insert_with(|| self.inner.start_session());
            session.consumers += 1;
            (
                Arc::clone(&session.cart),
                Arc::clone(&session.notifications),
                session.consumers == 1,
            )
        };

        let consumer = Consumer {
            inner: Arc::clone(&self.inner),
            cart,
            notifications,
        };

        if first {
            let (cart_loaded, notifications_loaded) =
                tokio::join!(consumer.cart.refresh(), consumer.notifications.refresh());
            if let Err(err) = cart_loaded {
                debug!(error = %err, "Initial cart load failed");
            }
            if let Err(err) = notifications_loaded {
                debug!(error = %err, "Initial notification load failed");
            }
        }

        consumer
    }
}

impl<C, N> SyncContextInner<C, N> {
    fn lock_session(&self) -> MutexGuard<'_, Option<Session<C, N>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: CartGateway, N: NotificationGateway> SyncContextInner<C, N> {
    fn start_session(&self) -> Session<C, N> {
        let cart = Arc::new(CartStore::new(
            Arc::clone(&self.cart_gateway),
            Arc::clone(&self.notifier),
            &self.config,
        ));
        let notifications = Arc::new(NotificationStore::new(
            Arc::clone(&self.notification_gateway),
            Arc::clone(&self.notifier),
            &self.config,
        ));
        let poll = notifications.spawn_unread_poll(self.config.poll_interval);

        info!(
            poll_secs = self.config.poll_interval.as_secs(),
            page_size = self.config.page_size,
            "Sync session started"
        );

        Session {
            cart,
            notifications,
            poll,
            consumers: 0,
        }
    }

    fn detach(&self) {
        let mut guard = self.lock_session();
        let Some(session) = guard.as_mut() else {
            return;
        };
        session.consumers = session.consumers.saturating_sub(1);
        if session.consumers > 0 {
            return;
        }

        if let Some(session) = guard.take() {
            session.cart.teardown();
            session.notifications.teardown();
            session.poll.cancel();
            info!("Sync session ended");
        }
    }
}

/// A registered user of the stores. Dropping it detaches.
pub struct Consumer<C: CartGateway, N: NotificationGateway> {
    inner: Arc<SyncContextInner<C, N>>,
    cart: Arc<CartStore<C>>,
    notifications: Arc<NotificationStore<N>>,
}

impl<C: CartGateway, N: NotificationGateway> Consumer<C, N> {
    /// The shared cart.
    #[must_use]
    pub fn cart(&self) -> &CartStore<C> {
        &self.cart
    }

    /// The shared notification list.
    #[must_use]
    pub fn notifications(&self) -> &NotificationStore<N> {
        &self.notifications
    }
}

impl<C: CartGateway, N: NotificationGateway> std::fmt::Debug for Consumer<C, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("cart", &self.cart)
            .field("notifications", &self.notifications)
            .finish_non_exhaustive()
    }
}

impl<C: CartGateway, N: NotificationGateway> Drop for Consumer<C, N> {
    fn drop(&mut self) {
        self.inner.detach();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::SyncError;
    use crate::gateway::mock::{
        MockCartGateway, MockNotificationGateway, cart, cart_entry, notification,
        notification_page,
    };
    use crate::notice::ChannelNotifier;

    type TestContext = SyncContext<MockCartGateway, MockNotificationGateway>;

    fn context() -> (
        TestContext,
        Arc<MockCartGateway>,
        Arc<MockNotificationGateway>,
    ) {
        let carts = Arc::new(MockCartGateway::default());
        let notifications = Arc::new(MockNotificationGateway::default());
        let (notifier, _notices) = ChannelNotifier::channel();
        let context = SyncContext::new(
            Arc::clone(&carts),
            Arc::clone(&notifications),
            Arc::new(notifier),
            SyncConfig::default(),
        );
        (context, carts, notifications)
    }

    fn script_initial_load(carts: &MockCartGateway, notifications: &MockNotificationGateway) {
        carts.replies.push_ok(cart(vec![cart_entry("x1", 2, 10)], 20));
        notifications.pages.push_ok(notification_page(
            vec![notification("n1", false)],
            1,
            1,
            false,
        ));
    }

    #[tokio::test]
    async fn test_first_attach_loads_both_collections() {
        let (context, carts, notifications) = context();
        script_initial_load(&carts, &notifications);

        let consumer = context.attach().await;

        assert_eq!(consumer.cart().view().items.len(), 1);
        assert_eq!(consumer.notifications().unread_count(), 1);
        assert_eq!(context.consumer_count(), 1);
    }

    #[tokio::test]
    async fn test_second_attach_shares_the_session() {
        let (context, carts, notifications) = context();
        script_initial_load(&carts, &notifications);

        let first = context.attach().await;
        let second = context.attach().await;

        assert_eq!(carts.calls.count(), 1);
        assert_eq!(notifications.calls.count(), 1);
        assert_eq!(first.cart().view(), second.cart().view());
        assert_eq!(context.consumer_count(), 2);
    }

    #[tokio::test]
    async fn test_last_detach_tears_down() {
        let (context, carts, notifications) = context();
        script_initial_load(&carts, &notifications);

        let first = context.attach().await;
        let second = context.attach().await;
        let held = Arc::clone(&first.cart);

        drop(first);
        carts.replies.push_ok(cart(vec![], 0));
        assert_eq!(held.refresh().await, Ok(()));
        assert_eq!(context.consumer_count(), 1);

        drop(second);
        assert_eq!(context.consumer_count(), 0);
        assert_eq!(held.refresh().await, Err(SyncError::Inactive));
    }

    #[tokio::test]
    async fn test_reattach_starts_a_fresh_session() {
        let (context, carts, notifications) = context();
        script_initial_load(&carts, &notifications);
        drop(context.attach().await);

        carts.replies.push_ok(cart(vec![], 0));
        notifications
            .pages
            .push_ok(notification_page(vec![], 0, 0, false));
        let consumer = context.attach().await;

        assert!(consumer.cart().view().items.is_empty());
        assert_eq!(carts.calls.count(), 2);
    }

    #[tokio::test]
    async fn test_failed_initial_load_leaves_stores_empty() {
        let (context, _carts, _notifications) = context();

        let consumer = context.attach().await;

        assert!(consumer.cart().view().items.is_empty());
        assert!(consumer.notifications().view().items.is_empty());
        assert!(!consumer.cart().is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_after_last_detach() {
        let (context, carts, notifications) = context();
        script_initial_load(&carts, &notifications);
        notifications.counts.push_ok(4);

        let consumer = context.attach().await;
        tokio::time::sleep(Duration::from_secs(31)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(consumer.notifications().unread_count(), 4);

        drop(consumer);
        tokio::time::sleep(Duration::from_secs(120)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let polls = notifications
            .calls
            .all()
            .iter()
            .filter(|call| *call == "fetch_unread_count")
            .count();
        assert_eq!(polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_attach_during_initial_load_detaches() {
        let (context, carts, notifications) = context();
        let late_cart = carts.replies.push_deferred();
        let late_page = notifications.pages.push_deferred();

        let attached = tokio::time::timeout(Duration::from_millis(10), context.attach()).await;
        assert!(attached.is_err());
        assert_eq!(context.consumer_count(), 0);

        // Nobody is listening for these any more
        let _ = late_cart.send(Ok(cart(vec![cart_entry("late", 1, 10)], 10)));
        let _ = late_page.send(Ok(notification_page(
            vec![notification("late", false)],
            1,
            1,
            false,
        )));
        tokio::time::sleep(Duration::from_secs(120)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(
            !notifications
                .calls
                .all()
                .iter()
                .any(|call| call == "fetch_unread_count")
        );

        script_initial_load(&carts, &notifications);
        let consumer = context.attach().await;
        assert_eq!(context.consumer_count(), 1);
        assert_eq!(consumer.cart().view().items[0].id.as_str(), "x1");
        assert_eq!(carts.calls.count(), 2);
    }
}
