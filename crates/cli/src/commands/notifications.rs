//! Notification commands.

use greenhouse_client::NotificationsView;
use greenhouse_core::{Notification, NotificationId, Priority};

use super::{CommandError, Session};

/// Print the first page, or every page with `all`.
pub async fn list(session: &Session, all: bool) -> Result<(), CommandError> {
    let store = session.notifications().await?;

    while all && store.has_more() {
        store.load_more().await?;
    }

    print_notifications(&store.view());
    Ok(())
}

/// Mark `id` as read.
pub async fn mark_as_read(session: &Session, id: String) -> Result<(), CommandError> {
    let store = session.notifications().await?;
    store.mark_as_read(NotificationId::new(id)).await?;
    print_notifications(&store.view());
    Ok(())
}

/// Mark every notification as read.
pub async fn mark_all_as_read(session: &Session) -> Result<(), CommandError> {
    let store = session.notifications().await?;
    store.mark_all_as_read().await?;
    tracing::info!("All notifications marked as read");
    Ok(())
}

/// Delete `id`.
pub async fn delete(session: &Session, id: String) -> Result<(), CommandError> {
    let store = session.notifications().await?;
    store.delete(NotificationId::new(id)).await?;
    print_notifications(&store.view());
    Ok(())
}

/// Delete every read notification.
pub async fn delete_all_read(session: &Session) -> Result<(), CommandError> {
    let store = session.notifications().await?;
    store.delete_all_read().await?;
    print_notifications(&store.view());
    Ok(())
}

/// Log the unread count each time the poll changes it, until Ctrl+C.
pub async fn watch(session: &Session) -> Result<(), CommandError> {
    let context = session.context();
    let consumer = context.attach().await;
    let mut updates = consumer.notifications().subscribe();

    let mut last = consumer.notifications().unread_count();
    tracing::info!(unread = last, "Watching notifications (Ctrl+C to stop)");

    loop {
        tokio::select! {
            changed = updates.changed() => {
                changed.map_err(|e| CommandError::Watch(e.to_string()))?;
                let unread = updates.borrow_and_update().snapshot.aggregate;
                if unread != last {
                    tracing::info!(unread, "Unread count changed");
                    last = unread;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|e| CommandError::Watch(e.to_string()))?;
                break;
            }
        }
    }

    tracing::info!("Stopped watching");
    Ok(())
}

fn print_notifications(view: &NotificationsView) {
    for notification in &view.items {
        print_notification(notification);
    }
    if view.has_more {
        tracing::info!("More notifications available (use --all)");
    }
    tracing::info!(
        "{} shown, {} unread",
        view.items.len(),
        view.unread_count
    );
}

fn print_notification(notification: &Notification) {
    let marker = if notification.is_read { ' ' } else { '*' };
    let priority = match notification.priority {
        Priority::High => "!",
        Priority::Normal | Priority::Low => "",
    };
    tracing::info!(
        "{marker} {}  [{}]{priority} {} - {}  ({})",
        notification.id,
        notification.category.as_str(),
        notification.title,
        notification.body,
        notification.created_at.format("%Y-%m-%d %H:%M")
    );
}
