//! User notifications (sensor alerts, order updates, course reminders).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{NotificationId, UserId};

/// Notification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    #[serde(rename = "haute")]
    High,
    #[default]
    #[serde(rename = "normale")]
    Normal,
    #[serde(rename = "basse")]
    Low,
}

/// Category tag of a notification.
///
/// Unknown tags sent by newer backends are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationCategory {
    /// Sensor threshold alert from a pot.
    Alert,
    Order,
    System,
    Course,
    Info,
    Other(String),
}

impl NotificationCategory {
    /// The wire tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Alert => "alerte",
            Self::Order => "commande",
            Self::System => "systeme",
            Self::Course => "cours",
            Self::Info => "info",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for NotificationCategory {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "alerte" => Self::Alert,
            "commande" => Self::Order,
            "systeme" => Self::System,
            "cours" => Self::Course,
            "info" => Self::Info,
            _ => Self::Other(tag),
        }
    }
}

impl From<NotificationCategory> for String {
    fn from(category: NotificationCategory) -> Self {
        match category {
            NotificationCategory::Other(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

/// A notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: NotificationId,
    #[serde(rename = "userId")]
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub category: NotificationCategory,
    #[serde(rename = "titre")]
    pub title: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "dateCreation")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "estLue", default)]
    pub is_read: bool,
    /// In-app route to open when the notification is clicked.
    #[serde(rename = "lien", default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(rename = "priorite", default)]
    pub priority: Priority,
}

/// One page of the notification list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationPageDocument {
    #[serde(default)]
    pub notifications: Vec<Notification>,
    /// Unread count across the whole collection, not just this page.
    #[serde(rename = "unreadCount", default)]
    pub unread_count: u64,
    #[serde(rename = "hasMore", default)]
    pub has_more: bool,
}

/// The cheap polling document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCountDocument {
    pub count: u64,
}
