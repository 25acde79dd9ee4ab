//! Server-initiated notifications and the client's followups to them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `aws/window/showNotification` params. `id` correlates later followups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowNotificationParams {
    pub id: String,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSource {
    pub id: String,
}

/// `aws/window/notificationFollowup` params, sent by the client when the
/// user acts on a shown notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFollowupParams {
    pub source: NotificationSource,
    pub action: String,
}
