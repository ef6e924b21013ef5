use serde::{Deserialize, Serialize};

use uuid::Uuid;

/// Task queue message asking the notification worker to text a confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationJob {
    pub signup_id: Uuid,
    pub phone: String,
    pub name: String,
}
