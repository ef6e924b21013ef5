use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use serde::Serialize;

use uuid::Uuid;

use crate::domain::SignupRequest;

const MAX_USER_AGENT_LEN: usize = 500;
const MAX_SOURCE_URL_LEN: usize = 200;

/// Best-effort request metadata captured once when a signup is created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub source_url: Option<String>,
}

impl ClientMeta {
    /// Build metadata from raw header values, dropping blanks and truncating oversized values
    pub fn new(
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        source_url: Option<&str>,
    ) -> Self {
        Self {
            ip_address: clean(ip_address, usize::MAX),
            user_agent: clean(user_agent, MAX_USER_AGENT_LEN),
            source_url: clean(source_url, MAX_SOURCE_URL_LEN),
        }
    }
}

fn clean(value: Option<&str>, max_chars: usize) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.chars().take(max_chars).collect())
}

/// New signup to be persisted
#[derive(Debug, Clone)]
pub struct NewSignup {
    pub request: SignupRequest,
    pub client: ClientMeta,
}

/// Outcome of the latest SMS confirmation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            other => Err(format!("{} is not a delivery status", other)),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored signup record
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SignupRecord {
    /// ID of the signup
    pub id: Uuid,
    /// Validated user supplied data
    pub name: String,
    pub email: String,
    /// Phone number as entered, normalized only when a notification is sent
    pub phone: Option<String>,
    pub zip_code: String,
    pub events_interested: Vec<String>,
    /// Tracking data, never updated after insert
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub source_url: Option<String>,
    /// Notification state, only touched by the notification worker
    pub sms_sent: bool,
    pub sms_sent_at: Option<DateTime<Utc>>,
    pub sms_delivery_status: Option<String>,
    /// Creation and update timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SignupRecord {
    /// Build the record a store holds right after inserting `new_signup`
    pub fn from_new(id: Uuid, new_signup: &NewSignup, created_at: DateTime<Utc>) -> Self {
        let request = &new_signup.request;
        Self {
            id,
            name: request.name.as_ref().to_string(),
            email: request.email.as_ref().to_string(),
            phone: request.phone.as_ref().map(|p| p.as_ref().to_string()),
            zip_code: request.zip_code.as_ref().to_string(),
            events_interested: request.events_interested.labels().to_vec(),
            ip_address: new_signup.client.ip_address.clone(),
            user_agent: new_signup.client.user_agent.clone(),
            source_url: new_signup.client.source_url.clone(),
            sms_sent: false,
            sms_sent_at: None,
            sms_delivery_status: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn delivery_status(&self) -> Option<DeliveryStatus> {
        self.sms_delivery_status
            .as_deref()
            .and_then(|status| status.parse().ok())
    }
}
