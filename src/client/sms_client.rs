use std::time::Duration;

use anyhow::Context;

use reqwest::{Client, StatusCode};

use secrecy::Secret;

use serde::{Deserialize, Serialize};

use url::Url;

use crate::domain::PhoneNumber;

/// A text message ready to be handed to the carrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sms {
    pub recipient: PhoneNumber,
    pub body: String,
}

/// Carrier acknowledgement of an accepted message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SmsReceipt {
    pub sid: String,
    pub status: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    /// Worth retrying later: timeouts, connection failures, carrier overload
    #[error("Transient SMS sink failure: {0}")]
    Transient(String),

    /// Retrying cannot help: rejected destination, bad credentials
    #[error("SMS sink rejected the message: {0}")]
    Permanent(String),
}

impl SmsError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = format!("{} {}", status, body.trim());
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Self::Transient(detail)
        } else {
            Self::Permanent(detail)
        }
    }
}

impl From<reqwest::Error> for SmsError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::from_status(status, ""),
            None => Self::Transient(e.to_string()),
        }
    }
}

/// External notification sink for confirmation texts
#[async_trait::async_trait]
pub trait SmsSink: Send + Sync {
    async fn send(&self, sms: &Sms) -> Result<SmsReceipt, SmsError>;
}

/// REST client for a Twilio-compatible messaging API
#[derive(Debug)]
pub struct SmsClient {
    client: Client,
    sender: String,

    account_sid: String,
    api_messages_url: Url,
    api_auth_token: Secret<String>,
}

impl SmsClient {
    pub fn new(
        sender: String,
        api_timeout: Duration,
        api_base_url: Url,
        account_sid: String,
        api_auth_token: Secret<String>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(api_timeout)
            .build()
            .context("Failed to build http client")?;

        let api_messages_url = api_base_url
            .join(&format!("2010-04-01/Accounts/{}/Messages.json", account_sid))
            .context("Failed to create send message endpoint URL")?;

        Ok(Self {
            client,
            sender,
            account_sid,
            api_messages_url,
            api_auth_token,
        })
    }
}

#[async_trait::async_trait]
impl SmsSink for SmsClient {
    #[tracing::instrument(name = "Send an SMS via API", skip_all)]
    async fn send(&self, sms: &Sms) -> Result<SmsReceipt, SmsError> {
        use secrecy::ExposeSecret;

        let body = SendMessageRequest {
            to: sms.recipient.as_ref(),
            from: &self.sender,
            body: &sms.body,
        };

        let res = self
            .client
            .post(self.api_messages_url.clone())
            .basic_auth(&self.account_sid, Some(self.api_auth_token.expose_secret()))
            .form(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(SmsError::from_status(status, &text));
        }

        // The message is accepted at this point, so an unreadable body must not trigger a resend
        match res.json::<SmsReceipt>().await {
            Ok(receipt) => Ok(receipt),
            Err(error) => {
                tracing::warn!(error.cause_chain = ?error, "Unreadable SMS API response");
                Ok(SmsReceipt {
                    sid: String::new(),
                    status: "accepted".into(),
                })
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageRequest<'a> {
    to: &'a str,
    from: &'a str,
    body: &'a str,
}
