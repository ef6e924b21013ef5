use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::domain::SignupRequest;
use crate::model::{ClientMeta, NewSignup, NotificationJob};
use crate::repo::{DedupeCache, SignupStore, TaskQueue};

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Email was already submitted recently")]
    Duplicate,

    #[error("Failed to store signup")]
    Storage(#[source] sqlx::Error),
}

/// Turns a validated signup into a stored record and, when a phone number was given,
/// a queued confirmation text.
///
/// Duplicates are caught by a TTL-bounded marker in the dedupe cache, not by the store:
/// the same email submitted after the marker expires becomes a second record.
pub struct SignupPipeline {
    signups: Arc<dyn SignupStore>,
    dedupe: Arc<dyn DedupeCache>,
    queue: Arc<dyn TaskQueue>,
    dedupe_ttl: Duration,
}

impl SignupPipeline {
    pub const DEFAULT_DEDUPE_TTL: Duration = Duration::from_secs(60 * 60);

    pub fn new(
        signups: Arc<dyn SignupStore>,
        dedupe: Arc<dyn DedupeCache>,
        queue: Arc<dyn TaskQueue>,
        dedupe_ttl: Duration,
    ) -> Self {
        Self {
            signups,
            dedupe,
            queue,
            dedupe_ttl,
        }
    }

    fn dedupe_key(request: &SignupRequest) -> String {
        format!("email_check:{}", request.email.as_ref())
    }

    /// Store a new signup, returning its ID
    #[tracing::instrument(name = "Submit signup", skip_all)]
    pub async fn submit(
        &self,
        request: SignupRequest,
        client: ClientMeta,
    ) -> Result<Uuid, SubmitError> {
        let key = Self::dedupe_key(&request);

        let claimed = self
            .dedupe
            .claim(&key, self.dedupe_ttl)
            .await
            .map_err(|e| {
                tracing::error!(error.cause_chain = ?e, "Failed to claim dedupe marker");
                SubmitError::Storage(e)
            })?;
        if !claimed {
            tracing::info!("Rejected duplicate signup");
            return Err(SubmitError::Duplicate);
        }

        let new_signup = NewSignup { request, client };
        let id = match self.signups.insert(&new_signup).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error.cause_chain = ?e, "Failed to insert signup");
                // A stale marker only causes false duplicates until it expires
                if let Err(release_error) = self.dedupe.release(&key).await {
                    tracing::warn!(
                        error.cause_chain = ?release_error,
                        "Failed to release dedupe marker after a failed insert"
                    );
                }
                return Err(SubmitError::Storage(e));
            }
        };
        tracing::info!(signup_id = %id, "Stored new signup");

        if let Some(phone) = &new_signup.request.phone {
            let job = NotificationJob {
                signup_id: id,
                phone: phone.as_ref().to_string(),
                name: new_signup.request.name.as_ref().to_string(),
            };
            // Best effort: the stored record stays the source of truth
            if let Err(e) = self.queue.enqueue(&job).await {
                tracing::error!(signup_id = %id, error.cause_chain = ?e, "Failed to enqueue SMS confirmation");
            }
        }

        Ok(id)
    }
}
