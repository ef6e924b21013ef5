use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{dev, web, FromRequest, HttpRequest};

use chrono::{DateTime, TimeZone, Utc};

use crate::error::RestError;
use crate::repo::RateLimitStore;

/// Which limit guards an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    /// Page views, tuned for legitimate repeat visits
    View,
    /// Form submissions, tuned to make scripted mass signups costly
    Submit,
    /// Confirmation page views, looked up by signup ID
    Confirmation,
}

impl LimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitScope::View => "view",
            LimitScope::Submit => "submit",
            LimitScope::Confirmation => "confirmation",
        }
    }
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Too many {scope} requests, retry after {}s", .retry_after.as_secs())]
pub struct RateLimitError {
    pub scope: LimitScope,
    pub retry_after: Duration,
}

/// Requests allowed per client and window, by scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub view: u32,
    pub submit: u32,
    pub confirmation: u32,
}

impl RateLimits {
    fn of(&self, scope: LimitScope) -> u32 {
        match scope {
            LimitScope::View => self.view,
            LimitScope::Submit => self.submit,
            LimitScope::Confirmation => self.confirmation,
        }
    }
}

/// Fixed-window admission control keyed by client address.
///
/// Counters live in a [`RateLimitStore`] shared by every web-tier instance. The limiter
/// never waits: a request over the limit is rejected at once.
///
/// Clients are identified by their socket peer address. `Forwarded`/`X-Forwarded-For`
/// are only honored once [`RateLimiter::trust_forwarded_headers`] is set, for
/// deployments where a proxy in front of the web tier overwrites them.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    limits: RateLimits,
    window: Duration,
    trust_forwarded_headers: bool,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limits", &self.limits)
            .field("window", &self.window)
            .field("trust_forwarded_headers", &self.trust_forwarded_headers)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, limits: RateLimits, window: Duration) -> Self {
        Self {
            store,
            limits,
            // Zero-length windows would never reset
            window: window.max(Duration::from_secs(1)),
            trust_forwarded_headers: false,
        }
    }

    /// Key clients on forwarded-for headers instead of the socket peer
    pub fn trust_forwarded_headers(mut self, trusted: bool) -> Self {
        self.trust_forwarded_headers = trusted;
        self
    }

    /// Counter key identifying the client behind `req`
    pub fn client_key(&self, req: &HttpRequest) -> String {
        if self.trust_forwarded_headers {
            return client_address(req);
        }
        req.peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".into())
    }

    /// Start of the fixed window containing `now`
    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window_secs = self.window.as_secs() as i64;
        let start = now.timestamp() - now.timestamp().rem_euclid(window_secs);
        Utc.timestamp_opt(start, 0).single().unwrap_or(now)
    }

    /// Count one request from `client` against the `scope` limit.
    ///
    /// Admission fails open when the counter store is unreachable.
    #[tracing::instrument(name = "Check rate limit", skip(self))]
    pub async fn check(&self, scope: LimitScope, client: &str) -> Result<(), RateLimitError> {
        let now = Utc::now();
        let window_start = self.window_start(now);
        let key = format!("{}:{}", scope, client);

        let hits = match self.store.hit(&key, window_start).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error.cause_chain = ?e, "Rate limit store unavailable, admitting request");
                return Ok(());
            }
        };

        if hits <= i64::from(self.limits.of(scope)) {
            return Ok(());
        }

        let window_end = window_start + chrono::Duration::seconds(self.window.as_secs() as i64);
        let retry_after = (window_end - now)
            .to_std()
            .unwrap_or_default()
            .max(Duration::from_secs(1));

        tracing::info!(hits, "Rate limit exceeded");
        Err(RateLimitError { scope, retry_after })
    }
}

/// Marker tying an [`Admitted`] extractor to a limit
pub trait AdmissionScope {
    const SCOPE: LimitScope;
}

#[derive(Debug)]
pub struct ViewScope;

impl AdmissionScope for ViewScope {
    const SCOPE: LimitScope = LimitScope::View;
}

#[derive(Debug)]
pub struct SubmitScope;

impl AdmissionScope for SubmitScope {
    const SCOPE: LimitScope = LimitScope::Submit;
}

#[derive(Debug)]
pub struct ConfirmationScope;

impl AdmissionScope for ConfirmationScope {
    const SCOPE: LimitScope = LimitScope::Confirmation;
}

/// Extractor admitting a request under the `S` limit, rejecting it with `429 Too Many
/// Requests` otherwise.
///
/// Listed first among a handler's arguments, it runs before any other extraction.
#[derive(Debug)]
pub struct Admitted<S>(PhantomData<S>);

impl<S: AdmissionScope + 'static> FromRequest for Admitted<S> {
    type Error = RestError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            // NOTE: Must be registered with the application at startup
            let limiter = req
                .app_data::<web::Data<RateLimiter>>()
                .ok_or_else(|| RestError::InternalError("Rate limiter not registered".into()))?;

            let client = limiter.client_key(&req);
            limiter.check(S::SCOPE, &client).await?;

            Ok(Admitted(PhantomData))
        })
    }
}

/// Client address for tracking, honoring `Forwarded`/`X-Forwarded-For` when present
pub fn client_address(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}
