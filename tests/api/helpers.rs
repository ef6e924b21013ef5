use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, Method, Response};

use secrecy::Secret;

use url::Url;

use uuid::Uuid;

use tokio_util::sync::CancellationToken;

use wiremock::MockServer;

use fanfest_signup::app::{self, Services};
use fanfest_signup::client::SmsClient;
use fanfest_signup::repo::memory::{
    MemoryDedupeCache, MemoryRateLimitStore, MemorySignupStore, MemoryTaskQueue,
};
use fanfest_signup::repo::{RetryPolicy, TaskQueue};
use fanfest_signup::settings::{Runtime, Settings};
use fanfest_signup::worker::{JobOutcome, NotificationWorker, WorkerOptions};

/// Raw signup form fields, sent urlencoded with one pair per selected event
#[derive(Debug, Clone)]
pub struct NewSignup {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub zip_code: String,
    pub events_interested: Vec<String>,
}

impl NewSignup {
    pub fn valid(email: &str) -> Self {
        Self {
            name: "Test Fan".into(),
            email: email.into(),
            phone: String::new(),
            zip_code: "64105".into(),
            events_interested: vec!["World Cup Viewing Parties".into()],
        }
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone = phone.into();
        self
    }

    fn pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs = vec![
            ("name", self.name.as_str()),
            ("email", self.email.as_str()),
            ("phone", self.phone.as_str()),
            ("zip_code", self.zip_code.as_str()),
        ];
        pairs.extend(
            self.events_interested
                .iter()
                .map(|label| ("events_interested", label.as_str())),
        );
        pairs
    }
}

pub struct TestApp {
    addr: String,

    pub client: Client,
    pub sms_server: MockServer,

    pub signups: Arc<MemorySignupStore>,
    pub dedupe: Arc<MemoryDedupeCache>,
    pub queue: Arc<MemoryTaskQueue>,
    pub worker: NotificationWorker,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn an app instance on a random port after adjusting its settings
    pub async fn spawn_with(configure: impl FnOnce(&mut Settings)) -> Self {
        let settings_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("settings");
        let mut settings =
            Settings::load_from(Runtime::Dev, &settings_dir).expect("Failed to load settings");
        // Generous limits and long windows so only rate limit tests ever hit them
        settings.rate_limit.view_per_minute = 1_000;
        settings.rate_limit.submit_per_minute = 1_000;
        settings.rate_limit.confirmation_per_minute = 1_000;
        settings.rate_limit.window_seconds = 3_600;
        configure(&mut settings);

        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to listen on random port");
        let port = listener.local_addr().unwrap().port();

        let addr = format!("http://127.0.0.1:{}", port);

        let signups = Arc::new(MemorySignupStore::new());
        let dedupe = Arc::new(MemoryDedupeCache::new());
        let queue = Arc::new(MemoryTaskQueue::new(
            RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
            },
            Duration::from_secs(60),
        ));
        let services = Services {
            signups: signups.clone(),
            dedupe: dedupe.clone(),
            rate_limits: Arc::new(MemoryRateLimitStore::new()),
            queue: queue.clone(),
        };

        let sms_server = MockServer::start().await;

        let sms_client = {
            let api_base_url =
                Url::parse(&sms_server.uri()).expect("Failed to parse mock server uri");
            let api_auth_token = Secret::new("TestAuthorization".into());
            let api_timeout = Duration::from_secs(2);

            SmsClient::new(
                "+15550000000".into(),
                api_timeout,
                api_base_url,
                "AC123".into(),
                api_auth_token,
            )
            .expect("Failed to create SMS client")
        };

        let worker = NotificationWorker::new(
            queue.clone(),
            signups.clone(),
            Arc::new(sms_client),
            WorkerOptions {
                poll_interval: Duration::from_millis(10),
                receive_timeout: Duration::from_secs(1),
                send_timeout: Duration::from_secs(3),
            },
        );

        let server = app::run(listener, services, &settings).expect("Failed to spawn app instance");
        let _ = tokio::spawn(server);

        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .expect("Failed to build http client");

        Self {
            addr,
            client,
            sms_server,
            signups,
            dedupe,
            queue,
            worker,
        }
    }

    pub fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", &self.addr, url);
        self.client.request(method, url)
    }

    pub async fn health_check(&self) -> reqwest::Result<Response> {
        self.request(Method::GET, "health").send().await
    }

    pub async fn metrics(&self) -> reqwest::Result<Response> {
        self.request(Method::GET, "metrics").send().await
    }

    pub async fn signup_form(&self) -> reqwest::Result<Response> {
        self.request(Method::GET, "").send().await
    }

    pub async fn signup_create(&self, new_signup: &NewSignup) -> reqwest::Result<Response> {
        self.request(Method::POST, "signup")
            .form(&new_signup.pairs())
            .send()
            .await
    }

    pub async fn signup_success(&self, id: &str) -> reqwest::Result<Response> {
        self.request(Method::GET, &format!("success/{}", id))
            .send()
            .await
    }

    /// Process queued notification jobs until none is ready
    pub async fn dispatch_notifications(&self) -> Vec<JobOutcome> {
        let shutdown = CancellationToken::new();
        let mut outcomes = Vec::new();

        while let Some(delivery) = self.queue.receive().await.expect("Failed to receive job") {
            let outcome = self
                .worker
                .process(&delivery, &shutdown)
                .await
                .expect("Failed to process job");
            outcomes.push(outcome);
        }

        outcomes
    }
}

/// Signup ID from a `Location: .../success/{id}` redirect
pub fn redirected_signup_id(res: &Response) -> Uuid {
    let location = res
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("Missing redirect location")
        .to_str()
        .expect("Invalid redirect location");

    location
        .rsplit('/')
        .next()
        .and_then(|id| id.parse().ok())
        .expect("Redirect location does not end with a signup ID")
}
