use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::{EventCatalog, SignupForm};
use crate::views;

#[derive(Debug)]
struct Cached<T> {
    value: T,
    expires_at: Instant,
}

impl<T: Clone> Cached<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn fresh(&self) -> Option<T> {
        (self.expires_at > Instant::now()).then(|| self.value.clone())
    }
}

/// Event catalog snapshots and the blank signup form rendered from them.
///
/// Both are rebuilt lazily once their TTL lapses. A cached form page is only served while
/// it was rendered from the current catalog snapshot.
#[derive(Debug)]
pub struct CatalogCache {
    source: String,
    catalog_ttl: Duration,
    page_ttl: Duration,

    catalog: RwLock<Option<Cached<Arc<EventCatalog>>>>,
    form_page: RwLock<Option<Cached<(Arc<EventCatalog>, Arc<str>)>>>,
}

impl CatalogCache {
    pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(10 * 60);
    pub const DEFAULT_PAGE_TTL: Duration = Duration::from_secs(5 * 60);

    /// `source` is the comma-separated catalog override; an empty one selects the built-in list
    pub fn new(source: impl Into<String>, catalog_ttl: Duration, page_ttl: Duration) -> Self {
        Self {
            source: source.into(),
            catalog_ttl,
            page_ttl,
            catalog: RwLock::new(None),
            form_page: RwLock::new(None),
        }
    }

    /// The current catalog snapshot
    pub async fn catalog(&self) -> Arc<EventCatalog> {
        if let Some(catalog) = self.catalog.read().await.as_ref().and_then(Cached::fresh) {
            return catalog;
        }

        let mut cached = self.catalog.write().await;
        // Another request may have refreshed it while we waited for the lock
        if let Some(catalog) = cached.as_ref().and_then(Cached::fresh) {
            return catalog;
        }

        let catalog = Arc::new(EventCatalog::from_config(&self.source));
        tracing::debug!(events = catalog.len(), "Refreshed event catalog");
        *cached = Some(Cached::new(Arc::clone(&catalog), self.catalog_ttl));
        catalog
    }

    /// The blank signup form for the current catalog snapshot
    pub async fn form_page(&self) -> Arc<str> {
        let catalog = self.catalog().await;

        let cached_page = self
            .form_page
            .read()
            .await
            .as_ref()
            .and_then(Cached::fresh)
            .filter(|(rendered_from, _)| Arc::ptr_eq(rendered_from, &catalog));
        if let Some((_, page)) = cached_page {
            return page;
        }

        let page: Arc<str> = views::signup_form(&catalog, &SignupForm::default(), None, None).into();
        *self.form_page.write().await = Some(Cached::new(
            (catalog, Arc::clone(&page)),
            self.page_ttl,
        ));
        page
    }
}
