//! External lookups behind the cache.
//!
//! A [`Fetcher`] resolves ids of one service. Failures of any kind degrade
//! to [`Lookup::NotFound`], which is then cached like a success.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::cache::{CacheKey, Lookup};
use crate::context::BotContext;
use crate::layers::cache::cache_mut;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Service tag this fetcher resolves, e.g. `"bugzilla"`.
    fn service(&self) -> &str;

    async fn fetch(&self, id: &str) -> Lookup;
}

/// Fetchers by service tag.
#[derive(Clone, Default)]
pub struct Fetchers {
    by_service: HashMap<String, Arc<dyn Fetcher>>,
}

impl Fetchers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.register(Arc::new(fetcher));
        self
    }

    /// Registers `fetcher`, replacing any previous one for its service.
    pub fn register(&mut self, fetcher: Arc<dyn Fetcher>) {
        self.by_service
            .insert(fetcher.service().to_string(), fetcher);
    }

    pub fn get(&self, service: &str) -> Option<&Arc<dyn Fetcher>> {
        self.by_service.get(service)
    }

    /// Fetches `key` uncached. Unknown services yield `NotFound`.
    pub async fn fetch(&self, key: &CacheKey) -> Lookup {
        match self.get(&key.service) {
            Some(fetcher) => fetcher.fetch(&key.id).await,
            None => {
                warn!(key = %key, "no fetcher for service");
                Lookup::NotFound
            }
        }
    }
}

impl fmt::Debug for Fetchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut services: Vec<&str> = self.by_service.keys().map(String::as_str).collect();
        services.sort_unstable();
        f.debug_struct("Fetchers")
            .field("services", &services)
            .finish()
    }
}

/// Looks `key` up through the context's cache, fetching on a miss.
pub async fn cache_fetch(ctx: &mut BotContext, fetchers: &Fetchers, key: CacheKey) -> Lookup {
    cache_mut(ctx)
        .provide(key, |key| async move { fetchers.fetch(&key).await })
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ircbot_core::Session;
    use serde_json::json;

    use super::*;

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Fetcher for Counting {
        fn service(&self) -> &str {
            "bugzilla"
        }

        async fn fetch(&self, id: &str) -> Lookup {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if id == "404" {
                Lookup::NotFound
            } else {
                Lookup::Found(json!(format!("Bug {id}")))
            }
        }
    }

    #[tokio::test]
    async fn test_cache_fetch_memoizes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetchers = Fetchers::new().with(Counting {
            calls: calls.clone(),
        });
        let mut ctx = BotContext::new(Session::new("s", 6667, "bot"));

        let key = CacheKey::new("bugzilla", "36734");
        let first = cache_fetch(&mut ctx, &fetchers, key.clone()).await;
        let second = cache_fetch(&mut ctx, &fetchers, key).await;
        assert_eq!(first, Lookup::Found(json!("Bug 36734")));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_service_is_not_found() {
        let fetchers = Fetchers::new();
        let value = fetchers.fetch(&CacheKey::new("jira", "1")).await;
        assert_eq!(value, Lookup::NotFound);
    }
}
