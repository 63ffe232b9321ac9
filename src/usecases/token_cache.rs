//! Token Cache - Expiry-aware Bearer Token Reuse
//!
//! Holds the bearer token for one password-grant provider for the life
//! of the process. One cache is created per OAuth provider at startup
//! and never torn down; the token is refreshed lazily on first use
//! after expiry.
//!
//! Concurrent misses are coalesced: the entry lock is held across the
//! exchange, so callers arriving while an exchange is in flight wait
//! for it and reuse its token instead of issuing their own. Failed
//! exchanges are never cached; the next call tries again.
//!
//! The exchange is bounded by its own timeout. A provider task that
//! the orchestrator abandons keeps running in the background, so an
//! unbounded exchange would hold the lock past every later deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::ports::CredentialExchange;

/// Cached lifetime of an issued token. Upstream declares 60 minutes;
/// the margin keeps a token from expiring mid-request.
pub const TOKEN_TTL: Duration = Duration::from_secs(55 * 60);

/// Upper bound on a single credential exchange.
pub const TOKEN_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// A cached token and the instant it stops being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCacheEntry {
    pub token: String,
    pub expires_at: Instant,
}

/// Process-lifetime bearer token cache.
pub struct TokenCache {
    exchange: Arc<dyn CredentialExchange>,
    ttl: Duration,
    exchange_timeout: Duration,
    entry: Mutex<Option<TokenCacheEntry>>,
}

impl TokenCache {
    /// Create an empty cache using [`TOKEN_TTL`].
    pub fn new(exchange: Arc<dyn CredentialExchange>) -> Self {
        Self::with_ttl(exchange, TOKEN_TTL)
    }

    /// Create an empty cache with a custom lifetime.
    pub fn with_ttl(exchange: Arc<dyn CredentialExchange>, ttl: Duration) -> Self {
        Self {
            exchange,
            ttl,
            exchange_timeout: TOKEN_EXCHANGE_TIMEOUT,
            entry: Mutex::new(None),
        }
    }

    /// Bound each credential exchange by `timeout`.
    #[must_use]
    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Return a valid token, exchanging credentials only on a miss.
    ///
    /// # Errors
    /// Propagates the [`AuthError`] of a failed exchange, or
    /// [`AuthError::TimedOut`] when it outlives the exchange timeout.
    /// Nothing is cached in either case.
    pub async fn get_token(&self) -> Result<String, AuthError> {
        let mut entry = self.entry.lock().await;

        if let Some(cached) = entry.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
            debug!("Cached bearer token expired");
        }

        *entry = None;
        let exchange = timeout(self.exchange_timeout, self.exchange.exchange());
        let token = match exchange.await {
            Ok(Ok(token)) => token,
            Ok(Err(e)) => {
                warn!(error = %e, "Credential exchange failed");
                return Err(e);
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.exchange_timeout.as_millis(),
                    "Credential exchange timed out"
                );
                return Err(AuthError::TimedOut(self.exchange_timeout));
            }
        };

        *entry = Some(TokenCacheEntry {
            token: token.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        info!(ttl_secs = self.ttl.as_secs(), "Bearer token refreshed");

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use mockall::mock;

    use super::*;

    mock! {
        pub Exchange {}

        #[async_trait]
        impl CredentialExchange for Exchange {
            async fn exchange(&self) -> Result<String, AuthError>;
        }
    }

    /// Exchange that takes a while, to exercise concurrent misses.
    struct SlowExchange {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialExchange for SlowExchange {
        async fn exchange(&self) -> Result<String, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(format!("slow-{n}"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_reused_within_lifetime() {
        let mut exchange = MockExchange::new();
        exchange
            .expect_exchange()
            .times(1)
            .returning(|| Ok("tok-1".to_string()));

        let cache = TokenCache::new(Arc::new(exchange));
        let first = cache.get_token().await.unwrap();
        tokio::time::advance(Duration::from_secs(30 * 60)).await;
        let second = cache.get_token().await.unwrap();

        assert_eq!(first, "tok-1");
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_triggers_one_new_exchange() {
        let issued = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&issued);
        let mut exchange = MockExchange::new();
        exchange.expect_exchange().times(2).returning(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("tok-{n}"))
        });

        let cache = TokenCache::new(Arc::new(exchange));
        assert_eq!(cache.get_token().await.unwrap(), "tok-1");

        tokio::time::advance(TOKEN_TTL + Duration::from_secs(1)).await;
        assert_eq!(cache.get_token().await.unwrap(), "tok-2");
        assert_eq!(cache.get_token().await.unwrap(), "tok-2");
        assert_eq!(issued.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_exchange_is_not_cached() {
        let mut exchange = MockExchange::new();
        let mut seq = mockall::Sequence::new();
        exchange
            .expect_exchange()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| {
                Err(AuthError::Rejected {
                    status: 400,
                    body: "invalid_grant".into(),
                })
            });
        exchange
            .expect_exchange()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok("tok-ok".to_string()));

        let cache = TokenCache::new(Arc::new(exchange));
        assert!(cache.get_token().await.is_err());
        assert_eq!(cache.get_token().await.unwrap(), "tok-ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_exchange() {
        let exchange = Arc::new(SlowExchange {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(TokenCache::new(Arc::clone(&exchange) as Arc<dyn CredentialExchange>));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "slow-1");
        }
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
    }

    /// Exchange that hangs on its first call only.
    struct StallOnceExchange {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialExchange for StallOnceExchange {
        async fn exchange(&self) -> Result<String, AuthError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::future::pending::<()>().await;
            }
            Ok("tok-recovered".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_exchange_times_out_and_releases_lock() {
        let exchange = Arc::new(StallOnceExchange {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(
            TokenCache::new(Arc::clone(&exchange) as Arc<dyn CredentialExchange>)
                .with_exchange_timeout(Duration::from_secs(2)),
        );

        let stalled = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_token().await })
        };
        tokio::task::yield_now().await;
        let waiting = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_token().await })
        };

        match stalled.await.unwrap() {
            Err(AuthError::TimedOut(after)) => assert_eq!(after, Duration::from_secs(2)),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(waiting.await.unwrap().unwrap(), "tok-recovered");
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 2);
    }
}
