//! Per-symbol client cache

use cached::{Cached, UnboundCache};
use desk_core::Symbol;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use crate::api::SymbolClient;

type Slot = Arc<OnceCell<Arc<dyn SymbolClient>>>;

struct Entries {
    slots: UnboundCache<Symbol, Slot>,
    order: Vec<Symbol>,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            slots: UnboundCache::new(),
            order: Vec::new(),
        }
    }
}

/// Append-only cache of resolved clients, keyed by canonical symbol
///
/// Each symbol owns a slot. The map lock only guards slot lookup, so a slow
/// resolution blocks callers for that symbol and nobody else. Concurrent
/// callers for one symbol resolve it once. Failed resolutions leave the slot
/// empty and the next caller tries again.
#[derive(Default)]
pub struct ClientCache {
    entries: Mutex<Entries>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, symbol: &Symbol) -> Slot {
        let mut entries = self.entries.lock().await;
        if let Some(slot) = entries.slots.cache_get(symbol) {
            return Arc::clone(slot);
        }
        let slot = Slot::default();
        entries.slots.cache_set(symbol.clone(), Arc::clone(&slot));
        slot
    }

    pub async fn get(&self, symbol: &Symbol) -> Option<Arc<dyn SymbolClient>> {
        let mut entries = self.entries.lock().await;
        entries.slots.cache_get(symbol).and_then(|slot| slot.get().cloned())
    }

    /// Return the cached client for `symbol`, resolving and caching it on a
    /// miss.
    pub async fn get_or_resolve<F, Fut, E>(&self, symbol: &Symbol, resolve: F) -> Result<Arc<dyn SymbolClient>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn SymbolClient>, E>>,
    {
        let slot = self.slot(symbol).await;
        if let Some(client) = slot.get() {
            tracing::debug!(%symbol, "Client cache hit");
            return Ok(Arc::clone(client));
        }

        let client = slot
            .get_or_try_init(|| async {
                tracing::debug!(%symbol, "Client cache miss");
                let client = resolve().await?;
                self.entries.lock().await.order.push(symbol.clone());
                Ok::<_, E>(client)
            })
            .await?;
        Ok(Arc::clone(client))
    }

    /// Symbols resolved so far, in resolution order
    pub async fn symbols(&self) -> Vec<Symbol> {
        self.entries.lock().await.order.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MarketDataSource, MemorySource};
    use crate::error::SourceResult;
    use std::time::Duration;
    use tokio_test::{assert_pending, task};

    // `assert_pending!` formats the poll result on failure, which needs `Debug`.
    impl std::fmt::Debug for dyn SymbolClient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("SymbolClient")
        }
    }

    fn symbol(raw: &str) -> Symbol {
        Symbol::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_once_per_symbol() {
        let source = MemorySource::new();
        let cache = ClientCache::new();
        let aapl = symbol("AAPL");

        for _ in 0..3 {
            let resolved = cache
                .get_or_resolve(&aapl, || async { source.connect(&aapl) })
                .await;
            assert!(resolved.is_ok());
        }

        assert_eq!(source.connect_count(), 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.symbols().await, vec![aapl.clone()]);
        assert!(cache.get(&aapl).await.is_some());
    }

    #[tokio::test]
    async fn test_failed_resolution_is_not_cached() {
        let cache = ClientCache::new();
        let bad = symbol("ZZZZ");

        let result = cache
            .get_or_resolve(&bad, || async { Err::<Arc<dyn SymbolClient>, _>("no data") })
            .await;
        assert_eq!(result.err(), Some("no data"));
        assert!(cache.is_empty().await);
        assert!(cache.get(&bad).await.is_none());
    }

    #[tokio::test]
    async fn test_symbols_keep_resolution_order() {
        let source = MemorySource::new();
        let cache = ClientCache::new();

        for raw in ["MSFT", "AAPL", "MSFT", "GOOGL"] {
            let s = symbol(raw);
            cache.get_or_resolve(&s, || async { source.connect(&s) }).await.unwrap();
        }

        assert_eq!(cache.symbols().await, vec![symbol("MSFT"), symbol("AAPL"), symbol("GOOGL")]);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_resolution() {
        let source = MemorySource::new();
        let cache = ClientCache::new();
        let aapl = symbol("AAPL");

        let (first, second) = futures::join!(
            cache.get_or_resolve(&aapl, || async {
                tokio::task::yield_now().await;
                source.connect(&aapl)
            }),
            cache.get_or_resolve(&aapl, || async { source.connect(&aapl) }),
        );

        assert!(first.is_ok() && second.is_ok());
        assert_eq!(source.connect_count(), 1);
        assert_eq!(cache.symbols().await, vec![aapl]);
    }

    #[tokio::test]
    async fn test_stuck_resolution_does_not_block_other_symbols() {
        let source = MemorySource::new();
        let cache = ClientCache::new();
        let (aapl, slow, msft) = (symbol("AAPL"), symbol("SLOW"), symbol("MSFT"));
        cache.get_or_resolve(&aapl, || async { source.connect(&aapl) }).await.unwrap();

        let mut stuck = task::spawn(cache.get_or_resolve(&slow, || {
            std::future::pending::<SourceResult<Arc<dyn SymbolClient>>>()
        }));
        assert_pending!(stuck.poll());

        let others = async {
            let cached = cache.get_or_resolve(&aapl, || async { source.connect(&aapl) }).await;
            let fresh = cache.get_or_resolve(&msft, || async { source.connect(&msft) }).await;
            (cached, fresh)
        };
        let (cached, fresh) = tokio::time::timeout(Duration::from_secs(1), others)
            .await
            .expect("other symbols stalled behind a pending resolution");
        assert!(cached.is_ok() && fresh.is_ok());
        assert_pending!(stuck.poll());

        // An abandoned resolution leaves the slot open for the next caller.
        drop(stuck);
        assert!(cache.get(&slow).await.is_none());
        cache.get_or_resolve(&slow, || async { source.connect(&slow) }).await.unwrap();
        assert_eq!(cache.symbols().await, vec![aapl, msft, slow]);
    }
}
