use super::NetworkView;
use crate::database::models::TransportType;

use tokio::sync::RwLock;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Last built view per transport type, tagged with the write generation it was
/// built from. Any station or route write must call [`NetworkCache::invalidate`].
#[derive(Default)]
pub struct NetworkCache {
    generation: AtomicU64,
    views: RwLock<HashMap<TransportType, (u64, Arc<NetworkView>)>>,
}

impl NetworkCache {
    pub fn new() -> NetworkCache {
        NetworkCache::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub async fn get(&self, transport_type: TransportType) -> Option<Arc<NetworkView>> {
        let current = self.generation();
        let views = self.views.read().await;
        views
            .get(&transport_type)
            .filter(|(generation, _)| *generation == current)
            .map(|(_, view)| view.clone())
    }

    /// Stores a view built from the data visible at `generation`. A view whose
    /// inputs were written to while it was being built is returned but not kept.
    pub async fn store(
        &self,
        transport_type: TransportType,
        generation: u64,
        view: NetworkView,
    ) -> Arc<NetworkView> {
        let view = Arc::new(view);
        if generation == self.generation() {
            let mut views = self.views.write().await;
            views.insert(transport_type, (generation, view.clone()));
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::build;

    #[actix_web::test]
    async fn serves_views_until_invalidated() {
        let cache = NetworkCache::new();
        assert!(cache.get(TransportType::Metro).await.is_none());

        let generation = cache.generation();
        cache.store(TransportType::Metro, generation, build(&[], &[])).await;
        assert!(cache.get(TransportType::Metro).await.is_some());
        assert!(cache.get(TransportType::Tram).await.is_none());

        cache.invalidate();
        assert!(cache.get(TransportType::Metro).await.is_none());
    }

    #[actix_web::test]
    async fn views_built_across_a_write_are_not_kept() {
        let cache = NetworkCache::new();
        let generation = cache.generation();

        // a write lands while the view is being built
        cache.invalidate();
        let view = cache.store(TransportType::Metro, generation, build(&[], &[])).await;

        assert_eq!(view.metadata.total_routes, 0);
        assert!(cache.get(TransportType::Metro).await.is_none());
    }
}
