use crate::auth::AuthProvider;
use crate::database::Repository;
use crate::network::NetworkCache;

use std::sync::Arc;

/// Shared by every actix worker through `web::Data`.
pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub auth: Arc<dyn AuthProvider>,
    pub network_cache: NetworkCache,
}

impl AppState {
    pub fn new(repository: Arc<dyn Repository>, auth: Arc<dyn AuthProvider>) -> AppState {
        AppState {
            repository,
            auth,
            network_cache: NetworkCache::new(),
        }
    }
}
