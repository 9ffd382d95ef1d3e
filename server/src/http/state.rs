use std::sync::Arc;

use crate::cache::ConfigCache;
use crate::service::{MutationService, PullService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub mutations: MutationService,
    pub pulls: PullService,
    pub cache: Arc<dyn ConfigCache>,
}

impl AppState {
    pub fn new(mutations: MutationService, pulls: PullService, cache: Arc<dyn ConfigCache>) -> Self {
        Self {
            mutations,
            pulls,
            cache,
        }
    }
}
