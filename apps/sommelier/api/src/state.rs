//! Application state management

use domain_wines::{GcpAuth, WineService};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    pub auth: GcpAuth,
    pub service: Arc<WineService>,
}
