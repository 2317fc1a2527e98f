//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::BroadcastNotifier;
use crate::config::Config;
use std::sync::Arc;
use textbook_core::ProjectStore;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ProjectStore>,
    /// The same notifier the store raises notices on; WebSocket clients subscribe to it.
    pub notifier: BroadcastNotifier,
    pub config: Arc<Config>,
}
