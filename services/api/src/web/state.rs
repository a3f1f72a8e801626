//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every request handler.

use crate::config::Config;
use codoc_core::ports::{DatabaseService, NotificationService};
use codoc_core::{AccessLedger, CommentStore, OtpVerifier};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub notifier: Arc<dyn NotificationService>,
    pub config: Arc<Config>,
    pub ledger: AccessLedger,
    pub comments: CommentStore,
    pub codes: OtpVerifier,
}

impl AppState {
    /// Wires the core services on top of the given adapters.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        notifier: Arc<dyn NotificationService>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            ledger: AccessLedger::new(db.clone(), notifier.clone(), config.public_base_url.clone()),
            comments: CommentStore::new(db.clone()),
            codes: OtpVerifier::new(db.clone(), notifier.clone()),
            db,
            notifier,
            config,
        }
    }
}
