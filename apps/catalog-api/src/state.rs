//! Application state management

use database::postgres::DatabaseConnection;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    /// PostgreSQL pool; `None` when running on the in-memory repositories
    pub db: Option<DatabaseConnection>,
}
