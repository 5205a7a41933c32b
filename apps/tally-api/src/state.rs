//! Shared application state.

use tally_db::Database;

/// State handed to every handler. Cheap to clone: the database handle is a
/// pool reference.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState { db }
    }
}
