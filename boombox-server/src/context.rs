use std::sync::Arc;

use axum::extract::FromRef;
use boombox_collab::{Collab, PgDatabase, SpotifyCatalog};

/// The concrete collab type this server fronts
pub type BoomboxCollab = Collab<SpotifyCatalog, PgDatabase>;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<BoomboxCollab>,
}
