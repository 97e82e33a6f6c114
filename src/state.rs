use sqlx::PgPool;
use std::sync::Arc;

use crate::billing::BillingProvider;
use crate::storage::ObjectStorage;

/// Shared handles every handler receives through `State`
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub billing: Arc<dyn BillingProvider>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AppState {
    pub fn new(pool: PgPool, billing: Arc<dyn BillingProvider>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { pool, billing, storage }
    }
}
