use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Limits;
use crate::services::{compute::ComputeClient, detector::DetectorClient, storage::ObjectStore};

/// Shared application state passed to route handlers, the worker runtime,
/// and the reconciler.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub storage: Arc<ObjectStore>,
    pub compute: Arc<ComputeClient>,
    pub detector: Arc<DetectorClient>,
    pub limits: Limits,
}

impl AppState {
    pub fn new(
        db: PgPool,
        storage: ObjectStore,
        compute: ComputeClient,
        detector: DetectorClient,
        limits: Limits,
    ) -> Self {
        Self {
            db,
            storage: Arc::new(storage),
            compute: Arc::new(compute),
            detector: Arc::new(detector),
            limits,
        }
    }
}
