use tracing::{debug, error, info};

use crate::app_state::AppState;
use crate::db::queries;

pub const LEASE_EXPIRED_DIAGNOSTIC: &str = "lease expired, worker presumed dead";

/// One sweep over the record store: force every job whose lease lapsed in
/// {provisioning, processing} into `failed` and terminate its orphaned
/// instance. Returns how many jobs were reclaimed.
///
/// The failure write re-checks the lease at write time, so a worker whose
/// heartbeat lands between the scan and the write keeps its job; if it
/// heartbeats after losing, its own conditional writes will come back
/// empty and it stops on its own.
pub async fn sweep(state: &AppState) -> Result<u64, sqlx::Error> {
    let expired = queries::expired_leases(&state.db).await?;
    let mut reclaimed = 0;

    for (job_id, handle) in expired {
        if !queries::reclaim_expired(&state.db, job_id, LEASE_EXPIRED_DIAGNOSTIC).await? {
            debug!(job_id = %job_id, "Lease refreshed during sweep, leaving job alone");
            continue;
        }

        info!(job_id = %job_id, "Reclaimed job with expired lease");
        metrics::counter!("face_jobs_reclaimed_total").increment(1);
        metrics::counter!("face_jobs_failed_total").increment(1);
        reclaimed += 1;

        let Some(handle) = handle else { continue };

        if let Ok(instance) = state.compute.describe(&handle).await {
            debug!(handle = %handle, state = %instance.state, "Orphaned instance before termination");
        }

        if let Err(e) = state.compute.terminate(&handle).await {
            error!(
                job_id = %job_id,
                handle = %handle,
                error = %e,
                "Failed to terminate orphaned instance"
            );
        }
    }

    Ok(reclaimed)
}
