use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::job::JobStatus;

/// Provision one worker instance for a freshly submitted job.
///
/// Launches first, then claims the record with a CAS on
/// `status = submitted`. If the claim loses (a concurrent Provision already
/// attached a worker), the instance launched here is surplus and gets
/// terminated immediately so only one worker is ever billed per job.
///
/// Launch failures are recorded into the job and not retried: each attempt
/// costs real worker-hours.
pub async fn provision(state: &AppState, job_id: Uuid) -> Result<(), sqlx::Error> {
    let handle = match state.compute.launch(job_id).await {
        Ok(handle) => handle,
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "Worker launch failed");
            metrics::counter!("face_jobs_failed_total").increment(1);
            let diagnostic = format!("provisioning failed: {e}");
            if !queries::fail_job(&state.db, job_id, JobStatus::Submitted, &diagnostic).await? {
                warn!(job_id = %job_id, "Job left submitted state before failure could be recorded");
            }
            return Ok(());
        }
    };

    let claimed = queries::claim_for_provisioning(
        &state.db,
        job_id,
        &handle,
        state.limits.provisioning_timeout_secs,
    )
    .await?;

    if !claimed {
        warn!(
            job_id = %job_id,
            handle = %handle,
            "Lost provisioning claim, terminating surplus instance"
        );
        if let Err(e) = state.compute.terminate(&handle).await {
            error!(job_id = %job_id, handle = %handle, error = %e, "Failed to terminate surplus instance");
        }
        return Ok(());
    }

    info!(job_id = %job_id, handle = %handle, "Worker provisioned");
    Ok(())
}

/// Entry point for the detached provisioning task spawned at intake.
/// Intake returns the job id without waiting on this.
pub async fn provision_detached(state: AppState, job_id: Uuid) {
    if let Err(e) = provision(&state, job_id).await {
        error!(job_id = %job_id, error = %e, "Provisioning aborted on record store error");
    }
}
