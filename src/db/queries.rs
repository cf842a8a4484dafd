//! Job record store access. Every transition that matters for correctness
//! is a conditional update keyed on the expected prior status, never a
//! blind overwrite: the provisioner, worker, and reconciler all write
//! concurrently and unsupervised relative to one another.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::job::{Job, JobStatus};

const JOB_COLUMNS: &str = "id, status, input_keys, total_count, processed_count, results, \
                           worker_handle, lease_expiry, error, created_at, updated_at";

fn job_from_row(row: &PgRow) -> Result<Job, sqlx::Error> {
    let status_raw: String = row.try_get("status")?;
    let status: JobStatus = status_raw.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: "status".to_string(),
        source: Box::new(e),
    })?;

    let input_keys: serde_json::Value = row.try_get("input_keys")?;
    let input_keys: Vec<String> =
        serde_json::from_value(input_keys).map_err(|e| sqlx::Error::ColumnDecode {
            index: "input_keys".to_string(),
            source: Box::new(e),
        })?;

    Ok(Job {
        id: row.try_get("id")?,
        status,
        input_keys,
        total_count: row.try_get("total_count")?,
        processed_count: row.try_get("processed_count")?,
        results: row.try_get("results")?,
        worker_handle: row.try_get("worker_handle")?,
        lease_expiry: row.try_get("lease_expiry")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert a new job record with `status = submitted` and a lease covering
/// the provisioning window.
pub async fn create_job(
    pool: &PgPool,
    job_id: Uuid,
    input_keys: &[String],
    provisioning_timeout_secs: u64,
) -> Result<Job, sqlx::Error> {
    let keys = serde_json::to_value(input_keys).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    let row = sqlx::query(&format!(
        r#"
        INSERT INTO jobs (id, status, input_keys, total_count, lease_expiry)
        VALUES ($1, 'submitted', $2, $3, now() + make_interval(secs => $4))
        RETURNING {JOB_COLUMNS}
        "#,
    ))
    .bind(job_id)
    .bind(keys)
    .bind(input_keys.len() as i32)
    .bind(provisioning_timeout_secs as f64)
    .fetch_one(pool)
    .await?;

    job_from_row(&row)
}

/// Get a job by ID.
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// List the most recent jobs, newest first.
pub async fn list_recent_jobs(pool: &PgPool, limit: i64) -> Result<Vec<Job>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// CAS `submitted -> provisioning`, writing the worker handle. Guarded on
/// `worker_handle IS NULL` so a retried Provision can never attach a second
/// worker to the same job. Returns whether this caller won the claim.
pub async fn claim_for_provisioning(
    pool: &PgPool,
    job_id: Uuid,
    worker_handle: &str,
    provisioning_timeout_secs: u64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'provisioning',
            worker_handle = $2,
            lease_expiry = now() + make_interval(secs => $3),
            updated_at = now()
        WHERE id = $1 AND status = 'submitted' AND worker_handle IS NULL
        "#,
    )
    .bind(job_id)
    .bind(worker_handle)
    .bind(provisioning_timeout_secs as f64)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// CAS `provisioning -> processing`, starting the worker's lease. A false
/// return means the record was already reclaimed: the worker has lost its
/// lease and must stop without further writes.
pub async fn start_processing(
    pool: &PgPool,
    job_id: Uuid,
    lease_ttl_secs: u64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'processing',
            lease_expiry = now() + make_interval(secs => $2),
            updated_at = now()
        WHERE id = $1 AND status = 'provisioning'
        "#,
    )
    .bind(job_id)
    .bind(lease_ttl_secs as f64)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record one per-image result: bump `processed_count`, merge the result
/// entry, and refresh the lease in a single conditional write (heartbeat by
/// progress). `processed_count` only ever moves forward because the write
/// is an increment guarded on `status = processing`. A false return means
/// the job was reclaimed out from under the worker.
pub async fn record_image_result(
    pool: &PgPool,
    job_id: Uuid,
    input_key: &str,
    result: &serde_json::Value,
    lease_ttl_secs: u64,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        r#"
        UPDATE jobs
        SET processed_count = processed_count + 1,
            results = results || jsonb_build_object($2::text, $3::jsonb),
            lease_expiry = now() + make_interval(secs => $4),
            updated_at = now()
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .bind(input_key)
    .bind(result)
    .bind(lease_ttl_secs as f64)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

/// Terminal CAS `processing -> completed`, releasing the worker handle.
pub async fn complete_job(pool: &PgPool, job_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'completed',
            worker_handle = NULL,
            updated_at = now()
        WHERE id = $1 AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Terminal CAS into `failed` from one expected prior status, recording the
/// diagnostic and releasing the worker handle.
pub async fn fail_job(
    pool: &PgPool,
    job_id: Uuid,
    expected: JobStatus,
    error: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'failed',
            error = $3,
            worker_handle = NULL,
            updated_at = now()
        WHERE id = $1 AND status = $2
        "#,
    )
    .bind(job_id)
    .bind(expected.to_string())
    .bind(error)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Jobs whose lease has lapsed while a worker was supposed to be active.
pub async fn expired_leases(
    pool: &PgPool,
) -> Result<Vec<(Uuid, Option<String>)>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, worker_handle
        FROM jobs
        WHERE status IN ('provisioning', 'processing') AND lease_expiry < now()
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| Ok((row.try_get("id")?, row.try_get("worker_handle")?)))
        .collect()
}

/// Force an expired job into `failed`. The lease expiry is re-checked at
/// write time so a late-but-legitimate heartbeat between the sweep's read
/// and this write wins the race instead of being clobbered.
pub async fn reclaim_expired(
    pool: &PgPool,
    job_id: Uuid,
    error: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'failed',
            error = $2,
            worker_handle = NULL,
            updated_at = now()
        WHERE id = $1
          AND status IN ('provisioning', 'processing')
          AND lease_expiry < now()
        "#,
    )
    .bind(job_id)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
