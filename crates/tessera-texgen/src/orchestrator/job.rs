//! Submit, poll, download and apply one texture job

use super::{FlowContext, RunLease};
use crate::materializer;
use crate::params::{GenerationParams, SubmissionPayload};
use crate::scheduler::TaskContext;
use crate::service::{JobStatusReport, RemoteJobStatus};
use crate::session::{JobPhase, JobStatus};
use crate::workspace;
use std::sync::Arc;
use tessera_core::{ObjectId, Result, TesseraError, TextureMaps};

pub(super) async fn run(
    ctx: TaskContext,
    flow: FlowContext,
    lease: RunLease,
    params: GenerationParams,
    payload: SubmissionPayload,
    targets: Vec<ObjectId>,
) -> Result<()> {
    let epoch = lease.epoch();

    let service = Arc::clone(&flow.service);
    let submitted = ctx
        .blocking(move || service.submit_generation(&payload))
        .await;
    let job_id = match submitted {
        Ok(id) if !id.is_empty() => id,
        Ok(_) => {
            tracing::error!("Service accepted the job without an id");
            flow.session.borrow_mut().reject_job(epoch);
            lease.settle();
            return Ok(());
        }
        Err(e) => {
            tracing::error!(error = %e, "Job submission failed");
            flow.session.borrow_mut().reject_job(epoch);
            lease.settle();
            return Ok(());
        }
    };

    if !flow.session.borrow_mut().accept_job(epoch, &job_id) {
        return Err(TesseraError::Cancelled);
    }
    flow.session
        .borrow_mut()
        .set_job_status(epoch, JobStatus::Running);
    tracing::info!(job_id = %job_id, "Job accepted");

    let report = poll_until_complete(&ctx, &flow, epoch, &job_id).await?;
    let seed = report.seed.unwrap_or(params.seed);
    tracing::info!(job_id = %job_id, seed, images = report.images.len(), "Job complete");

    flow.session
        .borrow_mut()
        .advance(epoch, JobPhase::Downloading, "Receiving results");
    let dir = workspace::result_dir(&flow.work_dir(), &params.prompt, seed);
    let maps = materializer::materialize(
        &ctx,
        Arc::clone(&flow.service),
        &report.images,
        &dir,
        |path| tracing::debug!(file = %path.display(), "Result file ready"),
    )
    .await?;
    ensure_current(&flow, epoch)?;

    flow.session
        .borrow_mut()
        .advance(epoch, JobPhase::Applying, "Applying textures");
    apply_maps(&flow, &targets, &maps);

    flow.session.borrow_mut().complete_job(epoch, seed);
    lease.settle();
    Ok(())
}

/// Query the job once per interval until it completes, fails remotely,
/// runs out of attempts, or the run loses the session.
async fn poll_until_complete(
    ctx: &TaskContext,
    flow: &FlowContext,
    epoch: u64,
    job_id: &str,
) -> Result<JobStatusReport> {
    let mut attempts: u32 = 0;
    let mut failures: u32 = 0;

    loop {
        if let Some(max) = flow.settings.max_poll_attempts {
            if attempts >= max {
                return Err(TesseraError::PollExhausted {
                    job_id: job_id.to_string(),
                    attempts,
                });
            }
        }

        ctx.sleep(flow.settings.poll_interval).await;
        ensure_current(flow, epoch)?;

        attempts += 1;
        let service = Arc::clone(&flow.service);
        let id = job_id.to_string();
        let result = ctx.blocking(move || service.job_status(&id)).await;
        ensure_current(flow, epoch)?;

        match result {
            Ok(report) => {
                failures = 0;
                match &report.status {
                    RemoteJobStatus::Complete => return Ok(report),
                    RemoteJobStatus::Failed => {
                        return Err(TesseraError::RemoteFailure(format!(
                            "job {} reported FAILED",
                            job_id
                        )))
                    }
                    status => {
                        tracing::debug!(job_id, attempt = attempts, status = ?status, "Job not ready");
                    }
                }
            }
            Err(e) if e.is_transient() && failures < flow.settings.transient_error_limit => {
                failures += 1;
                tracing::warn!(job_id, attempt = attempts, failures, error = %e, "Status check failed; retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

fn ensure_current(flow: &FlowContext, epoch: u64) -> Result<()> {
    if flow.session.borrow().is_current(epoch) {
        Ok(())
    } else {
        Err(TesseraError::Cancelled)
    }
}

/// Hand the result set to the binder for every captured object. One
/// object failing does not stop the rest. An empty set leaves existing
/// materials untouched.
fn apply_maps(flow: &FlowContext, targets: &[ObjectId], maps: &TextureMaps) {
    if maps.is_empty() {
        tracing::warn!("No texture maps received; keeping current materials");
        return;
    }
    let mut binder = flow.binder.borrow_mut();
    for object in targets {
        match binder.apply(*object, maps) {
            Ok(()) => tracing::debug!(object = %object, maps = maps.len(), "Textures applied"),
            Err(e) => tracing::error!(object = %object, error = %e, "Failed to apply textures"),
        }
    }
}
