//! Export the selection and upload it as a remote mesh

use super::{FlowContext, RunLease};
use crate::service::UploadTarget;
use crate::scheduler::TaskContext;
use crate::selection;
use crate::workspace;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::sync::Arc;
use tessera_core::{MeshBinding, ObjectId, Result, TesseraError};

const STORAGE_SUCCESS: u16 = 204;

pub(super) async fn run(
    ctx: TaskContext,
    flow: FlowContext,
    lease: RunLease,
    name: String,
    targets: Vec<ObjectId>,
) -> Result<()> {
    let epoch = lease.epoch();

    match upload_selection(&ctx, &flow, &name, &targets).await {
        Ok(target) => {
            if !flow.session.borrow().is_current(epoch) {
                return Err(TesseraError::Cancelled);
            }
            bind_uploaded(&flow, &targets, MeshBinding::new(target.mesh_id.clone(), name.as_str()))?;
            tracing::info!(mesh = %target.mesh_id, name = %name, "Mesh uploaded");
            flow.session
                .borrow_mut()
                .finish_upload(epoch, "Upload complete!");
        }
        Err(TesseraError::Cancelled) => return Err(TesseraError::Cancelled),
        Err(e) => {
            tracing::error!(name = %name, error = %e, "Mesh upload failed");
            flow.session
                .borrow_mut()
                .finish_upload(epoch, &format!("Upload failed: {}", e));
        }
    }

    lease.settle();
    Ok(())
}

async fn upload_selection(
    ctx: &TaskContext,
    flow: &FlowContext,
    name: &str,
    targets: &[ObjectId],
) -> Result<UploadTarget> {
    let service = Arc::clone(&flow.service);
    let asset_name = name.to_string();
    let target = ctx
        .blocking(move || service.request_upload(&asset_name, "obj"))
        .await?;

    let snapshot = flow.host.borrow().mesh_snapshot(targets)?;
    if snapshot.is_empty() {
        return Err(TesseraError::ExportError(
            "selection has no mesh geometry".to_string(),
        ));
    }

    let work_dir = flow.work_dir();
    let export_path = work_dir.join(&flow.settings.export_file);
    let path = export_path.clone();
    ctx.blocking(move || {
        workspace::prepare_dir(&work_dir)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        snapshot.write_obj(&mut writer)?;
        writer.flush()?;
        Ok(())
    })
    .await?;
    tracing::debug!(path = %export_path.display(), "Exported selection");

    let service = Arc::clone(&flow.service);
    let upload_target = target.clone();
    let code = ctx
        .blocking(move || service.upload_file(&upload_target, &export_path))
        .await?;
    if code != STORAGE_SUCCESS {
        return Err(TesseraError::status(target.url.as_str(), code));
    }
    Ok(target)
}

/// Persist the new mesh id on every uploaded object, then refresh the
/// bound mesh. Skipped when the selection changed during the upload.
fn bind_uploaded(flow: &FlowContext, targets: &[ObjectId], binding: MeshBinding) -> Result<()> {
    let current = crate::selection::selected(&*flow.host.borrow());
    if current != targets {
        tracing::warn!(
            mesh = %binding.id,
            "Selection changed during upload; not binding the new mesh"
        );
        return Ok(());
    }

    {
        let mut host = flow.host.borrow_mut();
        for id in targets {
            host.set_mesh_binding(*id, binding.clone())?;
        }
    }
    let bound = selection::bound_mesh(&*flow.host.borrow());
    flow.session.borrow_mut().set_current_mesh(bound);
    Ok(())
}
