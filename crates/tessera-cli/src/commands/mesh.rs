//! Remote mesh commands

use super::host::{Host, HostArgs};
use anyhow::{bail, Context, Result};

pub fn upload(args: &HostArgs, name: &str) -> Result<()> {
    let mut host = Host::open(args)?;
    host.orchestrator.start_upload(name)?;

    let failure = host.run_until_idle(None);
    host.save()?;
    if let Some(message) = failure {
        bail!(message);
    }

    match host.orchestrator.session().state().current_mesh.clone() {
        Some(mesh) => println!("Selection bound to {} ({})", mesh.name, mesh.id),
        None => println!("Upload did not bind the selection"),
    }
    Ok(())
}

pub fn list(args: &HostArgs) -> Result<()> {
    let mut host = refresh(args)?;
    host.save()?;

    let session = host.orchestrator.session();
    let state = session.state();
    if state.user_meshes.is_empty() {
        println!("No uploaded meshes");
        return Ok(());
    }
    println!("Uploaded meshes:");
    for mesh in &state.user_meshes {
        let marker = match &state.current_mesh {
            Some(current) if current.id == mesh.id => "*",
            _ => " ",
        };
        println!("{} {:<40} {}", marker, mesh.id, mesh.name);
    }
    Ok(())
}

pub fn bind(args: &HostArgs, mesh_id: &str) -> Result<()> {
    let mut host = refresh(args)?;
    let binding = host
        .orchestrator
        .bind_existing_mesh(mesh_id)
        .with_context(|| format!("Failed to bind mesh '{}'", mesh_id))?;
    host.save()?;

    println!(
        "Bound {} object(s) to {} ({})",
        host.orchestrator.selected_objects().len(),
        binding.name,
        binding.id
    );
    Ok(())
}

/// Open the scene and fetch the current mesh listing
fn refresh(args: &HostArgs) -> Result<Host> {
    let mut host = Host::open(args)?;
    host.orchestrator.start_query()?;
    if let Some(message) = host.run_until_idle(None) {
        bail!(message);
    }
    Ok(host)
}
