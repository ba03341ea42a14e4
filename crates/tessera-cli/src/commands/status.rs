//! Session status command

use super::host::{Host, HostArgs};
use anyhow::Result;
use tessera_core::MapKind;
use tessera_scene::input_slot;

pub fn run(args: &HostArgs) -> Result<()> {
    let host = Host::open(args)?;
    let session = host.orchestrator.session();
    let state = session.state();
    let scene = host.scene.borrow();

    println!("Scene: {}", scene.scene_file().scene.name);
    println!();
    println!("Session:");
    println!("  running:      {}", state.is_running);
    println!("  returned:     {}", state.has_returned);
    println!(
        "  job:          {}",
        if state.job_id.is_empty() { "-" } else { state.job_id.as_str() }
    );
    println!("  last seed:    {}", state.last_seed);
    if !state.status_label.is_empty() {
        println!("  status:       {}", state.status_label);
    }

    println!();
    match &state.current_mesh {
        Some(mesh) => println!("Selection bound to {} ({})", mesh.name, mesh.id),
        None => println!("Selection has no bound mesh"),
    }

    let selection = &scene.scene_file().selection;
    if selection.is_empty() {
        println!("Nothing selected");
        return Ok(());
    }
    for name in selection {
        println!("  {}", name);
        let Some(material) = scene.material(name) else {
            println!("    (no material)");
            continue;
        };
        for kind in MapKind::ALL {
            match material.linked(input_slot(kind)) {
                Some(node) => println!("    {:<12} {}", kind, node.image),
                None => println!("    {:<12} -", kind),
            }
        }
    }
    Ok(())
}
