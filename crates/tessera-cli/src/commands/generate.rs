//! Texture generation commands

use super::host::{Host, HostArgs};
use anyhow::{bail, Result};
use clap::Args;
use std::time::Duration;
use tessera_core::MapKind;
use tessera_texgen::{FacingDirection, GenerationParams, ModelVersion, PreviewDirection};

#[derive(Args, Debug, Clone)]
pub struct GenerationArgs {
    /// Texture description
    #[arg(long, short)]
    pub prompt: String,

    /// What the texture should avoid
    #[arg(long, default_value = "")]
    pub negative: String,

    /// Random seed; 0 lets the service choose
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Direction the model faces (-x, -y, x, y)
    #[arg(long, default_value = "-y", allow_hyphen_values = true)]
    pub facing: FacingDirection,

    /// Model version (v1_5, v2)
    #[arg(long, default_value = "v2")]
    pub model: ModelVersion,

    /// Stop listening for the job after this many seconds
    #[arg(long, value_parser = parse_seconds)]
    pub stop_after: Option<Duration>,
}

/// Non-negative, finite seconds
pub fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    if secs.is_nan() || secs < 0.0 {
        return Err(format!("'{}' must be zero or more seconds", value));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("'{}': {}", value, e))
}

impl GenerationArgs {
    fn params(&self) -> GenerationParams {
        GenerationParams {
            prompt: self.prompt.clone(),
            negative_prompt: self.negative.clone(),
            seed: self.seed,
            facing: self.facing,
            model: self.model,
        }
    }
}

pub fn run(
    args: &HostArgs,
    generation: &GenerationArgs,
    preview: Option<PreviewDirection>,
) -> Result<()> {
    let mut host = Host::open(args)?;

    match preview {
        Some(direction) => {
            println!("Requesting {:?} preview: \"{}\"", direction, generation.prompt);
            host.orchestrator.start_preview(generation.params(), direction)?;
        }
        None => {
            println!("Texturizing: \"{}\"", generation.prompt);
            host.orchestrator.start_job(generation.params())?;
        }
    }

    let failure = host.run_until_idle(generation.stop_after);
    host.save()?;

    if let Some(message) = failure {
        bail!(message);
    }

    let state = host.orchestrator.session().state().clone();
    if state.has_returned && !state.job_id.is_empty() {
        println!("Job {} complete (seed {})", state.job_id, state.last_seed);
        print_materials(&host);
    } else if !state.has_returned {
        println!("Stopped; the job keeps running on the service");
    } else {
        println!("Job was not accepted by the service");
    }
    Ok(())
}

fn print_materials(host: &Host) {
    let scene = host.scene.borrow();
    for name in &scene.scene_file().selection {
        let Some(material) = scene.material(name) else {
            continue;
        };
        println!("  {} -> {}", name, material.name);
        for kind in MapKind::ALL {
            if let Some(node) = material.linked(tessera_scene::input_slot(kind)) {
                println!("    {:<12} {} ({}x{})", kind, node.image, node.width, node.height);
            }
        }
    }
}
