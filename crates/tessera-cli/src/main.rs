//! Tessera CLI - texture scene objects with a remote generation service

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{generate, host::HostArgs, mesh, status};
use tessera_texgen::PreviewDirection;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Generate and apply AI textures to scene meshes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a full texture set for the selected mesh and apply it
    Texturize {
        #[command(flatten)]
        host: HostArgs,

        #[command(flatten)]
        generation: generate::GenerationArgs,
    },

    /// Generate a single-view preview for the selected mesh
    Preview {
        #[command(flatten)]
        host: HostArgs,

        #[command(flatten)]
        generation: generate::GenerationArgs,

        /// Camera direction (front, back, left, right)
        #[arg(long, default_value = "front")]
        direction: PreviewDirection,
    },

    /// Export the selected objects and upload them as a new remote mesh
    Upload {
        #[command(flatten)]
        host: HostArgs,

        /// Mesh name (defaults to the scene file name)
        #[arg(long, default_value = "")]
        name: String,
    },

    /// List the meshes uploaded to the service
    Meshes {
        #[command(flatten)]
        host: HostArgs,
    },

    /// Bind the selected objects to a previously uploaded mesh
    Bind {
        #[command(flatten)]
        host: HostArgs,

        /// Remote mesh id
        mesh_id: String,
    },

    /// Show session state and the mesh bound to the selection
    Status {
        #[command(flatten)]
        host: HostArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tessera=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Texturize { host, generation } => generate::run(&host, &generation, None),
        Commands::Preview {
            host,
            generation,
            direction,
        } => generate::run(&host, &generation, Some(direction)),
        Commands::Upload { host, name } => mesh::upload(&host, &name),
        Commands::Meshes { host } => mesh::list(&host),
        Commands::Bind { host, mesh_id } => mesh::bind(&host, &mesh_id),
        Commands::Status { host } => status::run(&host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;
    use tessera_texgen::{FacingDirection, ModelVersion};

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_texturize() {
        let cli = Cli::try_parse_from([
            "tessera",
            "texturize",
            "yard.scene.toml",
            "--mock",
            "--select",
            "box,lid",
            "--prompt",
            "mossy stone",
            "--seed",
            "9",
            "--facing",
            "x",
            "--model",
            "v1_5",
            "--stop-after",
            "2.5",
        ])
        .unwrap();

        match cli.command {
            Commands::Texturize { host, generation } => {
                assert!(host.mock);
                assert_eq!(host.select, vec!["box", "lid"]);
                assert_eq!(generation.seed, 9);
                assert_eq!(generation.facing, FacingDirection::PosX);
                assert_eq!(generation.model, ModelVersion::V1_5);
                assert_eq!(generation.stop_after, Some(Duration::from_millis(2500)));
            }
            _ => panic!("expected texturize"),
        }
    }

    #[test]
    fn test_parse_preview_direction() {
        let cli = Cli::try_parse_from([
            "tessera",
            "preview",
            "yard.scene.toml",
            "--prompt",
            "rust",
            "--direction",
            "left",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Preview {
                direction: PreviewDirection::Left,
                ..
            }
        ));
    }

    #[test]
    fn test_stop_after_rejects_unusable_seconds() {
        for value in ["inf", "NaN", "-1", "1e300", "soon"] {
            let result = Cli::try_parse_from([
                "tessera",
                "texturize",
                "yard.scene.toml",
                "--prompt",
                "rust",
                "--stop-after",
                value,
            ]);
            assert!(result.is_err(), "--stop-after {} should be rejected", value);
        }
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(generate::parse_seconds("0"), Ok(Duration::ZERO));
        assert_eq!(generate::parse_seconds("1.5"), Ok(Duration::from_millis(1500)));
        assert!(generate::parse_seconds("inf").is_err());
    }
}
