//! Scene-file host: wires a `MemoryScene` to the orchestrator and drives
//! it from a fixed-rate loop

use anyhow::{Context, Result};
use clap::Args;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tessera_scene::MemoryScene;
use tessera_texgen::clock::SystemClock;
use tessera_texgen::providers::create_service;
use tessera_texgen::worker::WorkerPool;
use tessera_texgen::{
    Orchestrator, OrchestratorSettings, SessionEvent, Session, TaskOutcome, TesseraConfig,
};

const FRAME: Duration = Duration::from_millis(16);
const MOCK_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Arguments shared by every command that opens a scene
#[derive(Args, Debug, Clone)]
pub struct HostArgs {
    /// Path to scene file
    pub scene: String,

    /// Use the offline scripted service instead of the real API
    #[arg(long)]
    pub mock: bool,

    /// Comma-separated object names to select before running
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<String>,
}

pub struct Host {
    pub scene: Rc<RefCell<MemoryScene>>,
    pub orchestrator: Orchestrator,
}

impl Host {
    pub fn open(args: &HostArgs) -> Result<Self> {
        let config = TesseraConfig::load().context("Failed to load config")?;

        let mut scene = MemoryScene::load(&args.scene)
            .with_context(|| format!("Failed to open scene '{}'", args.scene))?;
        if !args.select.is_empty() {
            scene.select_by_names(&args.select)?;
        }
        let session = scene
            .session_record()
            .map(Session::from_record)
            .unwrap_or_default();

        let provider = if args.mock { "mock" } else { "leonardo" };
        let service = create_service(provider, &config)?;
        let mut settings = OrchestratorSettings::from_config(&config);
        if args.mock {
            settings.poll_interval = MOCK_POLL_INTERVAL;
        }

        let scene = Rc::new(RefCell::new(scene));
        let orchestrator = Orchestrator::with_session(
            service,
            scene.clone(),
            scene.clone(),
            WorkerPool::new(config.worker_threads)?,
            Arc::new(SystemClock),
            settings,
            session,
        );

        let mut host = Self {
            scene,
            orchestrator,
        };
        host.orchestrator.on_selection_changed();
        host.orchestrator.drain_events();
        Ok(host)
    }

    /// Tick until no task is pending, printing session events as they
    /// arrive. Returns the first task failure, if any.
    pub fn run_until_idle(&mut self, stop_after: Option<Duration>) -> Option<String> {
        let started = Instant::now();
        let mut stop_sent = false;
        let mut failure = None;

        while !self.orchestrator.is_idle() {
            for outcome in self.orchestrator.tick() {
                if let TaskOutcome::Failed { name, error, .. } = outcome {
                    failure.get_or_insert_with(|| format!("{} failed: {}", name, error));
                }
            }
            self.print_events();

            if let Some(limit) = stop_after {
                if !stop_sent && started.elapsed() >= limit {
                    println!("Stopping after {:.1}s", limit.as_secs_f64());
                    self.orchestrator.stop_job();
                    stop_sent = true;
                }
            }
            std::thread::sleep(FRAME);
        }
        self.print_events();
        failure
    }

    /// Persist the session and scene changes
    pub fn save(&self) -> Result<()> {
        let record = self.orchestrator.session().to_record();
        let mut scene = self.scene.borrow_mut();
        scene.set_session_record(record);
        scene.save().context("Failed to save scene")?;
        Ok(())
    }

    fn print_events(&mut self) {
        for event in self.orchestrator.drain_events() {
            match event {
                SessionEvent::StatusChanged(label) if !label.is_empty() => {
                    println!("  {}", label)
                }
                SessionEvent::JobIdChanged(id) if !id.is_empty() => {
                    println!("  Submitted job: {}", id)
                }
                SessionEvent::Returned { seed: Some(seed) } => {
                    println!("  Results applied (seed {})", seed)
                }
                SessionEvent::CurrentMeshChanged(Some(mesh)) => {
                    println!("  Selection bound to {} ({})", mesh.name, mesh.id)
                }
                SessionEvent::AuthRequired => {
                    println!("  API key required: set TESSERA_API_KEY or add it to .tessera/config.toml")
                }
                other => tracing::debug!(event = ?other, "Session event"),
            }
        }
    }
}
