//! Tessera Scene - TOML scene documents
//!
//! A minimal reference host for the texturing client: objects with mesh
//! data, remote mesh metadata and material graphs, an ordered selection,
//! and the persisted session fields. `MemoryScene` implements both host
//! seams so the orchestrator can drive it directly.

mod format;
mod loader;
mod material;
mod memory;
mod saver;

pub use format::{ImageNode, MaterialDef, MeshDef, ObjectDef, SceneFile, SceneMetadata};
pub use loader::{load_scene, load_scene_string};
pub use material::{apply_maps, color_space, input_slot, node_name};
pub use memory::MemoryScene;
pub use saver::{save_scene, save_scene_string};
