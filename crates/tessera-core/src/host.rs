//! Seams implemented by the host application

use crate::error::Result;
use crate::id::ObjectId;
use crate::mesh::MeshSnapshot;
use crate::types::{MeshBinding, TextureMaps};
use std::path::PathBuf;

/// Read/write access to the host's scene.
///
/// Every call happens on the host thread; implementations never need to
/// be `Send`.
pub trait SceneHost {
    /// Currently selected objects, in selection order
    fn selection(&self) -> Vec<ObjectId>;

    /// Every object in the scene
    fn objects(&self) -> Vec<ObjectId>;

    /// Display name of an object
    fn object_name(&self, id: ObjectId) -> Option<String>;

    /// Remote mesh metadata stored on an object
    fn mesh_binding(&self, id: ObjectId) -> Option<MeshBinding>;

    /// Persist remote mesh metadata on an object
    fn set_mesh_binding(&mut self, id: ObjectId, binding: MeshBinding) -> Result<()>;

    /// Capture the geometry of the given objects for export
    fn mesh_snapshot(&self, objects: &[ObjectId]) -> Result<MeshSnapshot>;

    /// Path of the saved project file, `None` while unsaved
    fn project_path(&self) -> Option<PathBuf>;
}

/// Wires a texture result set into an object's material.
///
/// Contract: ensure a material exists, then for every populated map kind
/// load the image and connect it to the matching input slot. Absent kinds
/// must not be applied.
pub trait TextureBinder {
    fn apply(&mut self, object: ObjectId, maps: &TextureMaps) -> Result<()>;
}
