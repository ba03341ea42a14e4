//! Shared domain types

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A semantic texture channel produced by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapKind {
    Albedo,
    Normal,
    Roughness,
    Displacement,
}

impl MapKind {
    pub const ALL: [MapKind; 4] = [
        MapKind::Albedo,
        MapKind::Normal,
        MapKind::Roughness,
        MapKind::Displacement,
    ];

    /// Filename suffix the service uses for this channel
    pub fn suffix(&self) -> &'static str {
        match self {
            MapKind::Albedo => "albedo.jpg",
            MapKind::Normal => "normal.jpg",
            MapKind::Roughness => "roughness.jpg",
            MapKind::Displacement => "displacement.jpg",
        }
    }

    /// Classify a downloaded file by its name. First matching suffix wins.
    pub fn from_filename(filename: &str) -> Option<MapKind> {
        MapKind::ALL
            .into_iter()
            .find(|kind| filename.contains(kind.suffix()))
    }
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKind::Albedo => write!(f, "albedo"),
            MapKind::Normal => write!(f, "normal"),
            MapKind::Roughness => write!(f, "roughness"),
            MapKind::Displacement => write!(f, "displacement"),
        }
    }
}

/// Remote mesh metadata persisted on a scene object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshBinding {
    pub id: String,
    pub name: String,
}

impl MeshBinding {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A mesh previously uploaded to the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMesh {
    pub id: String,
    pub name: String,
}

impl From<RemoteMesh> for MeshBinding {
    fn from(mesh: RemoteMesh) -> Self {
        MeshBinding::new(mesh.id, mesh.name)
    }
}

/// Session fields the host persists with its project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub has_returned: bool,
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub last_seed: u64,
    #[serde(default)]
    pub status_label: String,
    #[serde(default)]
    pub user_meshes: Vec<RemoteMesh>,
}

/// One downloaded texture file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureEntry {
    pub path: PathBuf,
    pub content_hash: Option<ContentHash>,
}

/// The texture result set of one job: map kind to local file.
///
/// Kinds that are absent must not be applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureMaps {
    entries: BTreeMap<MapKind, TextureEntry>,
}

impl TextureMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: MapKind, entry: TextureEntry) {
        self.entries.insert(kind, entry);
    }

    pub fn get(&self, kind: MapKind) -> Option<&TextureEntry> {
        self.entries.get(&kind)
    }

    pub fn path(&self, kind: MapKind) -> Option<&Path> {
        self.entries.get(&kind).map(|e| e.path.as_path())
    }

    pub fn contains(&self, kind: MapKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Populated kinds in channel order
    pub fn iter(&self) -> impl Iterator<Item = (MapKind, &TextureEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }
}
