//! Scene file format definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tessera_core::{ContentHash, MeshBinding, SessionRecord};

/// Root structure of a scene TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    /// Selected object names, in selection order
    #[serde(default)]
    pub selection: Vec<String>,
    pub scene: SceneMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionRecord>,
    #[serde(default)]
    pub objects: BTreeMap<String, ObjectDef>,
}

/// Scene metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// One object in the scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshDef>,
    /// Remote mesh this object was uploaded as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<MeshBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<MaterialDef>,
}

/// Polygon mesh in object space. Faces index into `positions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshDef {
    pub positions: Vec<[f32; 3]>,
    pub faces: Vec<Vec<u32>>,
}

/// A shader-capable material: image nodes and the input slots they feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDef {
    pub name: String,
    /// Image texture nodes, keyed by node name
    #[serde(default)]
    pub nodes: BTreeMap<String, ImageNode>,
    /// Shader input slot to the node wired into it
    #[serde(default)]
    pub links: BTreeMap<String, String>,
}

/// An image texture node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageNode {
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub color_space: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<ContentHash>,
}

impl ObjectDef {
    pub fn with_mesh(mut self, mesh: MeshDef) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_remote(mut self, binding: MeshBinding) -> Self {
        self.remote = Some(binding);
        self
    }
}

impl SceneFile {
    /// Create a new scene file
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            selection: Vec::new(),
            scene: SceneMetadata {
                name: name.into(),
                version: default_version(),
                description: None,
            },
            session: None,
            objects: BTreeMap::new(),
        }
    }

    /// Add an object to the scene
    pub fn add_object(&mut self, name: impl Into<String>, object: ObjectDef) {
        self.objects.insert(name.into(), object);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_file_serialization() {
        let mut scene = SceneFile::new("Test Scene");
        scene.add_object(
            "crate",
            ObjectDef::default()
                .with_mesh(MeshDef {
                    positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                    faces: vec![vec![0, 1, 2]],
                })
                .with_remote(MeshBinding::new("m-1", "Crate")),
        );
        scene.selection.push("crate".to_string());

        let toml_str = toml::to_string_pretty(&scene).unwrap();
        assert!(toml_str.contains("Test Scene"));
        assert!(toml_str.contains("[objects.crate.remote]"));
        assert!(!toml_str.contains("session"));
    }

    #[test]
    fn test_scene_file_deserialization() {
        let toml_str = r#"
selection = ["crate"]

[scene]
name = "Test Scene"

[session]
last_seed = 77
job_id = ""

[objects.crate.mesh]
positions = [[0, 0, 0], [1, 0, 0], [0, 1, 0]]
faces = [[0, 1, 2]]

[objects.crate.remote]
id = "m-1"
name = "Crate"

[objects.floor]
"#;

        let scene: SceneFile = toml::from_str(toml_str).unwrap();
        assert_eq!(scene.scene.name, "Test Scene");
        assert_eq!(scene.scene.version, "1.0");
        assert_eq!(scene.selection, vec!["crate"]);
        assert_eq!(scene.session.unwrap().last_seed, 77);
        assert_eq!(scene.objects.len(), 2);
        assert_eq!(
            scene.objects["crate"].remote,
            Some(MeshBinding::new("m-1", "Crate"))
        );
        assert!(scene.objects["floor"].mesh.is_none());
    }
}
