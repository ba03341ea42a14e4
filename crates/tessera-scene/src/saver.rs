//! Scene saving to TOML files

use crate::format::SceneFile;
use std::fs;
use std::path::Path;
use tessera_core::Result;

/// Save a scene file to disk
pub fn save_scene<P: AsRef<Path>>(path: P, scene: &SceneFile) -> Result<()> {
    let content = save_scene_string(scene)?;
    fs::write(path, content)?;
    Ok(())
}

/// Save a scene file to a TOML string
pub fn save_scene_string(scene: &SceneFile) -> Result<String> {
    let content = toml::to_string_pretty(scene)?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ImageNode, MaterialDef, MeshDef, ObjectDef};
    use crate::loader::load_scene_string;
    use tessera_core::{ContentHash, MeshBinding, RemoteMesh, SessionRecord};

    #[test]
    fn test_roundtrip_keeps_materials_and_session() {
        let mut scene = SceneFile::new("Roundtrip Test");
        let mut material = MaterialDef::new("crate_material");
        material.nodes.insert(
            "Albedo".to_string(),
            ImageNode {
                image: "/w/stone wall/42/x_albedo.jpg".to_string(),
                width: 1024,
                height: 1024,
                color_space: "sRGB".to_string(),
                content_hash: Some(ContentHash::from_bytes(b"pixels")),
            },
        );
        material
            .links
            .insert("Base Color".to_string(), "Albedo".to_string());

        scene.add_object(
            "crate",
            ObjectDef {
                mesh: Some(MeshDef {
                    positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                    faces: vec![vec![0, 1, 2]],
                }),
                remote: Some(MeshBinding::new("m-1", "Crate")),
                material: Some(material),
            },
        );
        scene.selection.push("crate".to_string());
        scene.session = Some(SessionRecord {
            has_returned: true,
            last_seed: 42,
            user_meshes: vec![RemoteMesh {
                id: "m-1".to_string(),
                name: "Crate".to_string(),
            }],
            ..SessionRecord::default()
        });

        let saved = save_scene_string(&scene).unwrap();
        let reloaded = load_scene_string(&saved).unwrap();
        assert_eq!(reloaded, scene);
    }
}
