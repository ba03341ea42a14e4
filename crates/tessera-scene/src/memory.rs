//! In-memory scene host backed by a scene file

use crate::format::{MaterialDef, SceneFile};
use crate::{loader, material, saver};
use std::path::{Path, PathBuf};
use tessera_core::{
    MeshBinding, MeshPart, MeshSnapshot, ObjectId, Result, SceneHost, SessionRecord, TesseraError,
    TextureBinder, TextureMaps,
};

/// A loaded scene. Object handles are assigned in name order when the
/// scene is opened and stay valid until it is dropped.
pub struct MemoryScene {
    file: SceneFile,
    names: Vec<String>,
    path: Option<PathBuf>,
}

impl MemoryScene {
    /// Wrap a scene that has not been saved yet
    pub fn new(file: SceneFile) -> Self {
        Self::from_file(file, None)
    }

    pub fn from_file(file: SceneFile, path: Option<PathBuf>) -> Self {
        let names = file.objects.keys().cloned().collect();
        Self { file, names, path }
    }

    /// Open a scene file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = loader::load_scene(&path)?;
        Ok(Self::from_file(file, Some(path.as_ref().to_path_buf())))
    }

    /// Write back to the file the scene was opened from
    pub fn save(&self) -> Result<()> {
        let path = self.path.as_ref().ok_or_else(|| {
            TesseraError::SceneError("scene has never been saved".to_string())
        })?;
        saver::save_scene(path, &self.file)
    }

    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        saver::save_scene(&path, &self.file)?;
        self.path = Some(path.as_ref().to_path_buf());
        Ok(())
    }

    pub fn scene_file(&self) -> &SceneFile {
        &self.file
    }

    pub fn id_of(&self, name: &str) -> Option<ObjectId> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|index| ObjectId::from_raw(index as u64 + 1))
    }

    pub fn name_of(&self, id: ObjectId) -> Option<&str> {
        let index = usize::try_from(id.raw()).ok()?.checked_sub(1)?;
        self.names.get(index).map(String::as_str)
    }

    /// Replace the selection. Every name must exist; repeats are dropped
    /// and first-occurrence order kept.
    pub fn select_by_names<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let mut selection: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if !self.file.objects.contains_key(name) {
                return Err(TesseraError::ObjectNotFound(name.to_string()));
            }
            if !selection.iter().any(|n| n == name) {
                selection.push(name.to_string());
            }
        }
        self.file.selection = selection;
        Ok(())
    }

    pub fn session_record(&self) -> Option<&SessionRecord> {
        self.file.session.as_ref()
    }

    pub fn set_session_record(&mut self, record: SessionRecord) {
        self.file.session = Some(record);
    }

    pub fn material(&self, object: &str) -> Option<&MaterialDef> {
        self.file.objects.get(object)?.material.as_ref()
    }

    fn resolve(&self, id: ObjectId) -> Result<&str> {
        self.name_of(id)
            .ok_or_else(|| TesseraError::ObjectNotFound(id.to_string()))
    }
}

impl SceneHost for MemoryScene {
    fn selection(&self) -> Vec<ObjectId> {
        self.file
            .selection
            .iter()
            .filter_map(|name| self.id_of(name))
            .collect()
    }

    fn objects(&self) -> Vec<ObjectId> {
        (1..=self.names.len() as u64).map(ObjectId::from_raw).collect()
    }

    fn object_name(&self, id: ObjectId) -> Option<String> {
        self.name_of(id).map(str::to_string)
    }

    fn mesh_binding(&self, id: ObjectId) -> Option<MeshBinding> {
        let name = self.name_of(id)?;
        self.file.objects.get(name)?.remote.clone()
    }

    fn set_mesh_binding(&mut self, id: ObjectId, binding: MeshBinding) -> Result<()> {
        let name = self.resolve(id)?.to_string();
        let object = self
            .file
            .objects
            .get_mut(&name)
            .ok_or(TesseraError::ObjectNotFound(name.clone()))?;
        object.remote = Some(binding);
        Ok(())
    }

    fn mesh_snapshot(&self, objects: &[ObjectId]) -> Result<MeshSnapshot> {
        let mut parts = Vec::new();
        for id in objects {
            let name = self.resolve(*id)?;
            let Some(mesh) = self.file.objects.get(name).and_then(|o| o.mesh.as_ref()) else {
                tracing::warn!(object = %name, "Object has no mesh data; not exported");
                continue;
            };
            parts.push(MeshPart {
                name: name.to_string(),
                positions: mesh.positions.clone(),
                faces: mesh.faces.clone(),
            });
        }
        Ok(MeshSnapshot { parts })
    }

    fn project_path(&self) -> Option<PathBuf> {
        self.path.clone()
    }
}

impl TextureBinder for MemoryScene {
    fn apply(&mut self, object: ObjectId, maps: &TextureMaps) -> Result<()> {
        let name = self.resolve(object)?.to_string();
        let def = self
            .file
            .objects
            .get_mut(&name)
            .ok_or(TesseraError::ObjectNotFound(name.clone()))?;
        let material = def
            .material
            .get_or_insert_with(|| MaterialDef::new(format!("{}_material", name)));
        material::apply_maps(material, maps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{MeshDef, ObjectDef};
    use tessera_core::{MapKind, TextureEntry};

    fn triangle() -> MeshDef {
        MeshDef {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            faces: vec![vec![0, 1, 2]],
        }
    }

    fn scene() -> MemoryScene {
        let mut file = SceneFile::new("Yard");
        file.add_object("box", ObjectDef::default().with_mesh(triangle()));
        file.add_object(
            "lid",
            ObjectDef::default()
                .with_mesh(triangle())
                .with_remote(MeshBinding::new("m-1", "Crate")),
        );
        file.add_object("marker", ObjectDef::default());
        MemoryScene::new(file)
    }

    #[test]
    fn test_ids_follow_name_order() {
        let scene = scene();
        assert_eq!(scene.id_of("box"), Some(ObjectId::from_raw(1)));
        assert_eq!(scene.id_of("marker"), Some(ObjectId::from_raw(3)));
        assert_eq!(scene.name_of(ObjectId::from_raw(2)), Some("lid"));
        assert_eq!(scene.name_of(ObjectId::from_raw(0)), None);
        assert_eq!(scene.objects().len(), 3);
    }

    #[test]
    fn test_selection_keeps_order() {
        let mut scene = scene();
        scene.select_by_names(&["lid", "box"]).unwrap();
        assert_eq!(
            scene.selection(),
            vec![ObjectId::from_raw(2), ObjectId::from_raw(1)]
        );
        scene.select_by_names(&["lid", "box", "lid"]).unwrap();
        assert_eq!(
            scene.selection(),
            vec![ObjectId::from_raw(2), ObjectId::from_raw(1)]
        );
        assert!(matches!(
            scene.select_by_names(&["ghost"]),
            Err(TesseraError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn test_set_binding_and_snapshot() {
        let mut scene = scene();
        let box_id = scene.id_of("box").unwrap();
        scene
            .set_mesh_binding(box_id, MeshBinding::new("m-2", "Box"))
            .unwrap();
        assert_eq!(
            scene.mesh_binding(box_id),
            Some(MeshBinding::new("m-2", "Box"))
        );

        let ids = [box_id, scene.id_of("marker").unwrap()];
        let snapshot = scene.mesh_snapshot(&ids).unwrap();
        assert_eq!(snapshot.parts.len(), 1);
        assert_eq!(snapshot.parts[0].name, "box");
    }

    #[test]
    fn test_apply_creates_material() {
        let dir = std::env::temp_dir().join(format!("tessera_mem_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("x_albedo.jpg");
        image::RgbImage::new(3, 3).save(&path).unwrap();

        let mut maps = TextureMaps::new();
        maps.insert(
            MapKind::Albedo,
            TextureEntry {
                path,
                content_hash: None,
            },
        );

        let mut scene = scene();
        let lid = scene.id_of("lid").unwrap();
        scene.apply(lid, &maps).unwrap();

        let material = scene.material("lid").unwrap();
        assert_eq!(material.name, "lid_material");
        assert!(material.linked("Base Color").is_some());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_requires_path() {
        let scene = scene();
        assert!(scene.project_path().is_none());
        assert!(matches!(scene.save(), Err(TesseraError::SceneError(_))));
    }
}
