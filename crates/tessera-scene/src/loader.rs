//! Scene loading from TOML files

use crate::format::SceneFile;
use std::fs;
use std::path::Path;
use tessera_core::{Result, TesseraError};

/// Load a scene from a TOML file
pub fn load_scene<P: AsRef<Path>>(path: P) -> Result<SceneFile> {
    let content = fs::read_to_string(path)?;
    load_scene_string(&content)
}

/// Load a scene from a TOML string
pub fn load_scene_string(content: &str) -> Result<SceneFile> {
    let mut scene_file: SceneFile = toml::from_str(content)?;

    let mut selection: Vec<String> = Vec::with_capacity(scene_file.selection.len());
    for name in scene_file.selection.drain(..) {
        if !scene_file.objects.contains_key(&name) {
            return Err(TesseraError::SceneError(format!(
                "selection refers to unknown object '{}'",
                name
            )));
        }
        if !selection.contains(&name) {
            selection.push(name);
        }
    }
    scene_file.selection = selection;

    Ok(scene_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_scene_string() {
        let toml_str = r#"
selection = ["lid", "box"]

[scene]
name = "Crate"

[objects.box]
[objects.lid]
"#;
        let scene = load_scene_string(toml_str).unwrap();
        assert_eq!(scene.selection, vec!["lid", "box"]);
    }

    #[test]
    fn test_repeated_selection_names_collapse() {
        let toml_str = r#"
selection = ["lid", "box", "lid"]

[scene]
name = "Crate"

[objects.box]
[objects.lid]
"#;
        let scene = load_scene_string(toml_str).unwrap();
        assert_eq!(scene.selection, vec!["lid", "box"]);
    }

    #[test]
    fn test_unknown_selection_is_rejected() {
        let toml_str = r#"
selection = ["ghost"]

[scene]
name = "Crate"
"#;
        assert!(matches!(
            load_scene_string(toml_str),
            Err(TesseraError::SceneError(_))
        ));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        assert!(matches!(
            load_scene_string("[scene\nname ="),
            Err(TesseraError::TomlParseError(_))
        ));
    }
}
