//! Wiring texture result sets into material graphs

use crate::format::{ImageNode, MaterialDef};
use tessera_core::{MapKind, Result, TesseraError, TextureEntry, TextureMaps};

/// Image node that carries a map kind
pub fn node_name(kind: MapKind) -> &'static str {
    match kind {
        MapKind::Albedo => "Albedo",
        MapKind::Normal => "NormalMap",
        MapKind::Roughness => "Roughness",
        MapKind::Displacement => "Displacement",
    }
}

/// Shader input a map kind feeds
pub fn input_slot(kind: MapKind) -> &'static str {
    match kind {
        MapKind::Albedo => "Base Color",
        MapKind::Normal => "Normal",
        MapKind::Roughness => "Roughness",
        MapKind::Displacement => "Displacement",
    }
}

/// Only albedo carries color; the other maps are data
pub fn color_space(kind: MapKind) -> &'static str {
    match kind {
        MapKind::Albedo => "sRGB",
        _ => "Non-Color",
    }
}

impl MaterialDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Default::default(),
            links: Default::default(),
        }
    }

    /// Load `entry` into the kind's node (creating it on first use) and
    /// link the node to the kind's input slot
    pub fn bind(&mut self, kind: MapKind, entry: &TextureEntry) -> Result<()> {
        let (width, height) = image::image_dimensions(&entry.path).map_err(|e| {
            TesseraError::BindingError(format!(
                "cannot load {} map {}: {}",
                kind,
                entry.path.display(),
                e
            ))
        })?;

        let node = ImageNode {
            image: entry.path.to_string_lossy().into_owned(),
            width,
            height,
            color_space: color_space(kind).to_string(),
            content_hash: entry.content_hash,
        };
        match self.nodes.get_mut(node_name(kind)) {
            Some(existing) => *existing = node,
            None => {
                self.nodes.insert(node_name(kind).to_string(), node);
            }
        }
        self.links
            .insert(input_slot(kind).to_string(), node_name(kind).to_string());
        Ok(())
    }

    /// Disconnect the kind's slot and remove its node. Returns false if
    /// nothing was wired.
    pub fn unbind(&mut self, kind: MapKind) -> bool {
        let linked = self.links.remove(input_slot(kind)).is_some();
        let had_node = self.nodes.remove(node_name(kind)).is_some();
        linked || had_node
    }

    /// Node wired into a slot
    pub fn linked(&self, slot: &str) -> Option<&ImageNode> {
        self.links.get(slot).and_then(|node| self.nodes.get(node))
    }
}

/// Apply a result set: populated kinds are bound, absent kinds are
/// disconnected. Every kind is attempted; the first failure is returned.
pub fn apply_maps(material: &mut MaterialDef, maps: &TextureMaps) -> Result<()> {
    let mut first_error = None;
    for kind in MapKind::ALL {
        match maps.get(kind) {
            Some(entry) => {
                if let Err(e) = material.bind(kind, entry) {
                    tracing::warn!(material = %material.name, kind = %kind, error = %e, "Map not bound");
                    material.unbind(kind);
                    first_error.get_or_insert(e);
                }
            }
            None => {
                if material.unbind(kind) {
                    tracing::debug!(material = %material.name, kind = %kind, "Disconnected stale map");
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
