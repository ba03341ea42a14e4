//! Exportable mesh geometry and the Wavefront OBJ writer used for uploads

use crate::error::{Result, TesseraError};
use std::io::Write;

/// Geometry of one scene object, in world space
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshPart {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    /// Polygons as zero-based indices into `positions`
    pub faces: Vec<Vec<u32>>,
}

/// Geometry of a whole selection, captured on the host thread so it can be
/// written out on a worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshSnapshot {
    pub parts: Vec<MeshPart>,
}

impl MeshSnapshot {
    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| p.faces.is_empty())
    }

    /// Write all parts as one OBJ file, one `o` group per part.
    pub fn write_obj<W: Write>(&self, mut out: W) -> Result<()> {
        if self.is_empty() {
            return Err(TesseraError::ExportError(
                "selection contains no faces".to_string(),
            ));
        }

        writeln!(out, "# tessera export")?;
        let mut base = 1u32;
        for part in &self.parts {
            writeln!(out, "o {}", part.name)?;
            for [x, y, z] in &part.positions {
                writeln!(out, "v {} {} {}", x, y, z)?;
            }
            for face in &part.faces {
                if face.len() < 3 {
                    return Err(TesseraError::ExportError(format!(
                        "face in '{}' has {} vertices",
                        part.name,
                        face.len()
                    )));
                }
                let mut line = String::from("f");
                for &index in face {
                    if index as usize >= part.positions.len() {
                        return Err(TesseraError::ExportError(format!(
                            "face index {} out of range in '{}'",
                            index, part.name
                        )));
                    }
                    line.push_str(&format!(" {}", base + index));
                }
                writeln!(out, "{}", line)?;
            }
            base += part.positions.len() as u32;
        }
        out.flush()?;
        Ok(())
    }
}
