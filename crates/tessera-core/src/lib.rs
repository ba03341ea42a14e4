//! Tessera Core - Foundational types for the Tessera texturing client
//!
//! This crate provides the types every other Tessera crate depends on:
//! - `ObjectId` - Handles for scene objects owned by the host application
//! - `MapKind`, `TextureMaps` - Semantic texture channels and result sets
//! - `MeshBinding`, `MeshSnapshot` - Remote mesh metadata and exportable geometry
//! - `SceneHost`, `TextureBinder` - The seams a host application implements
//! - `ContentHash` - SHA-256 hashing of downloaded files
//! - Error types and Result alias

mod error;
mod hash;
mod host;
mod id;
mod mesh;
mod types;

pub use error::{Result, TesseraError};
pub use hash::ContentHash;
pub use host::{SceneHost, TextureBinder};
pub use id::ObjectId;
pub use mesh::{MeshPart, MeshSnapshot};
pub use types::{MapKind, MeshBinding, RemoteMesh, SessionRecord, TextureEntry, TextureMaps};
