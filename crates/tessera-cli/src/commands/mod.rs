//! CLI command implementations

pub mod generate;
pub mod host;
pub mod mesh;
pub mod status;
