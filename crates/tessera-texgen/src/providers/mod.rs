//! Service registry
//!
//! Maps provider names to concrete `TextureService` implementations.

pub mod leonardo;
pub mod mock;

use crate::config::TesseraConfig;
use crate::service::TextureService;
use std::sync::Arc;
use tessera_core::{Result, TesseraError};

/// Create a service by name with configuration
pub fn create_service(name: &str, config: &TesseraConfig) -> Result<Arc<dyn TextureService>> {
    match name {
        "leonardo" => Ok(Arc::new(leonardo::LeonardoClient::from_config(config))),
        "mock" => Ok(Arc::new(mock::MockService::demo())),
        _ => Err(TesseraError::ConfigError(format!(
            "Unknown provider '{}'. Available: leonardo, mock",
            name
        ))),
    }
}

/// List all available provider names
pub fn available_providers() -> Vec<&'static str> {
    vec!["leonardo", "mock"]
}
