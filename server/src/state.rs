use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::vision::build_api_client;

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let http = build_api_client().context("Failed to build vision API client")?;
        Ok(Arc::new(Self { config, http }))
    }
}
