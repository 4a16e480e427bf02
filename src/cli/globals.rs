use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::{
    api::ApiClient,
    config::ClientConfig,
    session::{FileStore, SessionContext},
};

/// Connection settings shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: String,
    pub session_file: PathBuf,
    pub timeout: Duration,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_url: String, session_file: PathBuf, timeout: Duration) -> Self {
        Self {
            api_url,
            session_file,
            timeout,
        }
    }

    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_url.clone()).with_timeout(self.timeout)
    }

    /// Opens the session file and wires a session context over it.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn open_session(&self) -> Result<SessionContext> {
        let store = Arc::new(FileStore::open(&self.session_file));
        let api = ApiClient::new(self.client_config(), store)
            .context("failed to build HTTP client")?;
        Ok(SessionContext::new(api))
    }
}
