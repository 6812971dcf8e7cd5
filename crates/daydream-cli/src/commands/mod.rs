pub mod chat;
pub mod config;
pub mod history;
pub mod identity;

use anyhow::{Context as _, Result};
use daydream_application::SessionFactory;
use daydream_core::ClientConfig;
use daydream_infrastructure::{ConfigService, DaydreamPaths, Identity, IdentityService};

/// Shared state for every subcommand.
///
/// Configuration and identity are resolved lazily so that `config init` and
/// `login` still work when the existing config file is broken.
pub struct Context {
    config_service: ConfigService,
    identities: IdentityService,
    user_override: Option<String>,
    api_url_override: Option<String>,
}

impl Context {
    pub fn new(user_override: Option<String>, api_url_override: Option<String>) -> Result<Self> {
        let paths =
            DaydreamPaths::from_platform().context("Could not locate a configuration directory")?;

        Ok(Self {
            config_service: ConfigService::new(paths.clone()),
            identities: IdentityService::new(paths),
            user_override,
            api_url_override,
        })
    }

    pub fn paths(&self) -> &DaydreamPaths {
        self.config_service.paths()
    }

    pub fn config_service(&self) -> &ConfigService {
        &self.config_service
    }

    pub fn identities(&self) -> &IdentityService {
        &self.identities
    }

    /// File and environment configuration with command-line overrides applied.
    pub fn config(&self) -> Result<ClientConfig> {
        let mut config = self.config_service.get_config().with_context(|| {
            format!(
                "Failed to load {}",
                self.paths().config_file().display()
            )
        })?;
        if let Some(api_url) = &self.api_url_override {
            config.api_url = api_url.clone();
        }
        Ok(config)
    }

    pub fn identity(&self) -> Identity {
        self.identities.resolve(self.user_override.as_deref())
    }

    pub fn factory(&self, config: ClientConfig) -> Result<SessionFactory> {
        SessionFactory::new(config, self.paths().clone()).context("Failed to set up the HTTP client")
    }
}
