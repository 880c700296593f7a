//! Earth Engine credential resolution.
//!
//! Tokens are resolved in order:
//!
//! 1. The access token environment variable (`EARTHENGINE_TOKEN` by default),
//!    read once when the credentials are built
//! 2. `gcloud auth application-default print-access-token`
//! 3. `gcloud auth application-default login`, only when interactive login
//!    is enabled, followed by another attempt at step 2
//!
//! When every allowed step fails the error carries the commands a user can
//! run to fix it.

use std::env;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::config::EarthEngineConfig;
use crate::provider::ProviderError;

/// Source of Earth Engine access tokens.
pub trait CredentialSource: Send + Sync {
    /// Returns a bearer token or an error describing how to obtain one.
    fn access_token(&self) -> Result<String, ProviderError>;

    /// Whether a token can be obtained without user interaction.
    fn probe(&self) -> bool {
        self.access_token().is_ok()
    }
}

/// Fixed token, for callers that manage authentication themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// A source that never has a token.
    pub fn none() -> Self {
        Self::default()
    }
}

impl CredentialSource for StaticCredentials {
    fn access_token(&self) -> Result<String, ProviderError> {
        self.token
            .clone()
            .ok_or_else(|| ProviderError::Auth("no Earth Engine token supplied".to_string()))
    }
}

/// Environment variable and gcloud based credentials.
#[derive(Debug, Clone)]
pub struct GcloudCredentials {
    env_token: Option<String>,
    token_env: String,
    gcloud_bin: String,
    interactive: bool,
}

impl GcloudCredentials {
    /// Builds credentials around an already read `token_env` value.
    ///
    /// Blank tokens count as unset.
    pub fn new(config: &EarthEngineConfig, env_token: Option<String>) -> Self {
        Self {
            env_token: env_token
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            token_env: config.token_env.clone(),
            gcloud_bin: config.gcloud_bin.clone(),
            interactive: config.interactive,
        }
    }

    /// Reads `token_env` from the process environment once, here.
    pub fn from_config(config: &EarthEngineConfig) -> Self {
        Self::new(config, env::var(&config.token_env).ok())
    }

    fn print_access_token(&self) -> Option<String> {
        let output = Command::new(&self.gcloud_bin)
            .args(["auth", "application-default", "print-access-token"])
            .stdin(Stdio::null())
            .output();
        match output {
            Ok(out) if out.status.success() => {
                let token = String::from_utf8_lossy(&out.stdout).trim().to_string();
                (!token.is_empty()).then_some(token)
            }
            Ok(out) => {
                debug!(
                    status = %out.status,
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "gcloud could not print an access token"
                );
                None
            }
            Err(e) => {
                debug!(error = %e, bin = %self.gcloud_bin, "gcloud not runnable");
                None
            }
        }
    }

    fn login(&self) -> bool {
        info!("Starting interactive gcloud login");
        match Command::new(&self.gcloud_bin)
            .args(["auth", "application-default", "login"])
            .status()
        {
            Ok(status) => status.success(),
            Err(e) => {
                warn!(error = %e, bin = %self.gcloud_bin, "Interactive login failed to start");
                false
            }
        }
    }

    fn guidance(&self) -> String {
        format!(
            "Earth Engine credentials not found. Set {} to an access token, or run \
             `{} auth application-default login` and enable interactive login",
            self.token_env, self.gcloud_bin
        )
    }
}

impl CredentialSource for GcloudCredentials {
    fn access_token(&self) -> Result<String, ProviderError> {
        if let Some(token) = &self.env_token {
            debug!(var = %self.token_env, "Using Earth Engine token from environment");
            return Ok(token.clone());
        }
        if let Some(token) = self.print_access_token() {
            return Ok(token);
        }
        if self.interactive && self.login() {
            if let Some(token) = self.print_access_token() {
                return Ok(token);
            }
        }
        Err(ProviderError::Unavailable(self.guidance()))
    }

    fn probe(&self) -> bool {
        self.env_token.is_some() || self.print_access_token().is_some()
    }
}
