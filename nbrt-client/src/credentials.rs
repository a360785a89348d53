//! Credential providers.
//!
//! The client never looks credentials up on its own; a provider is handed to
//! [`crate::NotebookClient::new`] and asked for a token exactly once.

use std::fmt;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::CredentialError;

/// Environment variable read by [`EnvToken::default`].
pub const DEFAULT_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// OAuth bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Trims surrounding whitespace; rejects empty tokens.
    pub fn new(token: impl Into<String>) -> Result<Self, CredentialError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(CredentialError::EmptyToken);
        }
        Ok(Self(token))
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Source of bearer tokens.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn access_token(&self) -> Result<AccessToken, CredentialError>;
}

/// A token supplied up front.
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: AccessToken,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Result<Self, CredentialError> {
        Ok(Self {
            token: AccessToken::new(token)?,
        })
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    fn name(&self) -> &str {
        "static"
    }

    async fn access_token(&self) -> Result<AccessToken, CredentialError> {
        Ok(self.token.clone())
    }
}

/// Reads the token from an environment variable at call time.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvToken {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_ENV)
    }
}

#[async_trait]
impl CredentialProvider for EnvToken {
    fn name(&self) -> &str {
        "env"
    }

    async fn access_token(&self) -> Result<AccessToken, CredentialError> {
        let value =
            std::env::var(&self.var).map_err(|_| CredentialError::MissingEnv(self.var.clone()))?;
        AccessToken::new(value)
    }
}

/// Runs `gcloud auth print-access-token`.
#[derive(Debug, Clone)]
pub struct GcloudToken {
    program: String,
}

impl GcloudToken {
    /// Use a specific `gcloud` binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GcloudToken {
    fn default() -> Self {
        Self::with_program("gcloud")
    }
}

#[async_trait]
impl CredentialProvider for GcloudToken {
    fn name(&self) -> &str {
        "gcloud"
    }

    async fn access_token(&self) -> Result<AccessToken, CredentialError> {
        let command = format!("{} auth print-access-token", self.program);
        debug!(command = %command, "Requesting access token");

        let output = Command::new(&self.program)
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|source| CredentialError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CredentialError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        AccessToken::new(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Tries each provider in order and returns the first token obtained.
#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

#[async_trait]
impl CredentialProvider for ProviderChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn access_token(&self) -> Result<AccessToken, CredentialError> {
        for provider in &self.providers {
            match provider.access_token().await {
                Ok(token) => {
                    debug!(provider = provider.name(), "Obtained access token");
                    return Ok(token);
                }
                Err(e) => debug!(provider = provider.name(), error = %e, "Credential provider failed"),
            }
        }
        Err(CredentialError::Exhausted)
    }
}
