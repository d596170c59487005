//! Connection settings for the Athena service.
//!
//! Values come from explicit builders or from the standard AWS environment
//! variables. The binary also loads a `.env` file before reading them.

use std::fmt;

use crate::{OwlError, Result};

/// Region used when neither the caller nor `AWS_REGION` names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Result artifact location used when `AWS_OUTPUT_BUCKET` is unset.
pub const DEFAULT_OUTPUT_LOCATION: &str = "s3://little-owl-athena-output";

/// Static AWS credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Present for temporary (STS) credentials.
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Everything needed to reach the service and tell it where to put results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwlConfig {
    pub credentials: Credentials,
    pub region: String,
    /// Where the service persists raw result files. Required by the service
    /// even though results are always read back through the paged API.
    pub output_location: String,
    /// Overrides the regional endpoint (VPC endpoints, local mocks).
    pub endpoint: Option<String>,
}

impl OwlConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            region: DEFAULT_REGION.to_owned(),
            output_location: DEFAULT_OUTPUT_LOCATION.to_owned(),
            endpoint: None,
        }
    }

    /// Builds a configuration from the process environment.
    ///
    /// Reads:
    /// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` (required)
    /// - `AWS_SESSION_TOKEN`
    /// - `AWS_REGION` (default `us-east-1`)
    /// - `AWS_OUTPUT_BUCKET` (default `s3://little-owl-athena-output`)
    /// - `ATHENA_ENDPOINT`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`OwlConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let access_key_id = read("AWS_ACCESS_KEY_ID").ok_or_else(|| {
            OwlError::Config("missing AWS_ACCESS_KEY_ID environment variable".to_owned())
        })?;
        let secret_access_key = read("AWS_SECRET_ACCESS_KEY").ok_or_else(|| {
            OwlError::Config("missing AWS_SECRET_ACCESS_KEY environment variable".to_owned())
        })?;

        let mut credentials = Credentials::new(access_key_id, secret_access_key);
        credentials.session_token = read("AWS_SESSION_TOKEN");

        let mut config = Self::new(credentials);
        if let Some(region) = read("AWS_REGION") {
            config.region = region;
        }
        if let Some(output_location) = read("AWS_OUTPUT_BUCKET") {
            config.output_location = output_location;
        }
        config.endpoint = read("ATHENA_ENDPOINT");
        Ok(config)
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_output_location(mut self, output_location: impl Into<String>) -> Self {
        self.output_location = output_location.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// The endpoint override, or the public regional endpoint.
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://athena.{}.amazonaws.com/", self.region.trim()),
        }
    }
}
