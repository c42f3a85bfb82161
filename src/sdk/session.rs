//! Credentials and routing for one run.

use std::fmt;

use crate::config::{Config, Profile};
use crate::error::ConfigError;
use crate::sdk::region::{DEFAULT_ENDPOINT, DEFAULT_RESIDENCY};

pub const ENV_ACCESS_KEY_ID: &str = "SVCCLI_ACCESS_KEY_ID";
pub const ENV_SECRET_KEY: &str = "SVCCLI_SECRET_KEY";
pub const ENV_PROFILE: &str = "SVCCLI_PROFILE";
pub const ENV_RESIDENCY: &str = "SVCCLI_RESIDENCY";
pub const ENV_ENDPOINT: &str = "SVCCLI_ENDPOINT";
pub const ENV_BASE_URL: &str = "SVCCLI_BASE_URL";

pub const DEFAULT_PROFILE: &str = "default";

/// Session-related global flags, as given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub access_key_id: Option<String>,
    pub secret_key: Option<String>,
    pub profile: Option<String>,
    pub residency: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub profile: String,
    pub credentials: Option<Credentials>,
    pub residency: String,
    pub endpoint: String,
    /// Overrides server selection when set.
    pub base_url: Option<String>,
}

impl Session {
    /// Resolve with precedence flags > environment > profile > defaults.
    ///
    /// A profile named by flag or environment must exist; the implicit
    /// `default` profile may be absent.
    pub fn resolve(
        options: &SessionOptions,
        config: &Config,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let named = options.profile.clone().or_else(|| env(ENV_PROFILE));
        let (profile_name, profile) = match named {
            Some(name) => {
                let profile = config
                    .profiles
                    .get(&name)
                    .ok_or_else(|| ConfigError::UnknownProfile {
                        profile: name.clone(),
                    })?;
                (name, Some(profile))
            }
            None => (
                DEFAULT_PROFILE.to_string(),
                config.profiles.get(DEFAULT_PROFILE),
            ),
        };

        let from_profile = |field: fn(&Profile) -> Option<String>| profile.and_then(field);
        let pick = |flag: &Option<String>, var: &str, fallback: Option<String>| {
            flag.clone().or_else(|| env(var)).or(fallback)
        };

        let access_key_id = pick(
            &options.access_key_id,
            ENV_ACCESS_KEY_ID,
            from_profile(|p| p.access_key_id.clone()),
        );
        let secret_key = pick(
            &options.secret_key,
            ENV_SECRET_KEY,
            from_profile(|p| p.secret_key.clone()),
        );
        let credentials = match (access_key_id, secret_key) {
            (Some(access_key_id), Some(secret_key)) => Some(Credentials {
                access_key_id,
                secret_key,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::IncompleteCredentials {
                    missing: "secret_key",
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteCredentials {
                    missing: "access_key_id",
                })
            }
        };

        let residency = pick(
            &options.residency,
            ENV_RESIDENCY,
            from_profile(|p| p.residency.clone()),
        )
        .unwrap_or_else(|| DEFAULT_RESIDENCY.to_string());
        let endpoint = pick(
            &options.endpoint,
            ENV_ENDPOINT,
            from_profile(|p| p.endpoint.clone()),
        )
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let base_url = pick(&None, ENV_BASE_URL, from_profile(|p| p.base_url.clone()));

        tracing::debug!(
            profile = %profile_name,
            %residency,
            %endpoint,
            authenticated = credentials.is_some(),
            "resolved session"
        );

        Ok(Self {
            profile: profile_name,
            credentials,
            residency,
            endpoint,
            base_url,
        })
    }
}
