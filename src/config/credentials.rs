//! Provider credentials - Environment Variable Resolution
//!
//! Secrets never live in `config.toml`. Each provider's credentials
//! come from environment variables (a `.env` file is loaded at start);
//! a provider whose required variables are missing or empty resolves
//! to `None` and is skipped without any network call.

use std::fmt;

use crate::domain::ProviderId;

pub const ERCOT_USERNAME: &str = "ERCOT_USERNAME";
pub const ERCOT_PASSWORD: &str = "ERCOT_PASSWORD";
pub const ERCOT_SUBSCRIPTION_KEY: &str = "ERCOT_SUBSCRIPTION_KEY";
pub const PJM_API_KEY: &str = "PJM_API_KEY";
pub const ISONE_USERNAME: &str = "ISONE_USERNAME";
pub const ISONE_PASSWORD: &str = "ISONE_PASSWORD";
pub const AESO_API_KEY: &str = "AESO_API_KEY";

/// Header carrying an Azure API Management subscription key.
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
/// Header carrying an AESO API gateway key.
pub const AESO_KEY_HEADER: &str = "API-KEY";

/// How requests to a provider are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Public endpoints, no authentication.
    Anonymous,
    /// Static key sent in `header`.
    ApiKey { header: &'static str, key: String },
    /// HTTP basic authentication.
    Basic { username: String, password: String },
    /// OAuth password grant exchanged for a bearer token, plus a
    /// subscription key sent on every data request.
    PasswordGrant {
        username: String,
        password: String,
        subscription_key: String,
    },
}

impl Credentials {
    /// Resolve a provider's credentials from the process environment.
    pub fn from_env(provider: ProviderId) -> Option<Self> {
        Self::resolve(provider, |name| std::env::var(name).ok())
    }

    /// Resolve a provider's credentials through `lookup`.
    ///
    /// Empty or whitespace-only values count as absent.
    pub fn resolve<F>(provider: ProviderId, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        match provider {
            ProviderId::Ercot => Some(Self::PasswordGrant {
                username: var(ERCOT_USERNAME)?,
                password: var(ERCOT_PASSWORD)?,
                subscription_key: var(ERCOT_SUBSCRIPTION_KEY)?,
            }),
            ProviderId::Pjm => Some(Self::ApiKey {
                header: SUBSCRIPTION_KEY_HEADER,
                key: var(PJM_API_KEY)?,
            }),
            ProviderId::IsoNe => Some(Self::Basic {
                username: var(ISONE_USERNAME)?,
                password: var(ISONE_PASSWORD)?,
            }),
            ProviderId::Aeso => Some(Self::ApiKey {
                header: AESO_KEY_HEADER,
                key: var(AESO_API_KEY)?,
            }),
            ProviderId::Caiso | ProviderId::Miso | ProviderId::Nyiso | ProviderId::Spp => {
                Some(Self::Anonymous)
            }
        }
    }

    /// Whether data requests need a bearer token from the token cache.
    pub const fn requires_token(&self) -> bool {
        matches!(self, Self::PasswordGrant { .. })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::ApiKey { header, .. } => f
                .debug_struct("ApiKey")
                .field("header", header)
                .field("key", &"<redacted>")
                .finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::PasswordGrant { username, .. } => f
                .debug_struct("PasswordGrant")
                .field("username", username)
                .field("password", &"<redacted>")
                .field("subscription_key", &"<redacted>")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_public_providers_need_nothing() {
        let creds = Credentials::resolve(ProviderId::Caiso, lookup(&[]));
        assert_eq!(creds, Some(Credentials::Anonymous));
    }

    #[test]
    fn test_missing_key_resolves_to_none() {
        assert!(Credentials::resolve(ProviderId::Pjm, lookup(&[])).is_none());
        assert!(Credentials::resolve(ProviderId::Pjm, lookup(&[(PJM_API_KEY, "  ")])).is_none());
    }

    #[test]
    fn test_ercot_needs_all_three_values() {
        let partial = lookup(&[(ERCOT_USERNAME, "u"), (ERCOT_PASSWORD, "p")]);
        assert!(Credentials::resolve(ProviderId::Ercot, partial).is_none());

        let full = lookup(&[
            (ERCOT_USERNAME, "u"),
            (ERCOT_PASSWORD, "p"),
            (ERCOT_SUBSCRIPTION_KEY, "k"),
        ]);
        let creds = Credentials::resolve(ProviderId::Ercot, full).unwrap();
        assert!(creds.requires_token());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::Basic {
            username: "ops".into(),
            password: "hunter2".into(),
        };
        let printed = format!("{creds:?}");
        assert!(printed.contains("ops"));
        assert!(!printed.contains("hunter2"));
    }
}
