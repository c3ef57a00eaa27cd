//! Shared credentials record

use serde::{Deserialize, Serialize};
use url::Url;

/// Username/password or access-token credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// User name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Personal access token or bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

crate::expand_fields!(Credentials {
    username,
    password,
    access_token
});

impl Credentials {
    /// Whether no credential is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !super::is_set(self.username.as_ref())
            && !super::is_set(self.password.as_ref())
            && !super::is_set(self.access_token.as_ref())
    }

    /// Basic auth pair, if a username is set
    #[must_use]
    pub fn basic(&self) -> Option<(&str, Option<&str>)> {
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        Some((username, self.password.as_deref()))
    }

    /// Bearer token, if set
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Embeds the credentials in an HTTP(S) URL
    ///
    /// An access token wins over a password; without a username it is sent
    /// as `oauth2`. Non-HTTP URLs and URLs that fail to parse are returned
    /// unchanged.
    #[must_use]
    pub fn inject_into_url(&self, raw: &str) -> String {
        let Ok(mut url) = Url::parse(raw) else {
            return raw.to_string();
        };
        if !matches!(url.scheme(), "http" | "https") || self.is_empty() {
            return raw.to_string();
        }

        let secret = self.bearer().or(self.password.as_deref());
        let username = match (self.username.as_deref(), self.bearer()) {
            (Some(user), _) if !user.is_empty() => user,
            (_, Some(_)) => "oauth2",
            _ => "",
        };

        if url.set_username(username).is_err() || url.set_password(secret).is_err() {
            return raw.to_string();
        }
        url.to_string()
    }
}

/// Masks the password part of a URL for display
#[must_use]
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("*****"));
            url.to_string()
        }
        _ => raw.to_string(),
    }
}
