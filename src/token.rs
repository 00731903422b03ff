// Token acquisition: exchanges the app credentials for an
// `app_access_token` and keeps it for the rest of the run. There is no
// expiry tracking; the cache lives exactly as long as the manager.

use crate::api::{read_json, ApiClient};
use crate::config::Credentials;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub const AUTH_ENDPOINT: &str = "/open-apis/auth/v3/app_access_token/internal";

/// Bearer credential for application-level API calls.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        AccessToken(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    app_access_token: Option<String>,
}

/// Fetches the access token on first use and hands back the same token on
/// every later call.
#[derive(Debug)]
pub struct TokenManager {
    api: ApiClient,
    token: Option<AccessToken>,
}

impl TokenManager {
    pub fn new(api: ApiClient) -> Self {
        TokenManager { api, token: None }
    }

    /// A manager that already holds `token` and will never hit the network.
    pub fn with_token(api: ApiClient, token: AccessToken) -> Self {
        TokenManager {
            api,
            token: Some(token),
        }
    }

    pub fn get_token(&mut self, creds: &Credentials) -> Result<AccessToken> {
        if let Some(token) = &self.token {
            debug!("reusing cached access token");
            return Ok(token.clone());
        }
        let token = self.fetch(creds)?;
        self.token = Some(token.clone());
        Ok(token)
    }

    fn fetch(&self, creds: &Credentials) -> Result<AccessToken> {
        let url = self.api.url(AUTH_ENDPOINT);
        debug!(%url, app_id = %creds.app_id, "requesting app access token");

        let res = self
            .api
            .http()
            .post(&url)
            .json(&TokenRequest {
                app_id: &creds.app_id,
                app_secret: &creds.app_secret,
            })
            .send()
            .map_err(|e| Error::transport("Failed to send auth request", e))?;

        let body: TokenResponse = read_json(res, "auth")?;
        if body.code != 0 {
            return Err(Error::Auth(body.msg));
        }
        body.app_access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken)
            .ok_or_else(|| Error::Decode("Auth response is missing app_access_token".into()))
    }
}
