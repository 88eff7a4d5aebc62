use std::{fmt, path::Path};

use oauth2::{basic::BasicClient, AuthUrl, Client, ClientId, ClientSecret, RedirectUrl, TokenUrl};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::AuthError;

type HappyClient = Client<oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>, oauth2::StandardTokenResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>, oauth2::StandardTokenIntrospectionResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>, oauth2::StandardRevocableToken, oauth2::StandardErrorResponse<oauth2::RevocationErrorResponseType>, oauth2::EndpointSet, oauth2::EndpointNotSet, oauth2::EndpointNotSet, oauth2::EndpointNotSet, oauth2::EndpointSet>;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientProvider {
    Google,
    Github,
}

impl ClientProvider {
    /// Provider id as the identity provider knows it.
    pub fn id(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google.com",
            Github => "github.com",
        }
    }

    fn path(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google",
            Github => "github",
        }
    }

    fn endpoints(&self) -> (&'static str, &'static str) {
        use ClientProvider::*;
        match self {
            Google => ("https://accounts.google.com/o/oauth2/auth", "https://oauth2.googleapis.com/token"),
            Github => ("https://github.com/login/oauth/authorize", "https://github.com/login/oauth/access_token"),
        }
    }
}

impl fmt::Display for ClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Deserialize)]
struct ClientKeys {
    client_id: String,
    client_secret: String,
    /// Overrides of the provider's well-known endpoints.
    auth_url: Option<String>,
    token_url: Option<String>,
}

/// OAuth clients for the providers whose keys were supplied.
#[derive(Clone, Default)]
pub struct Clients {
    google_client: Option<HappyClient>,
    github_client: Option<HappyClient>,
}

impl Clients {
    pub fn none() -> Self {
        Self::default()
    }

    /// `{"google": {"client_id": .., "client_secret": ..}, "github": {..}}`,
    /// either key optional. A provider may also carry `auth_url` and
    /// `token_url`.
    pub fn from_json(json: Value, public_url: &str) -> Result<Clients, AuthError> {
        let build = |provider: ClientProvider| -> Result<Option<HappyClient>, AuthError> {
            let Some(keys) = json.get(provider.path()) else {
                return Ok(None);
            };
            let keys: ClientKeys = serde_json::from_value(keys.clone())
                .map_err(|e| AuthError::Malformed(format!("{provider} keys: {e}")))?;

            let (default_auth_url, default_token_url) = provider.endpoints();
            let auth_url = keys.auth_url.unwrap_or_else(|| default_auth_url.to_owned());
            let token_url = keys.token_url.unwrap_or_else(|| default_token_url.to_owned());
            let bad_url = |e: oauth2::url::ParseError| AuthError::Malformed(format!("{provider} url: {e}"));
            let redirect_url = format!("{public_url}/lockin/{}", provider.path());

            Ok(Some(
                BasicClient::new(ClientId::new(keys.client_id))
                    .set_client_secret(ClientSecret::new(keys.client_secret))
                    .set_auth_uri(AuthUrl::new(auth_url).map_err(bad_url)?)
                    .set_token_uri(TokenUrl::new(token_url).map_err(bad_url)?)
                    .set_redirect_uri(RedirectUrl::new(redirect_url).map_err(bad_url)?),
            ))
        };

        Ok(Clients {
            google_client: build(ClientProvider::Google)?,
            github_client: build(ClientProvider::Github)?,
        })
    }

    pub async fn load(path: Option<&Path>, public_url: &str) -> Result<Clients, AuthError> {
        let Some(path) = path else {
            info!("no OAuth clients configured");
            return Ok(Clients::none());
        };

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AuthError::Malformed(format!("{}: {e}", path.display())))?;
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| AuthError::Malformed(format!("{}: {e}", path.display())))?;
        Self::from_json(json, public_url)
    }

    pub fn get_client(&self, provider: ClientProvider) -> Result<HappyClient, AuthError> {
        use ClientProvider::*;
        match provider {
            Google => self.google_client.clone(),
            Github => self.github_client.clone(),
        }
        .ok_or(AuthError::UnknownProvider(provider))
    }
}
