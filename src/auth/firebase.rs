use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::FirebaseConfig;

use super::{AuthError, AuthSession, Authenticator, ClientProvider, FreshToken};

/// Firebase Authentication through the Identity Toolkit REST API.
#[derive(Clone)]
pub struct FirebaseAuth {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest {
    post_body: String,
    request_uri: String,
    return_idp_credential: bool,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<&'a str>,
    return_secure_token: bool,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'a str,
    refresh_token: &'a str,
}

trait GetField {
    fn get_str_field(&self, field: &str) -> Result<String, AuthError>;
    fn get_obj_field(&self, field: &str) -> Result<&Value, AuthError>;
    fn get_nonempty_str(&self, field: &str) -> Option<String>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> Result<String, AuthError> {
        Ok(self
            .get(field)
            .ok_or_else(|| AuthError::Malformed(format!("expected {field} in {self}")))?
            .as_str()
            .ok_or_else(|| AuthError::Malformed(format!("expected {field} in {self} to be string")))?
            .to_owned())
    }

    fn get_obj_field(&self, field: &str) -> Result<&Value, AuthError> {
        self.get(field)
            .ok_or_else(|| AuthError::Malformed(format!("expected {field} in {self}")))
    }

    fn get_nonempty_str(&self, field: &str) -> Option<String> {
        self.get(field)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    }
}

/// `expiresIn`/`expires_in` arrive as a string of seconds.
fn expiry_from(body: &Value, field: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let seconds = body.get_nonempty_str(field)?.parse::<i64>().ok()?;
    Some(now + Duration::seconds(seconds))
}

fn account_from(body: &Value) -> Result<AuthSession, AuthError> {
    Ok(AuthSession {
        uid: body.get_str_field("localId")?,
        email: body.get_nonempty_str("email").unwrap_or_default(),
        display_name: body.get_nonempty_str("displayName"),
        // signInWithPassword calls it profilePicture, the others photoUrl
        photo_url: body
            .get_nonempty_str("photoUrl")
            .or_else(|| body.get_nonempty_str("profilePicture")),
        id_token: body.get_str_field("idToken")?,
        refresh_token: body.get_nonempty_str("refreshToken").unwrap_or_default(),
        expires_at: expiry_from(body, "expiresIn", Utc::now()),
    })
}

fn fresh_token_from(body: &Value) -> Result<FreshToken, AuthError> {
    Ok(FreshToken {
        id_token: body.get_str_field("id_token")?,
        refresh_token: body.get_str_field("refresh_token")?,
        expires_at: expiry_from(body, "expires_in", Utc::now()),
    })
}

async fn read_reply(response: reqwest::Response, what: &str) -> Result<Value, AuthError> {
    let status = response.status();
    let body: Value = response.json().await?;

    if !status.is_success() {
        let message = body
            .get_obj_field("error")
            .and_then(|error| error.get_str_field("message"))
            .unwrap_or_else(|_| status.to_string());
        debug!("{what} refused: {message}");
        return Err(AuthError::Rejected(message));
    }
    Ok(body)
}

impl FirebaseAuth {
    pub fn new(http: reqwest::Client, config: &FirebaseConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            token_url: config.token_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    async fn call<B: Serialize + Sync>(&self, method: &str, body: &B) -> Result<Value, AuthError> {
        let url = format!("{}/accounts:{method}?key={}", self.base_url, self.api_key);
        let response = self.http.post(url).json(body).send().await?;
        read_reply(response, &format!("accounts:{method}")).await
    }
}

#[async_trait]
impl Authenticator for FirebaseAuth {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let body = self
            .call("signUp", &PasswordRequest { email, password, return_secure_token: true })
            .await?;
        account_from(&body)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let body = self
            .call("signInWithPassword", &PasswordRequest { email, password, return_secure_token: true })
            .await?;
        account_from(&body)
    }

    async fn sign_in_with_idp(&self, provider: ClientProvider, access_token: &str) -> Result<AuthSession, AuthError> {
        let request = IdpRequest {
            post_body: format!("access_token={access_token}&providerId={}", provider.id()),
            request_uri: "http://localhost/".to_owned(),
            return_idp_credential: true,
            return_secure_token: true,
        };
        let body = self.call("signInWithIdp", &request).await?;
        account_from(&body)
    }

    async fn update_profile(&self, id_token: &str, name: &str, photo_url: Option<&str>) -> Result<(), AuthError> {
        let request = UpdateRequest {
            id_token,
            display_name: name,
            photo_url,
            return_secure_token: false,
        };
        self.call("update", &request).await?;
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<FreshToken, AuthError> {
        let url = format!("{}/token?key={}", self.token_url, self.api_key);
        let request = RefreshRequest { grant_type: "refresh_token", refresh_token };
        let response = self.http.post(url).form(&request).send().await?;
        let body = read_reply(response, "token refresh").await?;
        fresh_token_from(&body)
    }
}
