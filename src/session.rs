use chrono::{DateTime, Duration, Utc};
use tower_sessions::Session;
use tracing::debug;

use crate::{auth::Authenticator, error::ChatError, AppResult};

pub const USER_ID: &str = "user_id";
pub const ID_TOKEN: &str = "id_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
/// Unix seconds.
pub const TOKEN_EXPIRES_AT: &str = "token_expires_at";
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";

/// ID tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN: Duration = Duration::seconds(60);

/// The signed-in user behind a request.
#[derive(Debug, Clone, Default)]
pub struct SignedIn {
    pub uid: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SignedIn {
    /// Without a known expiry the token is taken as valid.
    pub fn token_is_stale(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at - EXPIRY_MARGIN <= now)
    }
}

pub async fn store_tokens(
    session: &Session,
    id_token: &str,
    refresh_token: &str,
    expires_at: Option<DateTime<Utc>>,
) -> AppResult<()> {
    session.insert(ID_TOKEN, id_token).await?;
    session.insert(REFRESH_TOKEN, refresh_token).await?;
    match expires_at {
        Some(at) => session.insert(TOKEN_EXPIRES_AT, at.timestamp()).await?,
        None => {
            session.remove::<i64>(TOKEN_EXPIRES_AT).await?;
        }
    }
    Ok(())
}

pub async fn signed_in(session: &Session) -> AppResult<SignedIn> {
    let Some(uid) = session.get::<String>(USER_ID).await? else {
        return Err(ChatError::NotSignedIn.into());
    };
    let id_token = session.get::<String>(ID_TOKEN).await?.unwrap_or_default();
    let refresh_token = session.get::<String>(REFRESH_TOKEN).await?.unwrap_or_default();
    let expires_at = session
        .get::<i64>(TOKEN_EXPIRES_AT)
        .await?
        .and_then(|at| DateTime::from_timestamp(at, 0));
    Ok(SignedIn { uid, id_token, refresh_token, expires_at })
}

/// Like [`signed_in`], but trades the refresh token for a new ID token when
/// the stored one is about to expire. Needed before calls that present the
/// ID token to the identity provider.
pub async fn signed_in_fresh(session: &Session, auth: &dyn Authenticator) -> AppResult<SignedIn> {
    let me = signed_in(session).await?;
    if !me.token_is_stale(Utc::now()) || me.refresh_token.is_empty() {
        return Ok(me);
    }

    debug!("refreshing id token for u/{}", me.uid);
    let fresh = auth.refresh(&me.refresh_token).await.map_err(ChatError::from)?;
    store_tokens(session, &fresh.id_token, &fresh.refresh_token, fresh.expires_at).await?;
    Ok(SignedIn {
        id_token: fresh.id_token,
        refresh_token: fresh.refresh_token,
        expires_at: fresh.expires_at,
        ..me
    })
}

/// Only same-site paths are followed after sign-in and sign-out.
pub fn local_return_url(return_url: Option<String>) -> String {
    match return_url {
        Some(url) if url.starts_with('/') && !url.starts_with("//") && !url.contains('\\') => url,
        _ => "/".to_owned(),
    }
}
