//! Profile saves and their propagation into every contact record that
//! carries a copy of the profile.

use std::str::FromStr;

use serde::Serialize;
use tracing::info;

use crate::{
    auth::Authenticator,
    error::{ChatError, ChatResult},
    model::{within_limit, User, MAX_NAME_CHARS},
    objects::{profile_photo_path, ObjectStore},
    session::SignedIn,
    store::{DocumentStore, StoreError},
};

/// How the contact records to rewrite are found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FanoutStrategy {
    /// Look into every user's contacts. Cost grows with the total number of users.
    Scan,
    /// Ask the reverse index which owners reference the user.
    #[default]
    Index,
}

impl FromStr for FanoutStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scan" => Ok(Self::Scan),
            "index" => Ok(Self::Index),
            other => Err(format!("unknown fan-out strategy {other:?}")),
        }
    }
}

#[derive(Debug)]
pub enum PhotoChange {
    Keep,
    Upload(Vec<u8>),
}

#[derive(Debug)]
pub struct ProfileUpdate {
    pub name: String,
    pub photo: PhotoChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub user: User,
    pub contacts_updated: usize,
}

async fn referencing_owners(store: &dyn DocumentStore, strategy: FanoutStrategy, uid: &str) -> Result<Vec<String>, StoreError> {
    match strategy {
        FanoutStrategy::Index => store.owners_referencing(uid).await,
        FanoutStrategy::Scan => {
            let mut owners = Vec::new();
            for owner in store.list_user_ids().await? {
                if store.get_contact(&owner, uid).await?.is_some() {
                    owners.push(owner);
                }
            }
            Ok(owners)
        }
    }
}

/// Saves the profile and rewrites every copy of it. The first failing write
/// stops the rest; records already rewritten stay rewritten. A blank name
/// is a no-op.
pub async fn update_profile_info(
    store: &dyn DocumentStore,
    objects: &dyn ObjectStore,
    auth: &dyn Authenticator,
    strategy: FanoutStrategy,
    me: &SignedIn,
    update: ProfileUpdate,
) -> ChatResult<Option<FanoutReport>> {
    let name = update.name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    within_limit("name", name, MAX_NAME_CHARS)?;

    let current = store
        .get_user(&me.uid)
        .await?
        .ok_or_else(|| ChatError::Store(StoreError::NotFound(format!("user {}", me.uid))))?;

    let photo_url = match update.photo {
        PhotoChange::Keep => current.photo_url.clone(),
        PhotoChange::Upload(bytes) => Some(objects.put(&profile_photo_path(&me.uid), bytes).await?),
    };

    auth.update_profile(&me.id_token, name, photo_url.as_deref()).await?;
    store.update_user_profile(&me.uid, name, photo_url.as_deref()).await?;

    let owners = referencing_owners(store, strategy, &me.uid).await?;
    for owner in &owners {
        store
            .update_contact_profile(owner, &me.uid, name, photo_url.as_deref())
            .await?;
    }
    info!("profile of u/{} saved, {} contact copies rewritten", me.uid, owners.len());

    Ok(Some(FanoutReport {
        user: User {
            name: name.to_owned(),
            photo_url,
            ..current
        },
        contacts_updated: owners.len(),
    }))
}
