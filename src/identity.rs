// Read-side identity resolution: user reference -> display name + avatar.
//
// The membership system owns user records; this module only resolves
// references for presentation. A reference that no longer resolves (the
// user was deleted) falls back to a placeholder so match history stays
// renderable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::Database;

/// Display name used when a user reference no longer resolves.
pub const UNKNOWN_PLAYER: &str = "Unknown player";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: i64,
    pub display_name: String,
    pub avatar_ref: Option<String>,
}

impl UserIdentity {
    fn unknown(user_id: i64) -> Self {
        Self {
            user_id,
            display_name: UNKNOWN_PLAYER.to_string(),
            avatar_ref: None,
        }
    }
}

pub async fn resolve(db: &Database, user_id: i64) -> Result<UserIdentity, sqlx::Error> {
    let identity = match db.get_user(user_id).await? {
        Some(u) => UserIdentity {
            user_id: u.id,
            display_name: u.display_name,
            avatar_ref: u.avatar_ref,
        },
        None => UserIdentity::unknown(user_id),
    };
    Ok(identity)
}

/// Resolve a batch of user references in one query. Every requested id
/// gets an entry; unresolvable ones carry the placeholder.
pub async fn resolve_many(
    db: &Database,
    user_ids: &[i64],
) -> Result<HashMap<i64, UserIdentity>, sqlx::Error> {
    let users = db.get_users_by_ids(user_ids).await?;
    let mut map: HashMap<i64, UserIdentity> = users
        .into_iter()
        .map(|u| {
            (
                u.id,
                UserIdentity {
                    user_id: u.id,
                    display_name: u.display_name,
                    avatar_ref: u.avatar_ref,
                },
            )
        })
        .collect();
    for id in user_ids {
        map.entry(*id).or_insert_with(|| UserIdentity::unknown(*id));
    }
    Ok(map)
}
