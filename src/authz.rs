// Tournament capability checks.
//
// "Operator" is one predicate composed from three independent checks:
// global admin, tournament creator, or an explicit tournament_admins
// grant. Every mutating operation except self-registration requires it.

use crate::auth::Claims;
use crate::db::{Database, Tournament};
use crate::error::{Error, Result};

/// Can `claims` manage this tournament's participants and matches?
pub async fn is_tournament_operator(
    db: &Database,
    claims: &Claims,
    tournament: &Tournament,
) -> Result<bool> {
    if claims.is_global_admin() {
        return Ok(true);
    }
    if tournament.created_by == claims.sub {
        return Ok(true);
    }
    Ok(db.is_tournament_admin(tournament.id, claims.sub).await?)
}

pub async fn require_operator(
    db: &Database,
    claims: &Claims,
    tournament: &Tournament,
) -> Result<()> {
    if is_tournament_operator(db, claims, tournament).await? {
        Ok(())
    } else {
        Err(Error::NotAuthorized)
    }
}

/// Granting/revoking admin rights and deleting the tournament itself are
/// reserved for the creator and global admins — a granted admin cannot
/// mint further admins.
pub fn require_creator_or_global(claims: &Claims, tournament: &Tournament) -> Result<()> {
    if claims.is_global_admin() || tournament.created_by == claims.sub {
        Ok(())
    } else {
        Err(Error::NotAuthorized)
    }
}
