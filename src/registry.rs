// Participant registry: registration, vetting, removal and listing.
//
// Duplicate protection is the store's UNIQUE(tournament_id, user_id)
// constraint, not the application-level existence check — two concurrent
// registrations race to the insert and the loser gets AlreadyRegistered.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::db::{is_unique_violation, Database, Participant};
use crate::error::{Error, Result};
use crate::identity::{self, UserIdentity};
use crate::lifecycle::{ParticipantStatus, TournamentStatus};

/// A participant row resolved to the user's display identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantEntry {
    #[serde(flatten)]
    pub participant: Participant,
    pub display_name: String,
    pub avatar_ref: Option<String>,
}

/// Self-service registration. Only allowed while the tournament is open,
/// below its participant cap; the new row starts `pending`.
pub async fn register(db: &Database, tournament_id: i64, user_id: i64) -> Result<Participant> {
    let tournament = db
        .get_tournament(tournament_id)
        .await?
        .ok_or(Error::NotFound("tournament"))?;

    let status = tournament
        .status_enum()
        .ok_or_else(|| Error::invalid_input(format!("unknown tournament status {:?}", tournament.status)))?;
    if status != TournamentStatus::Open {
        return Err(Error::RegistrationClosed(status));
    }

    if db.count_active_participants(tournament_id).await? >= tournament.max_participants {
        return Err(Error::TournamentFull);
    }

    match db
        .create_participant(tournament_id, user_id, ParticipantStatus::Pending.to_str_name())
        .await
    {
        Ok(p) => {
            crate::metrics::REGISTRATIONS_TOTAL
                .with_label_values(&["self"])
                .inc();
            Ok(p)
        }
        Err(e) if is_unique_violation(&e) => Err(Error::AlreadyRegistered),
        Err(e) => Err(e.into()),
    }
}

/// Operator-assisted addition: the row starts `approved` and bypasses
/// the open-status gate and the cap (late fill-ins and fixups).
pub async fn add_direct(db: &Database, tournament_id: i64, user_id: i64) -> Result<Participant> {
    if db.get_tournament(tournament_id).await?.is_none() {
        return Err(Error::NotFound("tournament"));
    }

    match db
        .create_participant(
            tournament_id,
            user_id,
            ParticipantStatus::Approved.to_str_name(),
        )
        .await
    {
        Ok(p) => {
            crate::metrics::REGISTRATIONS_TOTAL
                .with_label_values(&["direct"])
                .inc();
            Ok(p)
        }
        Err(e) if is_unique_violation(&e) => Err(Error::AlreadyRegistered),
        Err(e) => Err(e.into()),
    }
}

/// Vetting: the only mutation a participant row receives.
pub async fn set_status(
    db: &Database,
    participant_id: i64,
    status: ParticipantStatus,
) -> Result<Participant> {
    if !db
        .update_participant_status(participant_id, status.to_str_name())
        .await?
    {
        return Err(Error::NotFound("participant"));
    }
    db.get_participant(participant_id)
        .await?
        .ok_or(Error::NotFound("participant"))
}

/// Remove a participant. Matches already referencing the user are left
/// untouched; their display falls back to the unknown-player placeholder.
pub async fn remove(db: &Database, participant_id: i64) -> Result<()> {
    if !db.delete_participant(participant_id).await? {
        return Err(Error::NotFound("participant"));
    }
    Ok(())
}

/// All participants of a tournament with resolved display identities.
pub async fn list(db: &Database, tournament_id: i64) -> Result<Vec<ParticipantEntry>> {
    if db.get_tournament(tournament_id).await?.is_none() {
        return Err(Error::NotFound("tournament"));
    }

    let participants = db.list_participants(tournament_id).await?;
    let user_ids: Vec<i64> = participants.iter().map(|p| p.user_id).collect();
    let mut identities: HashMap<i64, UserIdentity> =
        identity::resolve_many(db, &user_ids).await?;

    Ok(participants
        .into_iter()
        .map(|p| {
            let identity = identities
                .remove(&p.user_id)
                .unwrap_or_else(|| UserIdentity {
                    user_id: p.user_id,
                    display_name: identity::UNKNOWN_PLAYER.to_string(),
                    avatar_ref: None,
                });
            ParticipantEntry {
                participant: p,
                display_name: identity.display_name,
                avatar_ref: identity.avatar_ref,
            }
        })
        .collect())
}
