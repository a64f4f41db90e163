// Match ledger: creation, result recording, edits and deletion.
//
// The ledger owns round/match_number sequencing (delegated to the store's
// insert-retry, see db::create_match) and the winner/status invariant:
// a match is completed exactly when it has a winner, and the winner must
// be one of its players.

use serde::Deserialize;

use crate::db::{Database, Match};
use crate::error::{Error, Result};
use crate::lifecycle::MatchStatus;

/// Operator edit of a match's mutable fields. Absent fields keep their
/// current values; `clear_result` voids winner and score and puts the
/// match back to scheduled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchPatch {
    pub player1_id: Option<i64>,
    pub player2_id: Option<i64>,
    pub winner_id: Option<i64>,
    pub score: Option<String>,
    pub replay_ref: Option<String>,
    pub scheduled_at: Option<String>,
    #[serde(default)]
    pub clear_result: bool,
}

fn validate_timestamp(value: &str) -> Result<()> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|e| Error::invalid_input(format!("bad timestamp {value:?}: {e}")))
}

async fn require_approved_player(db: &Database, tournament_id: i64, user_id: i64) -> Result<()> {
    if db.is_approved_participant(tournament_id, user_id).await? {
        Ok(())
    } else {
        Err(Error::InvalidPlayer(user_id))
    }
}

/// Create a match in the given round. Omitting player2 records a bye.
pub async fn create_match(
    db: &Database,
    tournament_id: i64,
    round: i64,
    player1_id: i64,
    player2_id: Option<i64>,
    scheduled_at: Option<&str>,
) -> Result<Match> {
    if db.get_tournament(tournament_id).await?.is_none() {
        return Err(Error::NotFound("tournament"));
    }
    if round < 1 {
        return Err(Error::invalid_input("round must be a positive integer"));
    }
    if player2_id == Some(player1_id) {
        return Err(Error::invalid_input("a player cannot face themselves"));
    }
    if let Some(ts) = scheduled_at {
        validate_timestamp(ts)?;
    }

    require_approved_player(db, tournament_id, player1_id).await?;
    if let Some(p2) = player2_id {
        require_approved_player(db, tournament_id, p2).await?;
    }

    let m = db
        .create_match(tournament_id, round, player1_id, player2_id, scheduled_at)
        .await?;
    crate::metrics::MATCHES_CREATED_TOTAL.inc();
    Ok(m)
}

/// Record the outcome: winner must be one of the match's players; the
/// match becomes completed. Recording again with the same data is a
/// no-op rewrite, so retries are safe.
pub async fn record_result(
    db: &Database,
    match_id: i64,
    winner_id: i64,
    score: Option<&str>,
    replay_ref: Option<&str>,
) -> Result<Match> {
    let m = db
        .get_match(match_id)
        .await?
        .ok_or(Error::NotFound("match"))?;

    if winner_id != m.player1_id && m.player2_id != Some(winner_id) {
        return Err(Error::InvalidWinner);
    }

    let updated = db
        .update_match(
            match_id,
            m.player1_id,
            m.player2_id,
            Some(winner_id),
            score.or(m.score.as_deref()),
            MatchStatus::Completed.to_str_name(),
            replay_ref.or(m.replay_ref.as_deref()),
            m.scheduled_at.as_deref(),
        )
        .await?
        .ok_or(Error::NotFound("match"))?;
    crate::metrics::RESULTS_RECORDED_TOTAL.inc();
    Ok(updated)
}

/// Operator edit. Player corrections are revalidated against the
/// tournament's participant list, and the winner invariant is re-checked
/// against the merged players; status is re-derived from winner presence.
pub async fn update_match(db: &Database, match_id: i64, patch: MatchPatch) -> Result<Match> {
    let m = db
        .get_match(match_id)
        .await?
        .ok_or(Error::NotFound("match"))?;

    let player1_id = patch.player1_id.unwrap_or(m.player1_id);
    let player2_id = patch.player2_id.or(m.player2_id);
    let winner_id = if patch.clear_result {
        None
    } else {
        patch.winner_id.or(m.winner_id)
    };
    let score = if patch.clear_result {
        None
    } else {
        patch.score.or(m.score)
    };
    let replay_ref = patch.replay_ref.or(m.replay_ref);
    let scheduled_at = patch.scheduled_at.or(m.scheduled_at);

    if player2_id == Some(player1_id) {
        return Err(Error::invalid_input("a player cannot face themselves"));
    }
    if let Some(ts) = &scheduled_at {
        validate_timestamp(ts)?;
    }

    if patch.player1_id.is_some() {
        require_approved_player(db, m.tournament_id, player1_id).await?;
    }
    if let Some(p2) = patch.player2_id {
        require_approved_player(db, m.tournament_id, p2).await?;
    }

    if let Some(w) = winner_id {
        if w != player1_id && player2_id != Some(w) {
            return Err(Error::InvalidWinner);
        }
    }

    let status = if winner_id.is_some() {
        MatchStatus::Completed
    } else {
        MatchStatus::Scheduled
    };

    db.update_match(
        match_id,
        player1_id,
        player2_id,
        winner_id,
        score.as_deref(),
        status.to_str_name(),
        replay_ref.as_deref(),
        scheduled_at.as_deref(),
    )
    .await?
    .ok_or(Error::NotFound("match"))
}

/// Delete a match. Sibling match numbers are not renumbered; gaps stay.
pub async fn delete_match(db: &Database, match_id: i64) -> Result<()> {
    if !db.delete_match(match_id).await? {
        return Err(Error::NotFound("match"));
    }
    Ok(())
}

/// The tournament's ledger, ordered by (round, match_number).
pub async fn list_by_tournament(db: &Database, tournament_id: i64) -> Result<Vec<Match>> {
    if db.get_tournament(tournament_id).await?.is_none() {
        return Err(Error::NotFound("tournament"));
    }
    Ok(db.list_matches_by_tournament(tournament_id).await?)
}
