// Round-robin standings: a pure derivation of the points table from the
// current match ledger. Holds no state of its own; callers pass whatever
// snapshot of participants and matches they read.

use serde::{Deserialize, Serialize};

use crate::db::{Match, Participant};

/// Points awarded for a win. Losses and unplayed matches score nothing.
pub const WIN_POINTS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingsRow {
    pub user_id: i64,
    pub played: i64,
    pub won: i64,
    pub lost: i64,
    pub points: i64,
}

impl StandingsRow {
    fn new(user_id: i64) -> Self {
        Self {
            user_id,
            played: 0,
            won: 0,
            lost: 0,
            points: 0,
        }
    }
}

/// Compute the ranked table for a round-robin tournament.
///
/// One row per given participant, zero-initialized, so a participant with
/// no matches still appears. Only matches that are completed, have a
/// winner, and have two real players contribute; byes are skipped. A
/// contribution for a user without a row (the participant was removed
/// after playing) is dropped, the opponent's side still counts.
///
/// Rows are sorted by points descending, then wins descending; remaining
/// ties keep the input (join) order.
pub fn compute_standings(participants: &[Participant], matches: &[Match]) -> Vec<StandingsRow> {
    let mut rows: Vec<StandingsRow> = participants
        .iter()
        .map(|p| StandingsRow::new(p.user_id))
        .collect();

    let index_of = |rows: &[StandingsRow], user_id: i64| -> Option<usize> {
        rows.iter().position(|r| r.user_id == user_id)
    };

    for m in matches {
        if !m.is_completed() || m.is_bye() {
            continue;
        }
        let (Some(winner), Some(player2)) = (m.winner_id, m.player2_id) else {
            continue;
        };
        let loser = if winner == m.player1_id {
            player2
        } else {
            m.player1_id
        };

        if let Some(i) = index_of(&rows, winner) {
            rows[i].played += 1;
            rows[i].won += 1;
            rows[i].points += WIN_POINTS;
        }
        if let Some(i) = index_of(&rows, loser) {
            rows[i].played += 1;
            rows[i].lost += 1;
        }
    }

    // Vec::sort_by is stable, so equal (points, won) keep input order.
    rows.sort_by(|a, b| b.points.cmp(&a.points).then(b.won.cmp(&a.won)));
    rows
}
