// Elimination bracket view: a pure round-grouped projection of the match
// ledger. No seeding and no automatic progression — pairing winners into
// the next round is the operator's job.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::Match;

/// Which side of a match the recorded winner sits on (for display
/// highlighting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinnerSide {
    Player1,
    Player2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketSlot {
    pub match_id: i64,
    pub match_number: i64,
    pub player1_id: i64,
    /// None marks a bye.
    pub player2_id: Option<i64>,
    pub winner_side: Option<WinnerSide>,
    pub score: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketRound {
    pub round: i64,
    pub matches: Vec<BracketSlot>,
}

/// Group the ledger into rounds, ascending, each round's matches ordered
/// by match_number. Rounds with no matches simply do not appear — there
/// are no empty placeholders.
pub fn project_bracket(matches: &[Match]) -> Vec<BracketRound> {
    let mut rounds: BTreeMap<i64, Vec<BracketSlot>> = BTreeMap::new();

    for m in matches {
        let winner_side = m.winner_id.and_then(|w| {
            if w == m.player1_id {
                Some(WinnerSide::Player1)
            } else if m.player2_id == Some(w) {
                Some(WinnerSide::Player2)
            } else {
                None
            }
        });
        rounds.entry(m.round).or_default().push(BracketSlot {
            match_id: m.id,
            match_number: m.match_number,
            player1_id: m.player1_id,
            player2_id: m.player2_id,
            winner_side,
            score: m.score.clone(),
            status: m.status.clone(),
        });
    }

    rounds
        .into_iter()
        .map(|(round, mut slots)| {
            slots.sort_by_key(|s| s.match_number);
            BracketRound { round, matches: slots }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_row(
        id: i64,
        round: i64,
        match_number: i64,
        player1: i64,
        player2: Option<i64>,
        winner: Option<i64>,
    ) -> Match {
        Match {
            id,
            tournament_id: 1,
            round,
            match_number,
            player1_id: player1,
            player2_id: player2,
            winner_id: winner,
            score: winner.map(|_| "2-1".to_string()),
            status: if winner.is_some() {
                "completed".to_string()
            } else {
                "scheduled".to_string()
            },
            replay_ref: None,
            scheduled_at: None,
            created_at: "2026-01-01 12:00:00".to_string(),
        }
    }

    #[test]
    fn test_rounds_grouped_and_sorted() {
        let matches = vec![
            match_row(3, 2, 1, 100, Some(102), None),
            match_row(1, 1, 1, 100, Some(101), Some(100)),
            match_row(2, 1, 2, 102, Some(103), Some(102)),
        ];
        let bracket = project_bracket(&matches);
        assert_eq!(bracket.len(), 2);
        assert_eq!(bracket[0].round, 1);
        assert_eq!(bracket[0].matches.len(), 2);
        assert_eq!(bracket[0].matches[0].match_number, 1);
        assert_eq!(bracket[0].matches[1].match_number, 2);
        assert_eq!(bracket[1].round, 2);
        assert_eq!(bracket[1].matches.len(), 1);
    }

    #[test]
    fn test_missing_round_is_absent_not_empty() {
        // Only round 1 exists: no round-2 placeholder group.
        let matches = vec![match_row(1, 1, 1, 100, Some(101), Some(100))];
        let bracket = project_bracket(&matches);
        assert_eq!(bracket.len(), 1);
        assert_eq!(bracket[0].round, 1);
    }

    #[test]
    fn test_winner_side_highlighting() {
        let matches = vec![
            match_row(1, 1, 1, 100, Some(101), Some(100)),
            match_row(2, 1, 2, 102, Some(103), Some(103)),
            match_row(3, 1, 3, 104, Some(105), None),
        ];
        let bracket = project_bracket(&matches);
        let slots = &bracket[0].matches;
        assert_eq!(slots[0].winner_side, Some(WinnerSide::Player1));
        assert_eq!(slots[1].winner_side, Some(WinnerSide::Player2));
        assert_eq!(slots[2].winner_side, None);
    }

    #[test]
    fn test_bye_slot() {
        let matches = vec![match_row(1, 1, 1, 100, None, Some(100))];
        let bracket = project_bracket(&matches);
        let slot = &bracket[0].matches[0];
        assert_eq!(slot.player2_id, None);
        assert_eq!(slot.winner_side, Some(WinnerSide::Player1));
    }

    #[test]
    fn test_empty_ledger() {
        assert!(project_bracket(&[]).is_empty());
    }

    #[test]
    fn test_non_contiguous_rounds() {
        // Rounds 1 and 3 exist (operator skipped 2): both appear, in
        // order, with nothing in between.
        let matches = vec![
            match_row(1, 3, 1, 100, Some(101), None),
            match_row(2, 1, 1, 102, Some(103), Some(102)),
        ];
        let bracket = project_bracket(&matches);
        let rounds: Vec<i64> = bracket.iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![1, 3]);
    }
}
