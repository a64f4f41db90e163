// Tournament lifecycle: status and kind enums with their DB string forms,
// plus the forward-biased status transition graph.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Draft,
    Open,
    Ongoing,
    Completed,
}

impl TournamentStatus {
    /// Parse a status string (from DB) into a TournamentStatus.
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "open" => Some(Self::Open),
            "ongoing" => Some(Self::Ongoing),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Serialize to the DB-storable string.
    pub fn to_str_name(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Open => "open",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
        }
    }

    /// Whether an operator may move a tournament from `self` to `to`.
    ///
    /// Forward one step along draft -> open -> ongoing -> completed, or
    /// back one step as the "reopen" escape hatch. Anything else is
    /// rejected.
    pub fn can_transition(&self, to: TournamentStatus) -> bool {
        use TournamentStatus::*;
        matches!(
            (*self, to),
            (Draft, Open)
                | (Open, Ongoing)
                | (Ongoing, Completed)
                | (Open, Draft)
                | (Ongoing, Open)
                | (Completed, Ongoing)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BracketKind {
    SingleElimination,
    DoubleElimination,
    RoundRobin,
}

impl BracketKind {
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "single_elimination" => Some(Self::SingleElimination),
            "double_elimination" => Some(Self::DoubleElimination),
            "round_robin" => Some(Self::RoundRobin),
            _ => None,
        }
    }

    pub fn to_str_name(&self) -> &'static str {
        match self {
            Self::SingleElimination => "single_elimination",
            Self::DoubleElimination => "double_elimination",
            Self::RoundRobin => "round_robin",
        }
    }

    /// Elimination tournaments get a bracket view, round robin a points
    /// table.
    pub fn is_elimination(&self) -> bool {
        matches!(self, Self::SingleElimination | Self::DoubleElimination)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Pending,
    Approved,
    Rejected,
}

impl ParticipantStatus {
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn to_str_name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Completed,
}

impl MatchStatus {
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(Self::Scheduled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn to_str_name(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            TournamentStatus::Draft,
            TournamentStatus::Open,
            TournamentStatus::Ongoing,
            TournamentStatus::Completed,
        ] {
            assert_eq!(TournamentStatus::from_str_name(s.to_str_name()), Some(s));
        }
        assert_eq!(TournamentStatus::from_str_name("running"), None);
    }

    #[test]
    fn test_forward_transitions() {
        use TournamentStatus::*;
        assert!(Draft.can_transition(Open));
        assert!(Open.can_transition(Ongoing));
        assert!(Ongoing.can_transition(Completed));
    }

    #[test]
    fn test_reopen_transitions() {
        use TournamentStatus::*;
        assert!(Open.can_transition(Draft));
        assert!(Ongoing.can_transition(Open));
        assert!(Completed.can_transition(Ongoing));
    }

    #[test]
    fn test_illegal_jumps() {
        use TournamentStatus::*;
        assert!(!Draft.can_transition(Ongoing));
        assert!(!Draft.can_transition(Completed));
        assert!(!Open.can_transition(Completed));
        assert!(!Completed.can_transition(Draft));
        assert!(!Completed.can_transition(Open));
        assert!(!Draft.can_transition(Draft));
    }

    #[test]
    fn test_reopened_tournament_moves_forward_again() {
        use TournamentStatus::*;
        // completed -> ongoing -> completed is a legal round trip
        assert!(Completed.can_transition(Ongoing));
        assert!(Ongoing.can_transition(Completed));
    }

    #[test]
    fn test_bracket_kind_parsing() {
        assert_eq!(
            BracketKind::from_str_name("single_elimination"),
            Some(BracketKind::SingleElimination)
        );
        assert_eq!(
            BracketKind::from_str_name("double_elimination"),
            Some(BracketKind::DoubleElimination)
        );
        assert_eq!(
            BracketKind::from_str_name("round_robin"),
            Some(BracketKind::RoundRobin)
        );
        assert_eq!(BracketKind::from_str_name("swiss"), None);
    }

    #[test]
    fn test_bracket_kind_classification() {
        assert!(BracketKind::SingleElimination.is_elimination());
        assert!(BracketKind::DoubleElimination.is_elimination());
        assert!(!BracketKind::RoundRobin.is_elimination());
    }

    #[test]
    fn test_participant_and_match_status_round_trip() {
        for s in [
            ParticipantStatus::Pending,
            ParticipantStatus::Approved,
            ParticipantStatus::Rejected,
        ] {
            assert_eq!(ParticipantStatus::from_str_name(s.to_str_name()), Some(s));
        }
        for s in [MatchStatus::Scheduled, MatchStatus::Completed] {
            assert_eq!(MatchStatus::from_str_name(s.to_str_name()), Some(s));
        }
    }
}
