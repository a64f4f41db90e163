// Error taxonomy for tournament and match operations.
//
// Every operation returns the specific reason for a rejected action to its
// immediate caller; nothing is suppressed and no partial result is ever
// reported as success.

use crate::lifecycle::TournamentStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A participant row already exists for this (tournament, user) pair.
    #[error("user is already registered for this tournament")]
    AlreadyRegistered,

    /// Registration attempted while the tournament is not open.
    #[error("registration is closed (tournament is {})", .0.to_str_name())]
    RegistrationClosed(TournamentStatus),

    /// The tournament has reached its participant limit.
    #[error("tournament is full")]
    TournamentFull,

    /// The recorded winner is not one of the match's players.
    #[error("winner must be one of the match players")]
    InvalidWinner,

    /// A match player is not an approved participant of the tournament.
    #[error("player {0} is not an approved participant of this tournament")]
    InvalidPlayer(i64),

    /// The user already holds an admin grant for this tournament.
    #[error("user is already an admin of this tournament")]
    AlreadyGranted,

    /// Status change not allowed by the transition graph.
    #[error("cannot move tournament from {} to {}", .0.to_str_name(), .1.to_str_name())]
    InvalidTransition(TournamentStatus, TournamentStatus),

    /// The caller lacks the capability required for this operation.
    #[error("not authorized to manage this tournament")]
    NotAuthorized,

    /// A referenced tournament, participant or match does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Malformed input: unknown kind/status string, non-positive round,
    /// unparsable timestamp, identical players.
    #[error("{0}")]
    InvalidInput(String),

    /// The underlying store failed; the caller may retry.
    #[error("store unavailable: {0}")]
    Store(#[from] sqlx::Error),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
