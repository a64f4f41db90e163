// Database access layer (SQLite via sqlx).
//
// Four core collections: tournaments, tournament_participants,
// tournament_admins, matches. The users table belongs to the membership
// system; this layer only reads it (plus a seed helper for tests and
// local mode).

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::lifecycle::{MatchStatus, ParticipantStatus, TournamentStatus};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tournament {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub starts_at: Option<String>,
    pub is_public: bool,
    pub max_participants: i64,
    pub bracket_kind: String,
    pub status: String,
    pub banner_ref: Option<String>,
    pub sponsors: String,
    pub prizes: String,
    pub created_by: i64,
    pub created_at: String,
}

impl Tournament {
    pub fn status_enum(&self) -> Option<TournamentStatus> {
        TournamentStatus::from_str_name(&self.status)
    }

    /// Sponsors are stored as a JSON array column; unreadable data counts
    /// as no sponsors.
    pub fn sponsor_list(&self) -> Vec<String> {
        serde_json::from_str(&self.sponsors).unwrap_or_default()
    }

    pub fn prize_list(&self) -> Vec<String> {
        serde_json::from_str(&self.prizes).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Participant {
    pub id: i64,
    pub tournament_id: i64,
    pub user_id: i64,
    pub status: String,
    pub joined_at: String,
}

impl Participant {
    pub fn status_enum(&self) -> Option<ParticipantStatus> {
        ParticipantStatus::from_str_name(&self.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TournamentAdmin {
    pub id: i64,
    pub tournament_id: i64,
    pub user_id: i64,
    pub granted_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Match {
    pub id: i64,
    pub tournament_id: i64,
    pub round: i64,
    pub match_number: i64,
    pub player1_id: i64,
    pub player2_id: Option<i64>,
    pub winner_id: Option<i64>,
    pub score: Option<String>,
    pub status: String,
    pub replay_ref: Option<String>,
    pub scheduled_at: Option<String>,
    pub created_at: String,
}

impl Match {
    pub fn is_completed(&self) -> bool {
        MatchStatus::from_str_name(&self.status) == Some(MatchStatus::Completed)
    }

    /// A bye has only one real player and never counts toward standings.
    pub fn is_bye(&self) -> bool {
        self.player2_id.is_none()
    }
}

const MATCH_COLUMNS: &str = "id, tournament_id, round, match_number, player1_id, player2_id, \
     winner_id, score, status, replay_ref, scheduled_at, created_at";

const TOURNAMENT_COLUMNS: &str = "id, title, description, starts_at, is_public, max_participants, \
     bracket_kind, status, banner_ref, sponsors, prizes, created_by, created_at";

/// How many times a match insert is retried when its freshly computed
/// match_number loses a race (or lands in a deletion gap).
const MATCH_NUMBER_RETRIES: u32 = 5;

/// SQLite reports constraint conflicts in the error text; this is what
/// race-safe insert paths key their conflict handling on.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.to_string().contains("UNIQUE")
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                avatar_ref TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tournaments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                starts_at TEXT,
                is_public INTEGER NOT NULL DEFAULT 1,
                max_participants INTEGER NOT NULL DEFAULT 16,
                bracket_kind TEXT NOT NULL DEFAULT 'single_elimination',
                status TEXT NOT NULL DEFAULT 'draft',
                banner_ref TEXT,
                sponsors TEXT NOT NULL DEFAULT '[]',
                prizes TEXT NOT NULL DEFAULT '[]',
                created_by INTEGER NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tournament_participants (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tournament_id INTEGER NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id),
                status TEXT NOT NULL DEFAULT 'pending',
                joined_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(tournament_id, user_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tournament_admins (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tournament_id INTEGER NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id),
                granted_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(tournament_id, user_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tournament_id INTEGER NOT NULL REFERENCES tournaments(id) ON DELETE CASCADE,
                round INTEGER NOT NULL,
                match_number INTEGER NOT NULL,
                player1_id INTEGER NOT NULL,
                player2_id INTEGER,
                winner_id INTEGER,
                score TEXT,
                status TEXT NOT NULL DEFAULT 'scheduled',
                replay_ref TEXT,
                scheduled_at TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(tournament_id, round, match_number)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Users (membership system's table; read-only plus seed) ────────

    /// Seed a user row. The membership subsystem owns this table; the
    /// core only needs this for tests and local mode.
    pub async fn create_user(
        &self,
        username: &str,
        display_name: &str,
        avatar_ref: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        let row = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, display_name, avatar_ref) VALUES (?, ?, ?) \
             RETURNING id, username, display_name, avatar_ref, created_at",
        )
        .bind(username)
        .bind(display_name)
        .bind(avatar_ref)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query_as::<_, User>(
            "SELECT id, username, display_name, avatar_ref, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, username, display_name, avatar_ref, created_at FROM users \
             WHERE id IN ({placeholders})"
        );
        let mut query = sqlx::query_as::<_, User>(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Tournament CRUD ───────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub async fn create_tournament(
        &self,
        title: &str,
        description: &str,
        starts_at: Option<&str>,
        is_public: bool,
        max_participants: i64,
        bracket_kind: &str,
        sponsors: &str,
        prizes: &str,
        created_by: i64,
    ) -> Result<Tournament, sqlx::Error> {
        let sql = format!(
            "INSERT INTO tournaments (title, description, starts_at, is_public, \
             max_participants, bracket_kind, sponsors, prizes, created_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {TOURNAMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Tournament>(&sql)
            .bind(title)
            .bind(description)
            .bind(starts_at)
            .bind(is_public)
            .bind(max_participants)
            .bind(bracket_kind)
            .bind(sponsors)
            .bind(prizes)
            .bind(created_by)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_tournament(&self, id: i64) -> Result<Option<Tournament>, sqlx::Error> {
        let sql = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = ?");
        let row = sqlx::query_as::<_, Tournament>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_all_tournaments(&self) -> Result<Vec<Tournament>, sqlx::Error> {
        let sql = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments ORDER BY id");
        let rows = sqlx::query_as::<_, Tournament>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Public tournaments, plus (for a signed-in viewer) the ones they
    /// created or administrate.
    pub async fn list_tournaments_visible(
        &self,
        viewer_id: Option<i64>,
    ) -> Result<Vec<Tournament>, sqlx::Error> {
        let sql = format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments \
             WHERE is_public = 1 OR created_by = ?1 \
                OR id IN (SELECT tournament_id FROM tournament_admins WHERE user_id = ?1) \
             ORDER BY id"
        );
        let rows = sqlx::query_as::<_, Tournament>(&sql)
            .bind(viewer_id.unwrap_or(-1))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_tournament(
        &self,
        id: i64,
        title: Option<&str>,
        description: Option<&str>,
        starts_at: Option<&str>,
        is_public: Option<bool>,
        max_participants: Option<i64>,
        bracket_kind: Option<&str>,
        banner_ref: Option<&str>,
        sponsors: Option<&str>,
        prizes: Option<&str>,
    ) -> Result<Option<Tournament>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tournaments SET \
                title = COALESCE(?, title), \
                description = COALESCE(?, description), \
                starts_at = COALESCE(?, starts_at), \
                is_public = COALESCE(?, is_public), \
                max_participants = COALESCE(?, max_participants), \
                bracket_kind = COALESCE(?, bracket_kind), \
                banner_ref = COALESCE(?, banner_ref), \
                sponsors = COALESCE(?, sponsors), \
                prizes = COALESCE(?, prizes) \
             WHERE id = ?",
        )
        .bind(title)
        .bind(description)
        .bind(starts_at)
        .bind(is_public)
        .bind(max_participants)
        .bind(bracket_kind)
        .bind(banner_ref)
        .bind(sponsors)
        .bind(prizes)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_tournament(id).await
    }

    pub async fn update_tournament_status(
        &self,
        id: i64,
        status: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE tournaments SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a tournament and everything it owns in one transaction.
    pub async fn delete_tournament(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM matches WHERE tournament_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tournament_participants WHERE tournament_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tournament_admins WHERE tournament_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tournaments WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Participants ──────────────────────────────────────────────────

    /// Insert a participant row. The UNIQUE(tournament_id, user_id)
    /// constraint is the registry's race-safe duplicate guard; callers
    /// map the conflict to their own error.
    pub async fn create_participant(
        &self,
        tournament_id: i64,
        user_id: i64,
        status: &str,
    ) -> Result<Participant, sqlx::Error> {
        let row = sqlx::query_as::<_, Participant>(
            "INSERT INTO tournament_participants (tournament_id, user_id, status) \
             VALUES (?, ?, ?) RETURNING id, tournament_id, user_id, status, joined_at",
        )
        .bind(tournament_id)
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_participant(&self, id: i64) -> Result<Option<Participant>, sqlx::Error> {
        let row = sqlx::query_as::<_, Participant>(
            "SELECT id, tournament_id, user_id, status, joined_at \
             FROM tournament_participants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_participants(
        &self,
        tournament_id: i64,
    ) -> Result<Vec<Participant>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Participant>(
            "SELECT id, tournament_id, user_id, status, joined_at \
             FROM tournament_participants WHERE tournament_id = ? ORDER BY id",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Rows counting toward the participant cap (rejected ones do not).
    pub async fn count_active_participants(
        &self,
        tournament_id: i64,
    ) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tournament_participants \
             WHERE tournament_id = ? AND status != 'rejected'",
        )
        .bind(tournament_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn update_participant_status(
        &self,
        id: i64,
        status: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE tournament_participants SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_participant(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tournament_participants WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_approved_participant(
        &self,
        tournament_id: i64,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tournament_participants \
             WHERE tournament_id = ? AND user_id = ? AND status = 'approved'",
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    // ── Admin grants ──────────────────────────────────────────────────

    pub async fn create_admin_grant(
        &self,
        tournament_id: i64,
        user_id: i64,
    ) -> Result<TournamentAdmin, sqlx::Error> {
        let row = sqlx::query_as::<_, TournamentAdmin>(
            "INSERT INTO tournament_admins (tournament_id, user_id) VALUES (?, ?) \
             RETURNING id, tournament_id, user_id, granted_at",
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_admin_grants(
        &self,
        tournament_id: i64,
    ) -> Result<Vec<TournamentAdmin>, sqlx::Error> {
        let rows = sqlx::query_as::<_, TournamentAdmin>(
            "SELECT id, tournament_id, user_id, granted_at FROM tournament_admins \
             WHERE tournament_id = ? ORDER BY id",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete_admin_grant(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tournament_admins WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_tournament_admin(
        &self,
        tournament_id: i64,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tournament_admins WHERE tournament_id = ? AND user_id = ?",
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    // ── Matches ───────────────────────────────────────────────────────

    /// Create a match, assigning the next free match_number within the
    /// (tournament, round) group.
    ///
    /// The first attempt uses 1 + count of existing matches in the round;
    /// if that number is taken (concurrent create, or a deletion gap made
    /// the count stale) the UNIQUE constraint rejects the insert and the
    /// retry recomputes with MAX + 1.
    pub async fn create_match(
        &self,
        tournament_id: i64,
        round: i64,
        player1_id: i64,
        player2_id: Option<i64>,
        scheduled_at: Option<&str>,
    ) -> Result<Match, sqlx::Error> {
        let mut last_err = None;
        for attempt in 0..MATCH_NUMBER_RETRIES {
            let match_number = if attempt == 0 {
                let count: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM matches WHERE tournament_id = ? AND round = ?",
                )
                .bind(tournament_id)
                .bind(round)
                .fetch_one(&self.pool)
                .await?;
                count + 1
            } else {
                let max: Option<i64> = sqlx::query_scalar(
                    "SELECT MAX(match_number) FROM matches WHERE tournament_id = ? AND round = ?",
                )
                .bind(tournament_id)
                .bind(round)
                .fetch_one(&self.pool)
                .await?;
                max.unwrap_or(0) + 1
            };

            let sql = format!(
                "INSERT INTO matches (tournament_id, round, match_number, player1_id, \
                 player2_id, scheduled_at) VALUES (?, ?, ?, ?, ?, ?) \
                 RETURNING {MATCH_COLUMNS}"
            );
            let result = sqlx::query_as::<_, Match>(&sql)
                .bind(tournament_id)
                .bind(round)
                .bind(match_number)
                .bind(player1_id)
                .bind(player2_id)
                .bind(scheduled_at)
                .fetch_one(&self.pool)
                .await;

            match result {
                Ok(row) => return Ok(row),
                Err(e) if e.to_string().contains("UNIQUE") => {
                    tracing::debug!(
                        tournament_id,
                        round,
                        match_number,
                        "match_number taken, retrying"
                    );
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.expect("retry loop ran at least once"))
    }

    pub async fn get_match(&self, id: i64) -> Result<Option<Match>, sqlx::Error> {
        let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?");
        let row = sqlx::query_as::<_, Match>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_matches_by_tournament(
        &self,
        tournament_id: i64,
    ) -> Result<Vec<Match>, sqlx::Error> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE tournament_id = ? \
             ORDER BY round, match_number"
        );
        let rows = sqlx::query_as::<_, Match>(&sql)
            .bind(tournament_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Write the mutable match fields as one row update. The ledger
    /// computes the merged values (including the derived status) before
    /// calling this.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_match(
        &self,
        id: i64,
        player1_id: i64,
        player2_id: Option<i64>,
        winner_id: Option<i64>,
        score: Option<&str>,
        status: &str,
        replay_ref: Option<&str>,
        scheduled_at: Option<&str>,
    ) -> Result<Option<Match>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE matches SET player1_id = ?, player2_id = ?, winner_id = ?, score = ?, \
             status = ?, replay_ref = ?, scheduled_at = ? WHERE id = ?",
        )
        .bind(player1_id)
        .bind(player2_id)
        .bind(winner_id)
        .bind(score)
        .bind(status)
        .bind(replay_ref)
        .bind(scheduled_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_match(id).await
    }

    pub async fn delete_match(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM matches WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
