// Integration tests for the tournament core: registration, vetting, the
// match ledger, and the standings/bracket projections, driven through the
// service layer against an in-memory store.

use clanhall_backend::bracket::{project_bracket, WinnerSide};
use clanhall_backend::db::Database;
use clanhall_backend::error::Error;
use clanhall_backend::identity;
use clanhall_backend::ledger;
use clanhall_backend::lifecycle::ParticipantStatus;
use clanhall_backend::registry;
use clanhall_backend::standings::compute_standings;

async fn test_db() -> Database {
    Database::new("sqlite::memory:").await.unwrap()
}

async fn seed_user(db: &Database, name: &str, display: &str) -> i64 {
    db.create_user(name, display, None).await.unwrap().id
}

async fn seed_tournament(db: &Database, creator: i64, kind: &str, max: i64) -> i64 {
    let t = db
        .create_tournament("Clan Cup", "", None, true, max, kind, "[]", "[]", creator)
        .await
        .unwrap();
    t.id
}

/// Approved participants A..D, tournament in the given status.
async fn seed_roster(db: &Database, tid: i64, names: &[&str]) -> Vec<i64> {
    let mut ids = Vec::new();
    for name in names {
        let uid = seed_user(db, name, name).await;
        registry::add_direct(db, tid, uid).await.unwrap();
        ids.push(uid);
    }
    ids
}

// Scenario 1: round-robin standings over two completed round-1 matches.
#[tokio::test]
async fn round_robin_standings_scenario() {
    let db = test_db().await;
    let creator = seed_user(&db, "creator", "Creator").await;
    let tid = seed_tournament(&db, creator, "round_robin", 4).await;
    let ids = seed_roster(&db, tid, &["a", "b", "c", "d"]).await;
    let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);

    let m1 = ledger::create_match(&db, tid, 1, a, Some(b), None).await.unwrap();
    let m2 = ledger::create_match(&db, tid, 1, c, Some(d), None).await.unwrap();
    ledger::record_result(&db, m1.id, a, Some("2-0"), None).await.unwrap();
    ledger::record_result(&db, m2.id, d, Some("2-1"), None).await.unwrap();

    let participants = db.list_participants(tid).await.unwrap();
    let matches = db.list_matches_by_tournament(tid).await.unwrap();
    let table = compute_standings(&participants, &matches);

    let order: Vec<i64> = table.iter().map(|r| r.user_id).collect();
    assert_eq!(order, vec![a, d, b, c]);

    let row_a = &table[0];
    assert_eq!((row_a.played, row_a.won, row_a.points), (1, 1, 3));
    let row_b = &table[2];
    assert_eq!((row_b.played, row_b.won, row_b.points), (1, 0, 0));

    // conservation: total points == 3 * completed two-player matches
    let total: i64 = table.iter().map(|r| r.points).sum();
    assert_eq!(total, 3 * 2);
}

// Scenario 2: concurrent-ish creates in one round never share a number.
#[tokio::test]
async fn match_numbers_stay_unique_in_round() {
    let db = test_db().await;
    let creator = seed_user(&db, "creator", "Creator").await;
    let tid = seed_tournament(&db, creator, "round_robin", 8).await;
    let ids = seed_roster(&db, tid, &["a", "b", "c", "d", "e", "f"]).await;

    for pair in ids.chunks(2) {
        ledger::create_match(&db, tid, 1, pair[0], Some(pair[1]), None)
            .await
            .unwrap();
    }

    let matches = ledger::list_by_tournament(&db, tid).await.unwrap();
    let mut numbers: Vec<i64> = matches.iter().map(|m| m.match_number).collect();
    let len_before = numbers.len();
    numbers.sort_unstable();
    numbers.dedup();
    assert_eq!(numbers.len(), len_before);
    assert_eq!(numbers, vec![1, 2, 3]);
}

// Scenario 3: registration outside `open` is rejected.
#[tokio::test]
async fn registration_closed_when_ongoing() {
    let db = test_db().await;
    let creator = seed_user(&db, "creator", "Creator").await;
    let tid = seed_tournament(&db, creator, "round_robin", 8).await;
    db.update_tournament_status(tid, "ongoing").await.unwrap();

    let eve = seed_user(&db, "eve", "Eve").await;
    let err = registry::register(&db, tid, eve).await.unwrap_err();
    assert!(matches!(err, Error::RegistrationClosed(_)));
}

// Scenario 4: a result naming a third user leaves the match untouched.
#[tokio::test]
async fn invalid_winner_leaves_match_scheduled() {
    let db = test_db().await;
    let creator = seed_user(&db, "creator", "Creator").await;
    let tid = seed_tournament(&db, creator, "single_elimination", 8).await;
    let ids = seed_roster(&db, tid, &["a", "b", "c"]).await;

    let m = ledger::create_match(&db, tid, 1, ids[0], Some(ids[1]), None)
        .await
        .unwrap();
    let err = ledger::record_result(&db, m.id, ids[2], Some("2-0"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidWinner));

    let m = db.get_match(m.id).await.unwrap().unwrap();
    assert_eq!(m.status, "scheduled");
    assert!(m.winner_id.is_none());
    assert!(m.score.is_none());
}

// Scenario 5: the bracket only contains rounds that have matches.
#[tokio::test]
async fn bracket_has_no_empty_round_placeholders() {
    let db = test_db().await;
    let creator = seed_user(&db, "creator", "Creator").await;
    let tid = seed_tournament(&db, creator, "single_elimination", 8).await;
    let ids = seed_roster(&db, tid, &["a", "b", "c", "d"]).await;

    let m1 = ledger::create_match(&db, tid, 1, ids[0], Some(ids[1]), None)
        .await
        .unwrap();
    ledger::create_match(&db, tid, 1, ids[2], Some(ids[3]), None)
        .await
        .unwrap();
    ledger::record_result(&db, m1.id, ids[0], Some("2-1"), None)
        .await
        .unwrap();

    let matches = ledger::list_by_tournament(&db, tid).await.unwrap();
    let rounds = project_bracket(&matches);
    assert_eq!(rounds.len(), 1);
    assert_eq!(rounds[0].round, 1);
    assert_eq!(rounds[0].matches.len(), 2);
    assert_eq!(rounds[0].matches[0].winner_side, Some(WinnerSide::Player1));
    assert_eq!(rounds[0].matches[1].winner_side, None);

    // operator pairs the winner into round 2 manually
    let m3 = ledger::create_match(&db, tid, 2, ids[0], Some(ids[2]), None)
        .await
        .unwrap();
    let matches = ledger::list_by_tournament(&db, tid).await.unwrap();
    let rounds = project_bracket(&matches);
    assert_eq!(rounds.len(), 2);
    assert_eq!(rounds[1].round, 2);
    assert_eq!(rounds[1].matches[0].match_id, m3.id);
}

// Scenario 6: removing a participant preserves match history; their
// display falls back to the placeholder.
#[tokio::test]
async fn removed_participant_history_and_fallback() {
    let db = test_db().await;
    let creator = seed_user(&db, "creator", "Creator").await;
    let tid = seed_tournament(&db, creator, "single_elimination", 8).await;
    let ids = seed_roster(&db, tid, &["a", "b"]).await;
    let (a, b) = (ids[0], ids[1]);

    let m = ledger::create_match(&db, tid, 1, a, Some(b), None).await.unwrap();
    ledger::record_result(&db, m.id, a, Some("2-0"), None).await.unwrap();

    let b_row = db
        .list_participants(tid)
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.user_id == b)
        .unwrap();
    registry::remove(&db, b_row.id).await.unwrap();

    // the match row is untouched
    let m = db.get_match(m.id).await.unwrap().unwrap();
    assert_eq!(m.player2_id, Some(b));
    assert_eq!(m.winner_id, Some(a));
    assert_eq!(m.status, "completed");

    // the membership account is gone too: identity resolution falls back
    db.delete_user(b).await.unwrap();
    let resolved = identity::resolve(&db, b).await.unwrap();
    assert_eq!(resolved.display_name, identity::UNKNOWN_PLAYER);
}

// Byes never contribute to standings, even when completed.
#[tokio::test]
async fn bye_matches_are_excluded_from_standings() {
    let db = test_db().await;
    let creator = seed_user(&db, "creator", "Creator").await;
    let tid = seed_tournament(&db, creator, "round_robin", 8).await;
    let ids = seed_roster(&db, tid, &["a", "b", "c"]).await;

    let bye = ledger::create_match(&db, tid, 1, ids[2], None, None).await.unwrap();
    ledger::record_result(&db, bye.id, ids[2], None, None).await.unwrap();

    let participants = db.list_participants(tid).await.unwrap();
    let matches = db.list_matches_by_tournament(tid).await.unwrap();
    let table = compute_standings(&participants, &matches);

    assert_eq!(table.len(), 3);
    assert!(table
        .iter()
        .all(|r| r.played == 0 && r.won == 0 && r.lost == 0 && r.points == 0));
}

// Registration invariants: duplicates rejected, cap enforced, vetting
// moves a pending row to approved.
#[tokio::test]
async fn registration_lifecycle() {
    let db = test_db().await;
    let creator = seed_user(&db, "creator", "Creator").await;
    let tid = seed_tournament(&db, creator, "round_robin", 2).await;
    db.update_tournament_status(tid, "open").await.unwrap();

    let a = seed_user(&db, "a", "A").await;
    let b = seed_user(&db, "b", "B").await;
    let c = seed_user(&db, "c", "C").await;

    let p = registry::register(&db, tid, a).await.unwrap();
    assert_eq!(p.status, "pending");
    assert!(matches!(
        registry::register(&db, tid, a).await.unwrap_err(),
        Error::AlreadyRegistered
    ));

    registry::register(&db, tid, b).await.unwrap();
    assert!(matches!(
        registry::register(&db, tid, c).await.unwrap_err(),
        Error::TournamentFull
    ));

    let approved = registry::set_status(&db, p.id, ParticipantStatus::Approved)
        .await
        .unwrap();
    assert_eq!(approved.status, "approved");

    let entries = registry::list(&db, tid).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].display_name, "A");
}

// Deleting the tournament removes everything it owns.
#[tokio::test]
async fn tournament_delete_cascades() {
    let db = test_db().await;
    let creator = seed_user(&db, "creator", "Creator").await;
    let tid = seed_tournament(&db, creator, "round_robin", 8).await;
    let ids = seed_roster(&db, tid, &["a", "b"]).await;
    ledger::create_match(&db, tid, 1, ids[0], Some(ids[1]), None)
        .await
        .unwrap();

    assert!(db.delete_tournament(tid).await.unwrap());
    assert!(matches!(
        ledger::list_by_tournament(&db, tid).await.unwrap_err(),
        Error::NotFound("tournament")
    ));
    assert!(matches!(
        registry::list(&db, tid).await.unwrap_err(),
        Error::NotFound("tournament")
    ));
}

// Re-reading the ledger with no writes in between gives the same order.
#[tokio::test]
async fn ledger_reread_is_stable() {
    let db = test_db().await;
    let creator = seed_user(&db, "creator", "Creator").await;
    let tid = seed_tournament(&db, creator, "round_robin", 8).await;
    let ids = seed_roster(&db, tid, &["a", "b", "c", "d"]).await;

    ledger::create_match(&db, tid, 2, ids[0], Some(ids[2]), None).await.unwrap();
    ledger::create_match(&db, tid, 1, ids[0], Some(ids[1]), None).await.unwrap();
    ledger::create_match(&db, tid, 1, ids[2], Some(ids[3]), None).await.unwrap();

    let first = ledger::list_by_tournament(&db, tid).await.unwrap();
    let second = ledger::list_by_tournament(&db, tid).await.unwrap();
    let key = |ms: &[clanhall_backend::db::Match]| -> Vec<(i64, i64, i64)> {
        ms.iter().map(|m| (m.id, m.round, m.match_number)).collect()
    };
    assert_eq!(key(&first), key(&second));
    assert_eq!(
        key(&first),
        {
            let mut sorted = key(&first);
            sorted.sort_by_key(|(_, r, n)| (*r, *n));
            sorted
        }
    );
}
