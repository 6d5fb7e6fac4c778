mod common;

use common::*;
use hive_core::{ExpansionFlags, Outcome};
use hive_scraper::config::WindowSource;
use hive_scraper::context::RunContext;
use hive_scraper::db::matches;
use hive_scraper::identity::IdentityPool;
use hive_scraper::pipeline::{process_candidates, run_bga, StopReason};
use serde_json::json;
use tokio_util::sync::CancellationToken;

async fn context(fake: &FakeBga, emails: &[&str]) -> (RunContext<FakeBga>, sqlx::SqlitePool) {
    let store = memory_store().await;
    let pool = IdentityPool::new(fake.clone(), accounts(emails));
    let ctx = RunContext::load(&store, pool, fast_policy()).await.unwrap();
    (ctx, store)
}

#[tokio::test]
async fn test_lost_archive_is_skipped_and_run_continues() {
    let fake = FakeBga::with_replays([(43, replay_body(&["wG1", "bG1 wG1-"], Some("1001")))]);
    let (mut ctx, store) = context(&fake, &["a@hive.test"]).await;
    let identity = ctx.identities.next_identity().await.unwrap();

    let summary = process_candidates(&mut ctx, &store, identity, &[42, 43], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::Completed);
    assert_eq!(summary.skipped, vec![42]);
    assert_eq!(summary.processed, 1);
    assert!(summary.remaining.is_empty());
    assert_eq!(matches::get_match(&store, 42).await.unwrap(), None);

    let stored = matches::get_match(&store, 43).await.unwrap().unwrap();
    assert_eq!(stored.white, "1001");
    assert_eq!(stored.black, "2002");
    assert_eq!(stored.outcome, Outcome::Winner("1001".into()));
    assert_eq!(stored.expansions, ExpansionFlags::ALL);
}

#[tokio::test]
async fn test_exhausted_identity_rotates_and_retries_same_table() {
    let body = replay_body(&["wS1"], None);
    let fake = FakeBga::with_replays([(5, body.clone()), (7, body.clone()), (9, body)]);
    fake.state.borrow_mut().quota.insert("a@hive.test".into(), 1);
    let (mut ctx, store) = context(&fake, &["a@hive.test", "b@hive.test"]).await;
    let identity = ctx.identities.next_identity().await.unwrap();

    let summary = process_candidates(&mut ctx, &store, identity, &[5, 7, 9], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        fake.served(),
        vec![
            ("a@hive.test".to_string(), 5),
            ("b@hive.test".to_string(), 7),
            ("b@hive.test".to_string(), 9),
        ]
    );
    assert_eq!(summary.processed, 3);
    assert!(summary.skipped.is_empty());
    assert_eq!(
        summary.per_identity,
        vec![("a@hive.test".to_string(), 1), ("b@hive.test".to_string(), 2)]
    );
    assert_eq!(matches::get_match(&store, 7).await.unwrap().unwrap().outcome, Outcome::Draw);
}

#[tokio::test]
async fn test_pool_exhaustion_reports_remaining_ids() {
    let body = replay_body(&["wS1"], None);
    let fake = FakeBga::with_replays([(5, body.clone()), (7, body)]);
    {
        let mut state = fake.state.borrow_mut();
        state.quota.insert("a@hive.test".into(), 1);
        state.locked.insert("b@hive.test".into());
    }
    let (mut ctx, store) = context(&fake, &["a@hive.test", "b@hive.test"]).await;
    let identity = ctx.identities.next_identity().await.unwrap();

    let summary = process_candidates(&mut ctx, &store, identity, &[5, 7, 11], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::IdentitiesExhausted);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.remaining, vec![7, 11]);
    assert_eq!(matches::get_match(&store, 7).await.unwrap(), None);
    assert!(ctx.identities.next_identity().await.is_none());
}

#[tokio::test]
async fn test_transport_failure_reconnects_with_same_account() {
    let fake = FakeBga::with_replays([(5, replay_body(&["wS1"], None))]);
    fake.state.borrow_mut().transport_failures = 2;
    let (mut ctx, store) = context(&fake, &["a@hive.test", "b@hive.test"]).await;
    let identity = ctx.identities.next_identity().await.unwrap();

    let summary = process_candidates(&mut ctx, &store, identity, &[5], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::Completed);
    assert_eq!(summary.processed, 1);
    assert_eq!(fake.served(), vec![("a@hive.test".to_string(), 5)]);
    assert_eq!(
        fake.state.borrow().logins,
        vec!["a@hive.test", "a@hive.test", "a@hive.test"]
    );
}

#[tokio::test]
async fn test_persistent_transport_failure_halts() {
    let fake = FakeBga::with_replays([(5, replay_body(&["wS1"], None))]);
    fake.state.borrow_mut().transport_failures = 10;
    let (mut ctx, store) = context(&fake, &["a@hive.test"]).await;
    let identity = ctx.identities.next_identity().await.unwrap();

    let summary = process_candidates(&mut ctx, &store, identity, &[5, 6], &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(summary.stop, StopReason::Fatal(_)));
    assert_eq!(summary.remaining, vec![5, 6]);
}

#[tokio::test]
async fn test_non_json_answer_is_fatal() {
    let fake = FakeBga::with_replays([(5, replay_body(&["wS1"], None))]);
    fake.state.borrow_mut().broken_json.insert(6);
    let (mut ctx, store) = context(&fake, &["a@hive.test"]).await;
    let identity = ctx.identities.next_identity().await.unwrap();

    let summary = process_candidates(&mut ctx, &store, identity, &[5, 6, 7], &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(summary.stop, StopReason::Fatal(_)));
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.remaining, vec![6, 7]);
}

#[tokio::test]
async fn test_cancelled_run_stops_before_next_table() {
    let fake = FakeBga::with_replays([(5, replay_body(&["wS1"], None))]);
    let (mut ctx, store) = context(&fake, &["a@hive.test"]).await;
    let identity = ctx.identities.next_identity().await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = process_candidates(&mut ctx, &store, identity, &[5, 6], &cancel)
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::Interrupted);
    assert_eq!(summary.remaining, vec![5, 6]);
    assert!(fake.served().is_empty());
}

#[tokio::test]
async fn test_full_run_discovers_and_excludes_known_tables() {
    let body = replay_body(&["wS1", "bS1 wS1-"], Some("2002"));
    let fake = FakeBga::with_replays([
        (500_000_001, body.clone()),
        (500_000_002, body.clone()),
        (500_000_004, body.clone()),
    ]);
    {
        let mut state = fake.state.borrow_mut();
        state.ranking = vec!["84001".into(), "84002".into()];
        state.histories.insert(
            "84001".into(),
            vec![
                vec![
                    json!({"table_id": "500000001", "concede": "0"}),
                    json!({"table_id": "500000003", "concede": "1"}),
                ],
                vec![json!({"table_id": "500000002", "concede": "0"})],
            ],
        );
        state.histories.insert(
            "84002".into(),
            vec![vec![
                json!({"table_id": "500000002", "concede": "0"}),
                json!({"table_id": "500000004", "concede": "0"}),
            ]],
        );
    }

    let store = memory_store().await;
    // already collected in an earlier run
    matches::insert_match_data(
        &store,
        &hive_core::MatchData {
            record: hive_core::MatchRecord {
                table_id: 500_000_004,
                white: "1001".into(),
                black: "2002".into(),
                outcome: Outcome::Draw,
                expansions: ExpansionFlags::ALL,
            },
            actions: vec![hive_core::Action::placed(1, "wS1")],
        },
    )
    .await
    .unwrap();

    let pool = IdentityPool::new(fake.clone(), accounts(&["a@hive.test"]));
    let mut ctx = RunContext::load(&store, pool, fast_policy()).await.unwrap();
    let summary = run_bga(
        &mut ctx,
        &store,
        &WindowSource::CurrentSeason,
        2,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.stop, StopReason::Completed);
    assert_eq!(summary.processed, 2);
    let served: Vec<i64> = fake.served().into_iter().map(|(_, id)| id).collect();
    assert_eq!(served, vec![500_000_001, 500_000_002]);
    assert!(!served.contains(&500_000_003));
    assert!(!served.iter().any(|id| ctx.exclusion.contains(id)));

    // paging stops at the first empty page
    assert!(fake
        .state
        .borrow()
        .pages_requested
        .contains(&("84001".to_string(), 3)));
    assert!(hive_scraper::db::players::last_seen(&store, "84002")
        .await
        .unwrap()
        .is_some());
}

fn single_player_history(fake: &FakeBga) {
    let mut state = fake.state.borrow_mut();
    state.ranking = vec!["84001".into()];
    state.histories.insert(
        "84001".into(),
        vec![
            vec![json!({"table_id": "500000001", "concede": "0"})],
            vec![json!({"table_id": "500000002", "concede": "0"})],
        ],
    );
}

#[tokio::test]
async fn test_history_outage_reconnects_and_retries_the_page() {
    let body = replay_body(&["wS1"], None);
    let fake = FakeBga::with_replays([(500_000_001, body.clone()), (500_000_002, body)]);
    single_player_history(&fake);
    fake.state
        .borrow_mut()
        .history_failures
        .insert(("84001".into(), 2), 1);
    let (mut ctx, store) = context(&fake, &["a@hive.test"]).await;

    let summary = run_bga(
        &mut ctx,
        &store,
        &WindowSource::LastMonths(12),
        1,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.stop, StopReason::Completed);
    assert_eq!(summary.processed, 2);
    let state = fake.state.borrow();
    assert_eq!(state.logins, vec!["a@hive.test", "a@hive.test"]);
    let pages: Vec<u32> = state.pages_requested.iter().map(|(_, page)| *page).collect();
    assert_eq!(pages, vec![1, 2, 2, 3]);
}

#[tokio::test]
async fn test_history_outage_past_ceiling_ends_run_with_summary() {
    let fake = FakeBga::with_replays([(500_000_001, replay_body(&["wS1"], None))]);
    single_player_history(&fake);
    fake.state
        .borrow_mut()
        .history_failures
        .insert(("84001".into(), 1), 10);
    let (mut ctx, store) = context(&fake, &["a@hive.test", "b@hive.test"]).await;

    let summary = run_bga(
        &mut ctx,
        &store,
        &WindowSource::LastMonths(12),
        1,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(matches!(summary.stop, StopReason::Fatal(_)));
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.per_identity, vec![("a@hive.test".to_string(), 0)]);
    assert!(fake.served().is_empty());
    // first try plus two reconnects
    assert_eq!(fake.state.borrow().pages_requested.len(), 3);
}
