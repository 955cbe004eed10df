//! End-to-end scenario tests (§8) against a real Postgres schema, driving
//! [`Runner::run_once`] through the deterministic stub collaborators.
//! Skipped (not failed) when no test database is reachable, following the
//! teacher's `tests/postgresql_event_store_tests.rs` convention.

mod support;

use std::collections::HashMap;

use support::{
    event_count, notification_count, seed_idle_session, seed_stale_processing_session, session_state,
    setup,
};

fn fixtures(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[tokio::test]
#[ignore]
async fn s1_empty_to_one_shift_creates_version_event_and_notification() {
    let Some((pool, config)) = setup("s1") else {
        println!("skipping s1_empty_to_one_shift_creates_version_event_and_notification: no test database reachable");
        return;
    };

    let record = "10:00|14:00|Acme AB|Main|5|12345||Gothenburg";
    let mut conn = support::connect(&config.database_url, &config.db_schema);
    let (session_id, schedule_date) = seed_idle_session(&mut conn, "user-1", &["img-1"]);

    let runner = support::runner_with_fixtures(pool, config, fixtures(&[("img-1", record)]));
    runner.run_once().await.expect("run_once succeeds");

    let (state, error) = session_state(&mut conn, session_id);
    assert_eq!(state, "done");
    assert!(error.is_none());

    assert_eq!(support::version_count(&mut conn, "user-1", schedule_date), 1);
    assert_eq!(event_count(&mut conn, "user-1", schedule_date), 1);
    assert_eq!(notification_count(&mut conn, "user-1", schedule_date), 1);
}

#[tokio::test]
#[ignore]
async fn s2_time_move_adds_a_second_version_and_event() {
    let Some((pool, config)) = setup("s2") else {
        println!("skipping s2_time_move_adds_a_second_version_and_event: no test database reachable");
        return;
    };

    let baseline = "10:00|14:00|Acme AB|Main|5|12345||Gothenburg";
    let moved = "10:30|14:30|Acme AB|Main|5|12345||Gothenburg";

    let mut conn = support::connect(&config.database_url, &config.db_schema);
    let (session_1, schedule_date) = seed_idle_session(&mut conn, "user-2", &["img-1"]);

    let runner = support::runner_with_fixtures(pool.clone(), config.clone(), fixtures(&[("img-1", baseline)]));
    runner.run_once().await.expect("first run_once succeeds");
    assert_eq!(session_state(&mut conn, session_1).0, "done");

    let (session_2, _) = seed_idle_session(&mut conn, "user-2", &["img-2"]);
    let runner = support::runner_with_fixtures(pool, config, fixtures(&[("img-2", moved)]));
    runner.run_once().await.expect("second run_once succeeds");

    assert_eq!(session_state(&mut conn, session_2).0, "done");
    assert_eq!(support::version_count(&mut conn, "user-2", schedule_date), 2);
    // one `shift_added` from the baseline session, one `shift_time_changed` from the move
    assert_eq!(event_count(&mut conn, "user-2", schedule_date), 2);
    assert_eq!(notification_count(&mut conn, "user-2", schedule_date), 2);
}

#[tokio::test]
#[ignore]
async fn s3_no_change_session_is_deduped() {
    let Some((pool, config)) = setup("s3") else {
        println!("skipping s3_no_change_session_is_deduped: no test database reachable");
        return;
    };

    let record = "10:00|14:00|Acme AB|Main|5|12345||Gothenburg";

    let mut conn = support::connect(&config.database_url, &config.db_schema);
    let (session_1, schedule_date) = seed_idle_session(&mut conn, "user-3", &["img-1"]);

    let runner = support::runner_with_fixtures(pool.clone(), config.clone(), fixtures(&[("img-1", record)]));
    runner.run_once().await.expect("first run_once succeeds");
    assert_eq!(session_state(&mut conn, session_1).0, "done");

    // A second session observes the exact same shift: the canonical payload
    // hash is identical, so no new version, event, or notification appears.
    let (session_2, _) = seed_idle_session(&mut conn, "user-3", &["img-2"]);
    let runner = support::runner_with_fixtures(pool, config, fixtures(&[("img-2", record)]));
    runner.run_once().await.expect("second run_once succeeds");

    assert_eq!(session_state(&mut conn, session_2).0, "done");
    assert_eq!(support::version_count(&mut conn, "user-3", schedule_date), 1);
    assert_eq!(event_count(&mut conn, "user-3", schedule_date), 1);
    assert_eq!(notification_count(&mut conn, "user-3", schedule_date), 1);
}

#[tokio::test]
#[ignore]
async fn s4_simultaneous_changes_collapse_into_one_summary_notification() {
    let Some((pool, config)) = setup("s4") else {
        println!("skipping s4_simultaneous_changes_collapse_into_one_summary_notification: no test database reachable");
        return;
    };

    let mut conn = support::connect(&config.database_url, &config.db_schema);

    // Two shifts, below the configured summary threshold (3): each gets its
    // own `event` notification.
    let baseline_records = [
        "10:00|14:00|Acme AB|Main|5|12345||Gothenburg",
        "11:00|15:00|Bolag BC|Second|6|12345||Gothenburg",
    ];
    let (session_1, schedule_date) = seed_idle_session(&mut conn, "user-4", &["img-1", "img-2"]);
    let runner = support::runner_with_fixtures(
        pool.clone(),
        config.clone(),
        fixtures(&[("img-1", baseline_records[0]), ("img-2", baseline_records[1])]),
    );
    runner.run_once().await.expect("baseline run_once succeeds");
    assert_eq!(session_state(&mut conn, session_1).0, "done");
    assert_eq!(event_count(&mut conn, "user-4", schedule_date), 2);
    assert_eq!(notification_count(&mut conn, "user-4", schedule_date), 2);

    // The next session moves both existing shifts and adds a third: three
    // events land in the same transaction, at the configured summary
    // threshold, so the mapper collapses them into one summary notification
    // instead of three individual ones (§4.5 storm suppression).
    let storm_records = [
        "10:30|14:30|Acme AB|Main|5|12345||Gothenburg",
        "11:30|15:30|Bolag BC|Second|6|12345||Gothenburg",
        "12:00|16:00|Tredje DE|Third|7|12345||Gothenburg",
    ];
    let (session_2, _) = seed_idle_session(&mut conn, "user-4", &["img-3", "img-4", "img-5"]);
    let runner = support::runner_with_fixtures(
        pool,
        config,
        fixtures(&[("img-3", storm_records[0]), ("img-4", storm_records[1]), ("img-5", storm_records[2])]),
    );
    runner.run_once().await.expect("storm run_once succeeds");

    assert_eq!(session_state(&mut conn, session_2).0, "done");
    assert_eq!(event_count(&mut conn, "user-4", schedule_date), 5);
    // 2 individual notifications from the baseline + 1 summary from the storm
    assert_eq!(notification_count(&mut conn, "user-4", schedule_date), 3);
}

#[tokio::test]
#[ignore]
async fn s5_two_screenshots_of_the_same_shift_aggregate_to_one() {
    let Some((pool, config)) = setup("s5") else {
        println!("skipping s5_two_screenshots_of_the_same_shift_aggregate_to_one: no test database reachable");
        return;
    };

    // Two images report the same shift (same location, times within the
    // aggregator's tolerance) — the day's canonical payload should still
    // produce exactly one shift, and thus exactly one `shift_added` event.
    let record_a = "10:00|14:00|Acme AB|Main|5|12345||Gothenburg";
    let record_b = "10:02|14:01|Acme AB|Main|5|12345||Gothenburg";

    let mut conn = support::connect(&config.database_url, &config.db_schema);
    let (session_id, schedule_date) = seed_idle_session(&mut conn, "user-5", &["img-1", "img-2"]);

    let runner =
        support::runner_with_fixtures(pool, config, fixtures(&[("img-1", record_a), ("img-2", record_b)]));
    runner.run_once().await.expect("run_once succeeds");

    assert_eq!(session_state(&mut conn, session_id).0, "done");
    assert_eq!(support::version_count(&mut conn, "user-5", schedule_date), 1);
    assert_eq!(event_count(&mut conn, "user-5", schedule_date), 1);
}

#[tokio::test]
#[ignore]
async fn s6_stale_processing_lease_is_reclaimed_and_finalized() {
    let Some((pool, config)) = setup("s6") else {
        println!("skipping s6_stale_processing_lease_is_reclaimed_and_finalized: no test database reachable");
        return;
    };

    let record = "10:00|14:00|Acme AB|Main|5|12345||Gothenburg";

    let mut conn = support::connect(&config.database_url, &config.db_schema);
    let (session_id, schedule_date) = seed_stale_processing_session(&mut conn, "user-6", &["img-1"]);

    let before = session_state(&mut conn, session_id);
    assert_eq!(before.0, "processing");

    let runner = support::runner_with_fixtures(pool, config, fixtures(&[("img-1", record)]));
    runner.run_once().await.expect("run_once succeeds");

    let (state, error) = session_state(&mut conn, session_id);
    assert_eq!(state, "done");
    assert!(error.is_none());
    assert_eq!(support::version_count(&mut conn, "user-6", schedule_date), 1);
}
