mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    ATTEMPT, ESSAY, OPT_A, SINGLE, ScriptedStore, drain, fresh_start, service, ticks,
};
use quiz_core::model::{AnswerPatch, AnswerSnapshot, AttemptStatus, EngineSettings};
use services::AttemptEvent;
use tokio::time::{Instant, sleep};

#[tokio::test(start_paused = true)]
async fn sixty_five_second_attempt_warns_then_auto_submits_once() {
    let store = Arc::new(ScriptedStore::timed(65));
    let handle = service(&store).start_attempt(common::QUIZ).await.unwrap();
    let mut rx = handle.subscribe();
    assert_eq!(handle.summary().total, 3);

    sleep(Duration::from_millis(65_500)).await;

    let calls = store.calls();
    assert_eq!(calls.submits.len(), 1);
    assert!(calls.submits[0].1, "timer expiry submits with the auto flag");
    assert_eq!(calls.saves.len(), 2, "autosaves at 30 s and 60 s");
    assert_eq!(handle.status(), AttemptStatus::AutoSubmitted);
    assert_eq!(handle.time_remaining(), Some(0));
    assert_eq!(handle.result_ref().as_deref(), Some("result-41"));

    let events = drain(&mut rx);
    assert_eq!(ticks(&events), 65);

    let mut seen_ticks = 0;
    let mut warnings = Vec::new();
    for event in &events {
        match event {
            AttemptEvent::Tick { .. } => seen_ticks += 1,
            AttemptEvent::Warning { threshold } => warnings.push((*threshold, seen_ticks)),
            _ => {}
        }
    }
    // Below 300 s from the start, so that latch fires on the first tick.
    assert_eq!(warnings, vec![(300, 1), (60, 5)]);
    assert!(events.contains(&AttemptEvent::Submitted {
        result_ref: "result-41".into(),
        auto: true,
    }));

    sleep(Duration::from_secs(120)).await;
    assert_eq!(store.save_count(), 2);
    assert_eq!(store.submit_count(), 1);
    assert_eq!(ticks(&drain(&mut rx)), 0);
}

#[tokio::test(start_paused = true)]
async fn autosave_sends_full_snapshot_each_period() {
    let store = Arc::new(ScriptedStore::timed(600));
    let handle = service(&store).start_attempt(common::QUIZ).await.unwrap();

    handle.toggle_option(SINGLE, OPT_A, false).unwrap();
    sleep(Duration::from_millis(30_500)).await;
    handle
        .update_answer(ESSAY, AnswerPatch::text("ownership moves values"))
        .unwrap();
    sleep(Duration::from_secs(30)).await;

    let saves = store.calls().saves;
    assert_eq!(saves.len(), 2);
    assert!(saves.iter().all(|s| s.len() == 3));
    assert_eq!(saves[0][0].selected_option_ids, vec![OPT_A]);
    assert!(saves[0][1].written_text.is_empty());
    assert_eq!(saves[1][1].written_text, "ownership moves values");
    assert_eq!(saves[1][0].selected_option_ids, vec![OPT_A]);
}

#[tokio::test(start_paused = true)]
async fn failed_autosave_is_reported_and_next_cycle_resends() {
    let store = Arc::new(ScriptedStore::timed(600).failing_saves(1));
    let handle = service(&store).start_attempt(common::QUIZ).await.unwrap();
    let mut rx = handle.subscribe();

    sleep(Duration::from_millis(30_500)).await;
    let events = drain(&mut rx);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, AttemptEvent::AutosaveFailed { .. }))
    );
    assert_eq!(handle.status(), AttemptStatus::InProgress);

    handle.toggle_option(SINGLE, OPT_A, false).unwrap();
    sleep(Duration::from_secs(30)).await;
    let events = drain(&mut rx);
    assert!(events.contains(&AttemptEvent::Autosaved { answered: 1 }));

    let saves = store.calls().saves;
    assert_eq!(saves.len(), 2);
    assert_eq!(saves[1][0].selected_option_ids, vec![OPT_A]);
}

#[tokio::test(start_paused = true)]
async fn untimed_attempt_has_no_countdown_but_still_autosaves() {
    let store = Arc::new(ScriptedStore::new(fresh_start(None)));
    let handle = service(&store).start_attempt(common::QUIZ).await.unwrap();
    let mut rx = handle.subscribe();

    sleep(Duration::from_secs(61)).await;
    assert_eq!(handle.time_remaining(), None);
    assert_eq!(store.save_count(), 2);
    assert_eq!(ticks(&drain(&mut rx)), 0);
    assert_eq!(handle.status(), AttemptStatus::InProgress);
}

#[tokio::test(start_paused = true)]
async fn resumed_attempt_out_of_time_submits_immediately() {
    let mut start = fresh_start(Some(0));
    start.previous_answers = vec![AnswerSnapshot {
        question_id: SINGLE,
        selected_option_ids: vec![OPT_A],
        written_text: String::new(),
    }];
    let store = Arc::new(ScriptedStore::new(start));
    let handle = service(&store).start_attempt(common::QUIZ).await.unwrap();

    sleep(Duration::from_millis(10)).await;
    let calls = store.calls();
    assert_eq!(calls.submits.len(), 1);
    assert!(calls.submits[0].1);
    assert_eq!(calls.submits[0].0[0].selected_option_ids, vec![OPT_A]);
    assert_eq!(handle.status(), AttemptStatus::AutoSubmitted);
    assert_eq!(handle.attempt_id(), ATTEMPT);
}

#[tokio::test(start_paused = true)]
async fn custom_settings_drive_tick_and_warning_cadence() {
    let store = Arc::new(ScriptedStore::timed(20));
    let settings = EngineSettings::new(
        Duration::from_secs(2),
        Duration::from_secs(10),
        vec![10, 15],
    )
    .unwrap();
    let handle = service(&store)
        .with_settings(settings)
        .start_attempt(common::QUIZ)
        .await
        .unwrap();
    let mut rx = handle.subscribe();

    // Each tick still consumes one second of attempt time.
    sleep(Duration::from_millis(10_500)).await;
    assert_eq!(handle.time_remaining(), Some(15));
    let warnings: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            AttemptEvent::Warning { threshold } => Some(threshold),
            _ => None,
        })
        .collect();
    assert_eq!(warnings, vec![15]);
    assert_eq!(store.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn user_submit_waits_for_in_flight_autosave() {
    let store = Arc::new(ScriptedStore::timed(600).with_save_delay(Duration::from_secs(4)));
    let handle = service(&store).start_attempt(common::QUIZ).await.unwrap();
    let opened = Instant::now();
    handle.toggle_option(SINGLE, OPT_A, false).unwrap();

    // The 30 s save is still with the store until 34 s.
    sleep(Duration::from_millis(31_500)).await;
    assert_eq!(store.calls().order, vec!["save"]);

    handle.submit().await.unwrap();
    assert!(opened.elapsed() >= Duration::from_secs(34));
    assert_eq!(store.calls().order, vec!["save", "saved", "submit"]);

    sleep(Duration::from_secs(120)).await;
    let calls = store.calls();
    assert_eq!(calls.order, vec!["save", "saved", "submit"]);
    assert_eq!(calls.submits[0].0[0].selected_option_ids, vec![OPT_A]);
    assert_eq!(handle.status(), AttemptStatus::Submitted);
}

#[tokio::test(start_paused = true)]
async fn auto_submit_waits_for_in_flight_autosave() {
    let store = Arc::new(ScriptedStore::timed(32).with_save_delay(Duration::from_secs(5)));
    let handle = service(&store).start_attempt(common::QUIZ).await.unwrap();

    // Save runs 30 s..35 s; time runs out at 32 s.
    sleep(Duration::from_millis(33_500)).await;
    assert_eq!(store.calls().order, vec!["save"]);
    assert_eq!(handle.time_remaining(), Some(0));
    assert_eq!(handle.status(), AttemptStatus::InProgress);

    sleep(Duration::from_secs(2)).await;
    let calls = store.calls();
    assert_eq!(calls.order, vec!["save", "saved", "submit"]);
    assert!(calls.submits[0].1);
    assert_eq!(handle.status(), AttemptStatus::AutoSubmitted);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(store.save_count(), 1);
    assert_eq!(store.submit_count(), 1);
}
