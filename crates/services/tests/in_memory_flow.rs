mod common;

use std::time::Duration;

use common::{ESSAY, OPT_B, QUIZ, SINGLE, definition, init_tracing};
use quiz_core::model::{AnswerPatch, AttemptStatus};
use quiz_core::time::fixed_now;
use services::{AttemptLoopService, Clock, SubmitOutcome};
use storage::repository::{InMemoryRepository, Storage};
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn abandoned_attempt_resumes_from_last_autosave() {
    init_tracing();
    let repo = InMemoryRepository::new();
    repo.upsert_quiz(definition(QUIZ, Some(900))).unwrap();
    let engine = AttemptLoopService::from_storage(Clock::fixed(fixed_now()), &Storage::from_in_memory(&repo));

    let first = engine.start_attempt(QUIZ).await.unwrap();
    first.toggle_option(SINGLE, OPT_B, false).unwrap();
    sleep(Duration::from_millis(30_500)).await;
    first
        .update_answer(ESSAY, AnswerPatch::text("not saved yet"))
        .unwrap();
    let attempt_id = first.attempt_id();
    drop(first);

    // The store still holds the attempt open with the autosaved answers.
    assert_eq!(repo.attempt_status(attempt_id).unwrap(), AttemptStatus::InProgress);

    let resumed = engine.start_attempt(QUIZ).await.unwrap();
    assert_eq!(resumed.attempt_id(), attempt_id);
    assert!(
        resumed
            .answer(SINGLE)
            .unwrap()
            .selected_option_ids()
            .contains(&OPT_B)
    );
    assert_eq!(resumed.answer(ESSAY).unwrap().written_text(), "");

    let outcome = resumed.submit().await.unwrap();
    let SubmitOutcome::Submitted { status, result_ref } = outcome else {
        panic!("expected a submission, got {outcome:?}");
    };
    assert_eq!(status, AttemptStatus::Submitted);
    assert_eq!(repo.attempt_status(attempt_id).unwrap(), AttemptStatus::Submitted);
    assert_eq!(
        repo.receipt(attempt_id).unwrap().map(|r| r.result_ref),
        Some(result_ref)
    );

    let fresh = engine.start_attempt(QUIZ).await.unwrap();
    assert_ne!(fresh.attempt_id(), attempt_id);
    assert_eq!(fresh.time_remaining(), Some(900));
}
