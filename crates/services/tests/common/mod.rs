#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{
    AnswerSnapshot, AssessmentDefinition, AttemptId, ChoiceOption, OptionId, Question,
    QuestionBody, QuestionId, QuizId,
};
use quiz_core::time::fixed_now;
use services::{AttemptEvent, AttemptLoopService, Clock};
use storage::repository::{
    AttemptStart, AttemptStore, QuizDefinitionRepository, StorageError, SubmissionReceipt,
};
use tokio::sync::broadcast;

pub const QUIZ: QuizId = QuizId::new(7);
pub const ATTEMPT: AttemptId = AttemptId::new(41);
pub const SINGLE: QuestionId = QuestionId::new(1);
pub const ESSAY: QuestionId = QuestionId::new(2);
pub const MULTI: QuestionId = QuestionId::new(3);
pub const OPT_A: OptionId = OptionId::new(10);
pub const OPT_B: OptionId = OptionId::new(11);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("services=debug")
        .try_init();
}

pub fn questions() -> Vec<Question> {
    vec![
        Question::new(
            SINGLE,
            "Pick one",
            1,
            QuestionBody::SingleChoice {
                options: vec![
                    ChoiceOption::new(OPT_A, "A"),
                    ChoiceOption::new(OPT_B, "B"),
                ],
            },
        )
        .unwrap(),
        Question::new(ESSAY, "Explain", 4, QuestionBody::LongText).unwrap(),
        Question::new(
            MULTI,
            "Pick any",
            2,
            QuestionBody::MultiChoice {
                options: vec![
                    ChoiceOption::new(OptionId::new(30), "x"),
                    ChoiceOption::new(OptionId::new(31), "y"),
                    ChoiceOption::new(OptionId::new(32), "z"),
                ],
            },
        )
        .unwrap(),
    ]
}

pub fn definition(quiz_id: QuizId, time_limit_secs: Option<u32>) -> AssessmentDefinition {
    AssessmentDefinition::new(quiz_id, "Engine quiz", questions(), time_limit_secs).unwrap()
}

pub fn fresh_start(time_remaining_secs: Option<u32>) -> AttemptStart {
    AttemptStart {
        attempt_id: ATTEMPT,
        quiz_id: QUIZ,
        questions: questions(),
        previous_answers: Vec::new(),
        time_remaining_secs,
    }
}

/// Everything the engine sent to the store, failed calls included.
#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub saves: Vec<Vec<AnswerSnapshot>>,
    pub submits: Vec<(Vec<AnswerSnapshot>, bool)>,
    /// Store traffic in arrival order: `save` when a save starts, `saved`
    /// when it returns and `submit` when a submission starts.
    pub order: Vec<&'static str>,
}

/// Attempt store with scripted failures and latency that records each call.
pub struct ScriptedStore {
    start: AttemptStart,
    definition: AssessmentDefinition,
    submit_delay: Duration,
    save_delay: Duration,
    submit_failures: AtomicUsize,
    save_failures: AtomicUsize,
    calls: Mutex<Calls>,
}

impl ScriptedStore {
    pub fn new(start: AttemptStart) -> Self {
        let definition = definition(start.quiz_id, start.time_remaining_secs.filter(|t| *t > 0));
        Self {
            start,
            definition,
            submit_delay: Duration::ZERO,
            save_delay: Duration::ZERO,
            submit_failures: AtomicUsize::new(0),
            save_failures: AtomicUsize::new(0),
            calls: Mutex::new(Calls::default()),
        }
    }

    pub fn timed(secs: u32) -> Self {
        Self::new(fresh_start(Some(secs)))
    }

    pub fn with_definition(mut self, definition: AssessmentDefinition) -> Self {
        self.definition = definition;
        self
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = delay;
        self
    }

    pub fn failing_submits(self, count: usize) -> Self {
        self.submit_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn failing_saves(self, count: usize) -> Self {
        self.save_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Calls {
        self.calls.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.calls.lock().unwrap().saves.len()
    }

    pub fn submit_count(&self) -> usize {
        self.calls.lock().unwrap().submits.len()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl AttemptStore for ScriptedStore {
    async fn start(&self, quiz_id: QuizId) -> Result<AttemptStart, StorageError> {
        if quiz_id != QUIZ {
            return Err(StorageError::NotFound);
        }
        Ok(self.start.clone())
    }

    async fn save_progress(
        &self,
        _attempt_id: AttemptId,
        answers: &[AnswerSnapshot],
    ) -> Result<(), StorageError> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.saves.push(answers.to_vec());
            calls.order.push("save");
        }
        if !self.save_delay.is_zero() {
            tokio::time::sleep(self.save_delay).await;
        }
        self.calls.lock().unwrap().order.push("saved");
        if Self::take_failure(&self.save_failures) {
            return Err(StorageError::Network("save dropped".into()));
        }
        Ok(())
    }

    async fn submit(
        &self,
        attempt_id: AttemptId,
        answers: &[AnswerSnapshot],
        is_auto_submit: bool,
    ) -> Result<SubmissionReceipt, StorageError> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.submits.push((answers.to_vec(), is_auto_submit));
            calls.order.push("submit");
        }
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        if Self::take_failure(&self.submit_failures) {
            return Err(StorageError::Network("gateway timeout".into()));
        }
        Ok(SubmissionReceipt {
            attempt_id,
            result_ref: format!("result-{attempt_id}"),
        })
    }
}

#[async_trait]
impl QuizDefinitionRepository for ScriptedStore {
    async fn get_by_id(&self, _quiz_id: QuizId) -> Result<AssessmentDefinition, StorageError> {
        Ok(self.definition.clone())
    }
}

pub fn service(store: &Arc<ScriptedStore>) -> AttemptLoopService {
    init_tracing();
    AttemptLoopService::new(Clock::fixed(fixed_now()), store.clone(), store.clone())
}

/// Collects every event currently buffered.
pub fn drain(rx: &mut broadcast::Receiver<AttemptEvent>) -> Vec<AttemptEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
    events
}

pub fn ticks(events: &[AttemptEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, AttemptEvent::Tick { .. }))
        .count()
}
