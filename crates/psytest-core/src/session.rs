//! One attempt of a test, from first question to persisted result.
//!
//! [`TestSession`] is the synchronous core: it combines the instance, the
//! answer collector and the phase controller and enforces navigation and
//! submission rules. [`run_session`] is the async event loop that feeds it
//! countdown ticks and user commands, and [`TestRunner`] wires both to the
//! collaborators.

use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::access::check_access;
use crate::answers::AnswerCollector;
use crate::assembler::{TestAssembler, TestInstance};
use crate::error::{Result, TestError};
use crate::model::{Question, User};
use crate::results::{FinishReason, TestResult};
use crate::scorer::score;
use crate::timer::{Countdown, Phase, PhaseController, PhaseEvent};
use crate::traits::{QuestionPool, ResultStore};

/// A user action delivered to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Select `option` for `question_id`.
    Answer { question_id: String, option: usize },
    /// Select `option` for the question under the cursor.
    Choose(usize),
    Next,
    Previous,
    /// Submit the open block (or confirm a memory answer).
    Submit,
    /// Dismiss a memory stimulus early.
    Dismiss,
    Cancel,
}

/// State of one attempt.
#[derive(Debug, Clone)]
pub struct TestSession {
    instance: TestInstance,
    answers: AnswerCollector,
    controller: PhaseController,
    cursor: usize,
    user_id: String,
    started_at: Option<DateTime<Utc>>,
}

impl TestSession {
    pub fn new(instance: TestInstance, user_id: impl Into<String>) -> Self {
        let controller = PhaseController::new(&instance);
        Self {
            instance,
            answers: AnswerCollector::new(),
            controller,
            cursor: 0,
            user_id: user_id.into(),
            started_at: None,
        }
    }

    pub fn instance(&self) -> &TestInstance {
        &self.instance
    }

    pub fn answers(&self) -> &AnswerCollector {
        &self.answers
    }

    pub fn controller(&self) -> &PhaseController {
        &self.controller
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    pub fn is_finished(&self) -> bool {
        self.controller.is_finished()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Index of the question under the cursor.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The question under the cursor while a segment is open.
    pub fn current_question(&self) -> Option<&Question> {
        self.open_range()?;
        self.instance.questions.get(self.cursor).map(|q| &q.question)
    }

    /// Questions reachable in the current phase.
    pub fn open_range(&self) -> Option<Range<usize>> {
        let phase = self.phase();
        if let Some(question) = phase.question() {
            return Some(question..question + 1);
        }
        phase
            .segment()
            .map(|s| self.instance.segments[s].range.clone())
    }

    /// Start the controller and stamp the start time.
    pub fn start(&mut self) -> Result<Vec<PhaseEvent>> {
        let events = self.controller.start()?;
        self.started_at = Some(Utc::now());
        tracing::info!(
            test = %self.instance.test_id,
            user = %self.user_id,
            questions = self.instance.len(),
            "session started"
        );
        self.sync_cursor();
        Ok(events)
    }

    /// Record an answer for a question of the open segment.
    ///
    /// During memory blocks answers are only accepted in the answer capture
    /// phase, and only for the pinned question.
    pub fn answer(&mut self, question_id: &str, option: usize) -> Result<()> {
        let range = self.open_range().ok_or_else(|| {
            TestError::InvalidState(format!("no open questions in {:?}", self.phase()))
        })?;
        if matches!(
            self.phase(),
            Phase::ShowingStimulus { .. } | Phase::Distraction { .. }
        ) {
            return Err(TestError::InvalidState(
                "answers are not accepted before the recall phase".into(),
            ));
        }
        let entry = self.instance.questions[range]
            .iter()
            .find(|q| q.question.id == question_id)
            .ok_or_else(|| {
                TestError::InvalidState(format!("question '{question_id}' is not open"))
            })?;
        self.answers.record(&entry.question, option)
    }

    /// Record `option` for the question under the cursor.
    pub fn choose(&mut self, option: usize) -> Result<()> {
        let id = self
            .current_question()
            .map(|q| q.id.clone())
            .ok_or_else(|| TestError::InvalidState("no question under the cursor".into()))?;
        self.answer(&id, option)
    }

    /// Move the cursor forward. Returns `false` at the end of the segment.
    ///
    /// Under strict navigation the current question must be answered before
    /// the cursor moves.
    pub fn next(&mut self) -> Result<bool> {
        let range = self.navigable_range()?;
        if self.cursor + 1 >= range.end {
            return Ok(false);
        }
        if self.instance.strict_navigation {
            let id = &self.instance.questions[self.cursor].question.id;
            if !self.answers.is_answered(id) {
                return Err(TestError::MissingAnswers { unanswered: 1 });
            }
        }
        self.cursor += 1;
        Ok(true)
    }

    /// Move the cursor back. Returns `false` at the start of the segment.
    pub fn previous(&mut self) -> Result<bool> {
        let range = self.navigable_range()?;
        if self.cursor > range.start {
            self.cursor -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Submit the open segment, refusing while any of it is unanswered.
    pub fn submit(&mut self) -> Result<Vec<PhaseEvent>> {
        let range = self
            .open_range()
            .ok_or_else(|| TestError::InvalidState(format!("nothing to submit in {:?}", self.phase())))?;
        let ids = self.instance.question_ids(range);
        let events = match self.phase() {
            Phase::InBlock { .. } => {
                self.answers.ensure_complete(&ids)?;
                self.controller.submit_block()?
            }
            Phase::AnswerCapture { .. } => {
                self.answers.ensure_complete(&ids)?;
                self.controller.answer_captured()?
            }
            other => {
                return Err(TestError::InvalidState(format!(
                    "cannot submit during {other:?}"
                )))
            }
        };
        self.sync_cursor();
        Ok(events)
    }

    pub fn dismiss(&mut self) -> Result<Vec<PhaseEvent>> {
        let events = self.controller.dismiss_stimulus()?;
        self.sync_cursor();
        Ok(events)
    }

    /// Forward one countdown tick. Expiry bypasses the unanswered check.
    pub fn tick(&mut self) -> Vec<PhaseEvent> {
        let events = self.controller.tick();
        if !events.is_empty() {
            self.sync_cursor();
        }
        events
    }

    pub fn cancel(&mut self) -> Vec<PhaseEvent> {
        self.controller.cancel()
    }

    /// Apply a user command.
    pub fn apply(&mut self, command: SessionCommand) -> Result<Vec<PhaseEvent>> {
        match command {
            SessionCommand::Answer {
                question_id,
                option,
            } => self.answer(&question_id, option).map(|()| Vec::new()),
            SessionCommand::Choose(option) => self.choose(option).map(|()| Vec::new()),
            SessionCommand::Next => self.next().map(|_| Vec::new()),
            SessionCommand::Previous => self.previous().map(|_| Vec::new()),
            SessionCommand::Submit => self.submit(),
            SessionCommand::Dismiss => self.dismiss(),
            SessionCommand::Cancel => Ok(self.cancel()),
        }
    }

    /// Score the finished attempt and build its result.
    pub fn finish(self, finished_at: DateTime<Utc>) -> Result<TestResult> {
        let reason = match self.phase() {
            Phase::Finished {
                reason: FinishReason::Cancelled,
            } => return Err(TestError::Cancelled),
            Phase::Finished { reason } => reason,
            other => {
                return Err(TestError::InvalidState(format!(
                    "attempt still running in {other:?}"
                )))
            }
        };
        let started_at = self.started_at.unwrap_or(finished_at);
        let sheet = score(&self.instance, &self.answers);
        Ok(TestResult::from_sheet(
            sheet,
            self.user_id,
            self.answers.into_map(),
            reason,
            started_at,
            finished_at,
        ))
    }

    fn navigable_range(&self) -> Result<Range<usize>> {
        match self.phase() {
            Phase::InBlock { segment } => Ok(self.instance.segments[segment].range.clone()),
            other => Err(TestError::InvalidState(format!(
                "navigation unavailable during {other:?}"
            ))),
        }
    }

    fn sync_cursor(&mut self) {
        if let Some(range) = self.open_range() {
            if !range.contains(&self.cursor) {
                self.cursor = range.start;
            }
        }
    }
}

/// How a session loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(TestResult),
    Abandoned,
}

/// Callbacks for whoever presents a running session.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, session: &TestSession, event: &PhaseEvent);
    /// A command was applied successfully.
    fn on_command(&self, session: &TestSession);
    fn on_tick(&self, session: &TestSession);
    /// A command was refused; the session keeps running.
    fn on_error(&self, error: &TestError);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_event(&self, _: &TestSession, _: &PhaseEvent) {}
    fn on_command(&self, _: &TestSession) {}
    fn on_tick(&self, _: &TestSession) {}
    fn on_error(&self, _: &TestError) {}
}

fn report(observer: &dyn SessionObserver, session: &TestSession, events: &[PhaseEvent]) {
    for event in events {
        observer.on_event(session, event);
    }
}

/// Drive `session` until it finishes, is cancelled, or its command source
/// goes away.
///
/// The countdown is owned by this function and stopped on every exit path.
/// It is restarted whenever a command opens a new phase, so that phase gets
/// whole seconds from the moment it starts. A closed command channel is
/// treated as the user navigating away.
pub async fn run_session(
    mut session: TestSession,
    mut commands: mpsc::Receiver<SessionCommand>,
    observer: &dyn SessionObserver,
    tick: Duration,
    cancel: CancellationToken,
) -> Result<SessionOutcome> {
    let events = session.start()?;
    report(observer, &session, &events);

    let (mut countdown, mut ticks) = Countdown::start(tick);

    while !session.is_finished() {
        let mut realign = false;
        tokio::select! {
            _ = cancel.cancelled() => {
                let events = session.cancel();
                report(observer, &session, &events);
            }
            Some(_) = ticks.recv() => {
                let events = session.tick();
                report(observer, &session, &events);
                observer.on_tick(&session);
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    tracing::info!("command source closed, abandoning session");
                    let events = session.cancel();
                    report(observer, &session, &events);
                    continue;
                };
                match session.apply(command) {
                    Ok(events) => {
                        realign = events
                            .iter()
                            .any(|e| matches!(e, PhaseEvent::PhaseStarted(_)));
                        observer.on_command(&session);
                        report(observer, &session, &events);
                    }
                    Err(e) => {
                        tracing::debug!("command refused: {e}");
                        observer.on_error(&e);
                    }
                }
            }
        }
        if realign && !session.is_finished() {
            countdown.stop();
            (countdown, ticks) = Countdown::start(tick);
        }
    }
    countdown.stop();

    match session.finish(Utc::now()) {
        Ok(result) => Ok(SessionOutcome::Completed(result)),
        Err(TestError::Cancelled) => Ok(SessionOutcome::Abandoned),
        Err(e) => Err(e),
    }
}

/// Await `fut` unless `cancel` fires first.
///
/// Nothing is polled once the token is cancelled, so an abandoned session
/// never writes a result or applies a stale update.
pub async fn with_cancellation<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(TestError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TestError::Cancelled),
        result = fut => result,
    }
}

/// Configuration for [`TestRunner`].
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Countdown period; one period is one second of test time.
    pub tick: Duration,
    /// Fixed seed for question sampling.
    pub seed: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            seed: None,
        }
    }
}

/// Loads, runs and persists attempts.
pub struct TestRunner {
    pool: Arc<dyn QuestionPool>,
    results: Arc<dyn ResultStore>,
    config: RunnerConfig,
}

impl TestRunner {
    pub fn new(
        pool: Arc<dyn QuestionPool>,
        results: Arc<dyn ResultStore>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            pool,
            results,
            config,
        }
    }

    /// Fetch `test_id`, check access and assemble a fresh instance.
    pub async fn prepare(
        &self,
        test_id: &str,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<TestSession> {
        let test = with_cancellation(cancel, self.pool.fetch_test(test_id)).await?;
        check_access(&test, user)?;

        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let assembler = TestAssembler::new(Arc::clone(&self.pool));
        let instance = with_cancellation(cancel, assembler.assemble(&test, &mut rng)).await?;
        Ok(TestSession::new(instance, user.id.clone()))
    }

    /// Run a full attempt and persist its result.
    pub async fn run(
        &self,
        test_id: &str,
        user: &User,
        commands: mpsc::Receiver<SessionCommand>,
        observer: &dyn SessionObserver,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome> {
        let session = self.prepare(test_id, user, &cancel).await?;
        self.run_prepared(session, commands, observer, cancel).await
    }

    /// Run an already prepared session and persist its result.
    pub async fn run_prepared(
        &self,
        session: TestSession,
        commands: mpsc::Receiver<SessionCommand>,
        observer: &dyn SessionObserver,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome> {
        let outcome = run_session(session, commands, observer, self.config.tick, cancel.clone()).await?;
        if let SessionOutcome::Completed(result) = &outcome {
            let id = with_cancellation(&cancel, self.results.create_result(result)).await?;
            tracing::info!(
                result = %id,
                test = %result.test_id,
                score = result.aggregate_score,
                "result saved"
            );
        }
        Ok(outcome)
    }
}
