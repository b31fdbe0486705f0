//! Phase controller and countdown for a running attempt.
//!
//! [`PhaseController`] is a pure state machine: it only moves when it
//! receives a [`tick`](PhaseController::tick) or a user event, and it reports
//! every transition as a list of [`PhaseEvent`]s. [`Countdown`] is the owned
//! tokio task that produces the ticks.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::assembler::{Segment, TestInstance};
use crate::error::{Result, TestError};
use crate::model::{BlockKind, TimingMode};
use crate::results::FinishReason;

/// Where an attempt currently is.
///
/// `segment` indexes [`TestInstance::segments`]; `question` indexes
/// [`TestInstance::questions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    InBlock { segment: usize },
    ShowingStimulus { segment: usize, question: usize },
    Distraction { segment: usize, question: usize },
    AnswerCapture { segment: usize, question: usize },
    Finished { reason: FinishReason },
}

impl Phase {
    pub fn segment(&self) -> Option<usize> {
        match *self {
            Phase::InBlock { segment }
            | Phase::ShowingStimulus { segment, .. }
            | Phase::Distraction { segment, .. }
            | Phase::AnswerCapture { segment, .. } => Some(segment),
            Phase::NotStarted | Phase::Finished { .. } => None,
        }
    }

    /// The single question a memory phase is pinned to.
    pub fn question(&self) -> Option<usize> {
        match *self {
            Phase::ShowingStimulus { question, .. }
            | Phase::Distraction { question, .. }
            | Phase::AnswerCapture { question, .. } => Some(question),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Phase::Finished { .. })
    }
}

/// A transition reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    PhaseStarted(Phase),
    /// A segment was closed by submission (or answer-capture expiry).
    BlockAnswered { segment: usize },
    /// A segment's countdown reached zero.
    BlockExpired { segment: usize },
    /// The whole-test countdown reached zero.
    TestExpired,
    Finished(FinishReason),
}

/// Drives the phases of one attempt.
#[derive(Debug, Clone)]
pub struct PhaseController {
    segments: Vec<Segment>,
    whole_limit: Option<u64>,
    phase: Phase,
    phase_remaining: Option<u64>,
    // block limit of a memory segment, spanning its sub-phases
    block_remaining: Option<u64>,
    test_remaining: Option<u64>,
}

impl PhaseController {
    pub fn new(instance: &TestInstance) -> Self {
        let whole_limit = match instance.timing {
            TimingMode::PerBlock => None,
            TimingMode::Whole { time_limit_secs } => Some(time_limit_secs),
        };
        Self {
            segments: instance.segments.clone(),
            whole_limit,
            phase: Phase::NotStarted,
            phase_remaining: None,
            block_remaining: None,
            test_remaining: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_finished()
    }

    /// Seconds left on the current segment or memory phase countdown.
    pub fn phase_remaining(&self) -> Option<u64> {
        self.phase_remaining
    }

    /// Seconds left on the countdown of the current memory block.
    pub fn block_remaining(&self) -> Option<u64> {
        self.block_remaining
    }

    /// Seconds left on the whole-test countdown.
    pub fn test_remaining(&self) -> Option<u64> {
        self.test_remaining
    }

    /// Whether anything is counting down, i.e. whether ticks matter.
    pub fn is_timed(&self) -> bool {
        !self.is_finished()
            && (self.phase_remaining.is_some()
                || self.block_remaining.is_some()
                || self.test_remaining.is_some())
    }

    pub fn start(&mut self) -> Result<Vec<PhaseEvent>> {
        if self.phase != Phase::NotStarted {
            return Err(TestError::InvalidState(format!(
                "cannot start from {:?}",
                self.phase
            )));
        }
        let mut events = Vec::new();
        self.test_remaining = self.whole_limit;
        self.enter_segment(0, &mut events);
        Ok(events)
    }

    /// Advance all countdowns by one second.
    pub fn tick(&mut self) -> Vec<PhaseEvent> {
        let mut events = Vec::new();
        if matches!(self.phase, Phase::NotStarted | Phase::Finished { .. }) {
            return events;
        }

        if let Some(left) = self.test_remaining.as_mut() {
            *left = left.saturating_sub(1);
            if *left == 0 {
                tracing::info!("test countdown expired");
                events.push(PhaseEvent::TestExpired);
                self.finish(FinishReason::Expired, &mut events);
                return events;
            }
        }

        if let Some(left) = self.block_remaining.as_mut() {
            *left = left.saturating_sub(1);
            if *left == 0 {
                if let Some(segment) = self.phase.segment() {
                    self.expire_block(segment, &mut events);
                    return events;
                }
            }
        }

        if let Some(left) = self.phase_remaining.as_mut() {
            *left = left.saturating_sub(1);
            if *left == 0 {
                self.on_phase_timeout(&mut events);
            }
        }
        events
    }

    /// Close the current standard segment on user submission.
    pub fn submit_block(&mut self) -> Result<Vec<PhaseEvent>> {
        let Phase::InBlock { segment } = self.phase else {
            return Err(TestError::InvalidState(format!(
                "no open block to submit in {:?}",
                self.phase
            )));
        };
        let mut events = vec![PhaseEvent::BlockAnswered { segment }];
        self.leave_segment(segment, FinishReason::Completed, &mut events);
        Ok(events)
    }

    /// End the stimulus early. The distraction phase still runs in full.
    pub fn dismiss_stimulus(&mut self) -> Result<Vec<PhaseEvent>> {
        let Phase::ShowingStimulus { segment, question } = self.phase else {
            return Err(TestError::InvalidState(format!(
                "no stimulus showing in {:?}",
                self.phase
            )));
        };
        let mut events = Vec::new();
        self.enter_distraction(segment, question, &mut events);
        Ok(events)
    }

    /// The user confirmed the answer of the current memory question.
    pub fn answer_captured(&mut self) -> Result<Vec<PhaseEvent>> {
        let Phase::AnswerCapture { segment, question } = self.phase else {
            return Err(TestError::InvalidState(format!(
                "not capturing an answer in {:?}",
                self.phase
            )));
        };
        let mut events = Vec::new();
        self.next_memory_question(segment, question, &mut events);
        Ok(events)
    }

    /// Abandon the attempt. A no-op once finished.
    pub fn cancel(&mut self) -> Vec<PhaseEvent> {
        let mut events = Vec::new();
        if !self.is_finished() {
            self.finish(FinishReason::Cancelled, &mut events);
        }
        events
    }

    fn on_phase_timeout(&mut self, events: &mut Vec<PhaseEvent>) {
        match self.phase {
            Phase::InBlock { segment } => self.expire_block(segment, events),
            Phase::ShowingStimulus { segment, question } => {
                self.enter_distraction(segment, question, events);
            }
            Phase::Distraction { segment, question } => {
                let secs = self.memory_secs(segment).2;
                self.set_phase(Phase::AnswerCapture { segment, question }, Some(secs), events);
            }
            Phase::AnswerCapture { segment, question } => {
                self.next_memory_question(segment, question, events);
            }
            Phase::NotStarted | Phase::Finished { .. } => {}
        }
    }

    fn enter_segment(&mut self, index: usize, events: &mut Vec<PhaseEvent>) {
        let mut index = index;
        while self.segments.get(index).is_some_and(Segment::is_empty) {
            tracing::debug!(segment = index, "skipping empty segment");
            index += 1;
        }
        let Some(segment) = self.segments.get(index) else {
            self.finish(FinishReason::Completed, events);
            return;
        };

        let limit = segment.time_limit_secs;
        let question = segment.range.start;
        let kind = segment.kind;
        match kind {
            BlockKind::Standard => {
                self.block_remaining = None;
                self.set_phase(Phase::InBlock { segment: index }, limit, events);
            }
            BlockKind::Memory { .. } if limit == Some(0) => {
                self.block_remaining = None;
                self.expire_block(index, events);
            }
            BlockKind::Memory { stimulus_secs, .. } => {
                self.block_remaining = limit;
                self.set_phase(
                    Phase::ShowingStimulus {
                        segment: index,
                        question,
                    },
                    Some(stimulus_secs),
                    events,
                );
            }
        }
    }

    fn expire_block(&mut self, segment: usize, events: &mut Vec<PhaseEvent>) {
        tracing::info!(segment, "block countdown expired");
        events.push(PhaseEvent::BlockExpired { segment });
        self.leave_segment(segment, FinishReason::Expired, events);
    }

    /// Move past `segment`; finishing with `last_reason` if it was the last.
    fn leave_segment(
        &mut self,
        segment: usize,
        last_reason: FinishReason,
        events: &mut Vec<PhaseEvent>,
    ) {
        let has_more = self.segments[segment + 1..].iter().any(|s| !s.is_empty());
        if has_more {
            self.enter_segment(segment + 1, events);
        } else {
            self.finish(last_reason, events);
        }
    }

    fn enter_distraction(&mut self, segment: usize, question: usize, events: &mut Vec<PhaseEvent>) {
        let secs = self.memory_secs(segment).1;
        self.set_phase(Phase::Distraction { segment, question }, Some(secs), events);
    }

    fn next_memory_question(
        &mut self,
        segment: usize,
        question: usize,
        events: &mut Vec<PhaseEvent>,
    ) {
        let next = question + 1;
        if next < self.segments[segment].range.end {
            let secs = self.memory_secs(segment).0;
            self.set_phase(
                Phase::ShowingStimulus {
                    segment,
                    question: next,
                },
                Some(secs),
                events,
            );
        } else {
            events.push(PhaseEvent::BlockAnswered { segment });
            self.leave_segment(segment, FinishReason::Completed, events);
        }
    }

    fn memory_secs(&self, segment: usize) -> (u64, u64, u64) {
        match self.segments[segment].kind {
            BlockKind::Memory {
                stimulus_secs,
                distraction_secs,
                answer_secs,
            } => (stimulus_secs, distraction_secs, answer_secs),
            BlockKind::Standard => (0, 0, 0),
        }
    }

    fn set_phase(&mut self, phase: Phase, secs: Option<u64>, events: &mut Vec<PhaseEvent>) {
        tracing::debug!(?phase, ?secs, "phase started");
        self.phase = phase;
        self.phase_remaining = secs;
        events.push(PhaseEvent::PhaseStarted(phase));
        // a zero-length phase times out immediately
        if secs == Some(0) {
            self.on_phase_timeout(events);
        }
    }

    fn finish(&mut self, reason: FinishReason, events: &mut Vec<PhaseEvent>) {
        tracing::info!(%reason, "attempt finished");
        self.phase = Phase::Finished { reason };
        self.phase_remaining = None;
        self.block_remaining = None;
        self.test_remaining = None;
        events.push(PhaseEvent::Finished(reason));
    }
}

/// An owned periodic tick source.
///
/// The background task is aborted by [`stop`](Countdown::stop) or when the
/// countdown is dropped, whichever comes first.
#[derive(Debug)]
pub struct Countdown {
    handle: Option<JoinHandle<()>>,
}

impl Countdown {
    /// Spawn a task sending one tick per `period`. The first tick arrives
    /// one full period after the call.
    pub fn start(period: Duration) -> (Self, mpsc::Receiver<u64>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            let mut seq = 0u64;
            loop {
                interval.tick().await;
                seq += 1;
                if tx.send(seq).await.is_err() {
                    break;
                }
            }
        });
        (
            Self {
                handle: Some(handle),
            },
            rx,
        )
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Abort the tick task. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("countdown stopped");
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}
