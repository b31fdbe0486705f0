//! The `psytest take` command.
//!
//! Reads one command per line from stdin:
//!
//! | input            | effect                                  |
//! |------------------|-----------------------------------------|
//! | `1`..`9`         | choose that option for the current item |
//! | `n` / `p`        | next / previous question                |
//! | `s`              | submit the block (or recalled answer)   |
//! | `d`              | dismiss a memory stimulus               |
//! | `a <id> <n>`     | answer question `<id>` with option `n`  |
//! | `q`              | abandon the attempt                     |

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use psytest_core::model::{Choices, Question};
use psytest_core::session::{SessionCommand, SessionObserver, SessionOutcome, TestRunner, TestSession};
use psytest_core::timer::{Phase, PhaseEvent};
use psytest_core::TestError;

use super::format_secs;

pub async fn execute(test_id: String, seed: Option<u64>, config_path: Option<PathBuf>) -> Result<()> {
    let (config, repo) = super::open_repository(config_path.as_deref())?;
    let user = config.user.to_user();

    let mut runner_config = config.runner_config();
    if seed.is_some() {
        runner_config.seed = seed;
    }
    let runner = TestRunner::new(repo.clone(), repo, runner_config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let session = runner
        .prepare(&test_id, &user, &cancel)
        .await
        .with_context(|| format!("cannot start test '{test_id}'"))?;
    println!(
        "{} ({} questions in {} block(s))",
        session.instance().test_name,
        session.instance().len(),
        session.instance().blocks.len()
    );
    println!("Answer with 1-9, move with n/p, submit with s, quit with q.");

    let (tx, rx) = mpsc::channel(32);
    // stdin stays on a plain thread so a pending read never holds up shutdown
    std::thread::spawn(move || read_commands(tx));

    let observer = ConsoleObserver::default();
    let outcome = runner
        .run_prepared(session, rx, &observer, cancel)
        .await
        .context("attempt failed")?;

    match outcome {
        SessionOutcome::Completed(result) => {
            println!();
            super::results::print_result(&result);
            println!("Saved as {}", result.id);
        }
        SessionOutcome::Abandoned => println!("\nAttempt abandoned; nothing was saved."),
    }
    Ok(())
}

fn read_commands(tx: mpsc::Sender<SessionCommand>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_command(line) {
            Some(command) => {
                if tx.blocking_send(command).is_err() {
                    break;
                }
            }
            None => println!("  ? unknown input '{line}'"),
        }
    }
}

fn parse_command(line: &str) -> Option<SessionCommand> {
    let mut parts = line.split_whitespace();
    let command = match parts.next()? {
        "n" | "next" => SessionCommand::Next,
        "p" | "prev" | "previous" => SessionCommand::Previous,
        "s" | "submit" => SessionCommand::Submit,
        "d" | "dismiss" => SessionCommand::Dismiss,
        "q" | "quit" => SessionCommand::Cancel,
        "a" | "answer" => {
            let question_id = parts.next()?.to_string();
            let option = parse_option(parts.next()?)?;
            SessionCommand::Answer {
                question_id,
                option,
            }
        }
        other => SessionCommand::Choose(parse_option(other)?),
    };
    Some(command)
}

/// Options are numbered from 1 on screen.
fn parse_option(s: &str) -> Option<usize> {
    s.parse::<usize>().ok()?.checked_sub(1)
}

fn option_labels(question: &Question) -> Vec<&str> {
    match &question.choices {
        Choices::Text { options, .. } => options.iter().map(String::as_str).collect(),
        Choices::Image { images, .. } => images.iter().map(String::as_str).collect(),
        Choices::Flagged { answers } => answers.iter().map(|a| a.text.as_str()).collect(),
    }
}

/// Prints the attempt to stdout as it progresses.
#[derive(Default)]
struct ConsoleObserver {
    // segment whose header was printed last
    announced: Mutex<Option<usize>>,
}

impl ConsoleObserver {
    fn announced(&self) -> Option<usize> {
        *self.announced.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn announce(&self, session: &TestSession, segment: usize) {
        *self.announced.lock().unwrap_or_else(|p| p.into_inner()) = Some(segment);
        let instance = session.instance();
        let seg = &instance.segments[segment];
        let title = seg
            .block
            .and_then(|b| instance.blocks.get(b))
            .map_or_else(|| instance.test_name.clone(), |b| b.name.clone());
        let limit = seg
            .time_limit_secs
            .or_else(|| session.controller().test_remaining())
            .map(|s| format!(", {}", format_secs(s)))
            .unwrap_or_default();
        println!("\n== {title} ({} questions{limit}) ==", seg.len());
    }

    fn render_question(&self, session: &TestSession) {
        let Some(question) = session.current_question() else {
            return;
        };
        let position = session
            .open_range()
            .map(|r| format!("[{}/{}] ", session.cursor() - r.start + 1, r.len()))
            .unwrap_or_default();
        println!("\n{position}{}", question.prompt);
        if let Some(image) = &question.image {
            println!("    (image: {image})");
        }
        let selected = session.answers().get(&question.id);
        for (i, label) in option_labels(question).iter().enumerate() {
            let mark = if selected == Some(i) { '*' } else { ' ' };
            println!("  {mark} {}. {label}", i + 1);
        }
    }
}

impl SessionObserver for ConsoleObserver {
    fn on_event(&self, session: &TestSession, event: &PhaseEvent) {
        match event {
            PhaseEvent::PhaseStarted(phase) => match *phase {
                Phase::InBlock { segment } => {
                    self.announce(session, segment);
                    self.render_question(session);
                }
                Phase::ShowingStimulus { segment, question } => {
                    if self.announced() != Some(segment) {
                        self.announce(session, segment);
                    }
                    let prompt = &session.instance().questions[question].question;
                    println!("\nMemorize:");
                    println!("    {}", prompt.prompt);
                    if let Some(image) = &prompt.image {
                        println!("    (image: {image})");
                    }
                    println!("  (d to continue)");
                }
                Phase::Distraction { .. } => println!("\n..."),
                Phase::AnswerCapture { .. } => {
                    println!("\nRecall:");
                    self.render_question(session);
                }
                Phase::NotStarted | Phase::Finished { .. } => {}
            },
            PhaseEvent::BlockAnswered { .. } => println!("\nBlock submitted."),
            PhaseEvent::BlockExpired { .. } => println!("\nTime is up for this block."),
            PhaseEvent::TestExpired => println!("\nTime is up."),
            PhaseEvent::Finished(reason) => println!("Attempt {reason}."),
        }
    }

    fn on_command(&self, session: &TestSession) {
        // a submit moves on before the next header is printed
        if session.phase().segment() == self.announced()
            && matches!(
                session.phase(),
                Phase::InBlock { .. } | Phase::AnswerCapture { .. }
            )
        {
            self.render_question(session);
        }
    }

    fn on_tick(&self, session: &TestSession) {
        let remaining = session
            .controller()
            .phase_remaining()
            .or_else(|| session.controller().test_remaining());
        if let Some(secs) = remaining {
            if secs > 0 && (secs <= 10 || secs % 60 == 0) {
                println!("  {} left", format_secs(secs));
            }
        }
    }

    fn on_error(&self, error: &TestError) {
        println!("  ! {error}");
    }
}
