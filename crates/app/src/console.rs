use std::str::FromStr;

use quiz_core::model::{AnswerPatch, AttemptStatus, OptionId, QuestionId};
use services::{AttemptEngineError, AttemptEvent, AttemptHandle, SubmitOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Show,
    Pick(QuestionId, OptionId),
    Text(QuestionId, String),
    Flag(QuestionId),
    Summary,
    Submit,
    Retry,
    Quit,
    Help,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let mut words = rest.split_whitespace();

    match cmd {
        "show" | "s" => Ok(Input::Show),
        "pick" | "p" => {
            let q = next_id(&mut words, "question")?;
            let o = next_id(&mut words, "option")?;
            Ok(Input::Pick(q, o))
        }
        "text" | "t" => {
            let q = next_id(&mut words, "question")?;
            let text = rest
                .split_once(' ')
                .map_or("", |(_, text)| text.trim())
                .to_owned();
            Ok(Input::Text(q, text))
        }
        "flag" | "f" => Ok(Input::Flag(next_id(&mut words, "question")?)),
        "summary" => Ok(Input::Summary),
        "submit" => Ok(Input::Submit),
        "retry" => Ok(Input::Retry),
        "quit" | "q" => Ok(Input::Quit),
        "help" | "?" | "" => Ok(Input::Help),
        other => Err(format!("unknown command: {other}")),
    }
}

fn next_id<'a, T>(words: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = words.next().ok_or_else(|| format!("missing {what} id"))?;
    raw.parse().map_err(|e: T::Err| e.to_string())
}

fn print_help() {
    println!("commands:");
    println!("  show                 list questions and current answers");
    println!("  pick <q> <option>    toggle an option");
    println!("  text <q> <answer>    set a written answer");
    println!("  flag <q>             flag or unflag for review");
    println!("  summary              answered / unanswered / flagged counts");
    println!("  submit               submit the attempt");
    println!("  retry                resend a failed submission");
    println!("  quit                 abandon the attempt");
}

fn print_questions(handle: &AttemptHandle) {
    for question in handle.questions() {
        let answer = handle.answer(question.id()).unwrap_or_default();
        let flag = if handle.is_flagged(question.id()) { " [flagged]" } else { "" };
        println!(
            "Q{} ({}, {} pt){flag}: {}",
            question.id(),
            question.kind().as_str(),
            question.points(),
            question.prompt()
        );
        for option in question.options() {
            let mark = if answer.selected_option_ids().contains(&option.id) { "x" } else { " " };
            println!("   [{mark}] {} {}", option.id, option.label);
        }
        if question.kind().is_text() && !answer.written_text().is_empty() {
            println!("   > {}", answer.written_text());
        }
    }
}

fn format_remaining(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Prints one event. Returns `true` once the attempt reached a terminal status.
fn print_event(event: &AttemptEvent) -> bool {
    match event {
        AttemptEvent::Tick { remaining } => {
            if *remaining % 30 == 0 || *remaining <= 10 {
                println!("-- {} left", format_remaining(*remaining));
            }
        }
        AttemptEvent::Warning { threshold } => {
            println!("!! {} remaining", format_remaining(*threshold));
        }
        AttemptEvent::Autosaved { answered } => println!("-- saved ({answered} answered)"),
        AttemptEvent::AutosaveFailed { reason } => println!("-- autosave failed: {reason}"),
        AttemptEvent::StatusChanged { status } => {
            println!("== status: {status}");
            return status.is_terminal();
        }
        AttemptEvent::Submitted { result_ref, auto } => {
            let how = if *auto { "auto-submitted" } else { "submitted" };
            println!("== {how}, result: {result_ref}");
        }
    }
    false
}

fn report(result: Result<SubmitOutcome, AttemptEngineError>) {
    match result {
        Ok(SubmitOutcome::Submitted { .. }) => {}
        Ok(SubmitOutcome::AlreadyFinalizing) => println!("submission already in progress"),
        Err(AttemptEngineError::Network(e)) => {
            println!("submission failed ({e}); type `retry` to resend");
        }
        Err(e) => println!("error: {e}"),
    }
}

/// Drives an attempt from stdin until it is submitted or abandoned.
pub async fn run_attempt(handle: AttemptHandle) -> std::io::Result<()> {
    let mut events = handle.subscribe();
    println!(
        "{} (attempt {}), time left: {}",
        handle.title(),
        handle.attempt_id(),
        handle
            .time_remaining()
            .map_or_else(|| "untimed".to_owned(), format_remaining)
    );
    print_questions(&handle);
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if print_event(&event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "event printer lagged"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    handle.abandon().await;
                    break;
                };
                match parse_input(&line) {
                    Ok(input) => {
                        if apply(&handle, input).await {
                            break;
                        }
                    }
                    Err(msg) => println!("{msg}"),
                }
            }
        }
    }

    if let Some(result_ref) = handle.result_ref() {
        println!("result reference: {result_ref}");
    }
    Ok(())
}

/// Returns `true` when the loop should end.
async fn apply(handle: &AttemptHandle, input: Input) -> bool {
    let outcome = match input {
        Input::Show => {
            print_questions(handle);
            Ok(())
        }
        Input::Pick(q, o) => {
            let multiple = handle
                .questions()
                .iter()
                .find(|question| question.id() == q)
                .is_some_and(|question| question.kind().is_multiple());
            handle.toggle_option(q, o, multiple).map(|_| ())
        }
        Input::Text(q, text) => handle.update_answer(q, AnswerPatch::text(text)).map(|_| ()),
        Input::Flag(q) => handle.toggle_flag(q).map(|flagged| {
            println!("Q{q} {}", if flagged { "flagged" } else { "unflagged" });
        }),
        Input::Summary => {
            let s = handle.summary();
            println!(
                "{} answered, {} unanswered, {} flagged of {}",
                s.answered, s.unanswered, s.flagged, s.total
            );
            Ok(())
        }
        Input::Submit => {
            report(handle.submit().await);
            Ok(())
        }
        Input::Retry => {
            report(handle.retry_submission().await);
            Ok(())
        }
        Input::Quit => {
            let status = handle.abandon().await;
            println!("== status: {status}");
            return true;
        }
        Input::Help => {
            print_help();
            Ok(())
        }
    };
    if let Err(e) = outcome {
        println!("error: {e}");
    }
    false
}
