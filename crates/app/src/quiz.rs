//! Interactive quiz in the terminal.
//!
//! Input is read line by line while a [`TimerDriver`] ticks once per second;
//! whichever arrives first is applied to the session.

use std::error::Error;

use services::quiz::{QuizLoopService, QuizSession, QuizStep, QuizTick, TimerDriver};
use services::RecordedQuiz;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;
use tutor_core::model::{OPTION_COUNT, UserId};

use crate::commands::{CommandResult, user_facing};

const LABELS: [char; OPTION_COUNT] = ['A', 'B', 'C', 'D'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Select(u8),
    Next,
    Previous,
    Quit,
    Unknown,
}

fn parse_input(line: &str) -> Input {
    match line.trim().to_ascii_lowercase().as_str() {
        "a" | "1" => Input::Select(0),
        "b" | "2" => Input::Select(1),
        "c" | "3" => Input::Select(2),
        "d" | "4" => Input::Select(3),
        "n" | "next" | "" => Input::Next,
        "p" | "prev" | "previous" => Input::Previous,
        "q" | "quit" | "exit" => Input::Quit,
        _ => Input::Unknown,
    }
}

type StdinLines = Lines<BufReader<Stdin>>;

/// Run quizzes on `subject` until the learner stops; a retake replays the
/// questions generated for the previous round.
pub async fn run(quiz: &QuizLoopService, user: UserId, subject: &str) -> CommandResult {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut retake = false;
    loop {
        let started = if retake {
            quiz.retake(subject).await
        } else {
            println!("Generating questions...");
            quiz.start(subject).await
        };
        let session = started.map_err(user_facing)?;
        if !play(quiz, user, session, &mut lines).await? {
            return Ok(());
        }

        println!("\nType r to retake these questions, anything else to exit.");
        match lines.next_line().await? {
            Some(line) if line.trim().eq_ignore_ascii_case("r") => retake = true,
            _ => return Ok(()),
        }
    }
}

/// One quiz from first question to summary. Returns false when abandoned.
async fn play(
    quiz: &QuizLoopService,
    user: UserId,
    mut session: QuizSession,
    lines: &mut StdinLines,
) -> Result<bool, Box<dyn Error>> {
    println!("Answer with A-D, Enter or n for next, p for previous, q to quit.\n");
    render(&session);

    let (driver, mut ticks) = TimerDriver::spawn();
    let finished = loop {
        tokio::select! {
            Some(()) = ticks.recv() => {
                match quiz.tick(user, &mut session).await.map_err(user_facing)? {
                    QuizTick::Running { remaining_secs } => {
                        if remaining_secs == 10 || remaining_secs == 5 {
                            println!("  {remaining_secs}s left");
                        }
                    }
                    QuizTick::Inactive => {}
                    QuizTick::Expired { step, .. } => {
                        println!("  Time's up!");
                        if let Some(recorded) = after_step(&session, step) {
                            break Some(recorded);
                        }
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break None };
                match handle(quiz, user, &mut session, parse_input(&line)).await? {
                    Flow::Continue => {}
                    Flow::Finished(recorded) => break Some(recorded),
                    Flow::Quit => break None,
                }
            }
        }
    };
    driver.cancel();

    match finished {
        Some(recorded) => {
            summarize(&session, &recorded);
            Ok(true)
        }
        None => {
            debug!("quiz left before the end");
            quiz.abandon(session);
            println!("Quiz abandoned; nothing was saved.");
            Ok(false)
        }
    }
}

enum Flow {
    Continue,
    Finished(RecordedQuiz),
    Quit,
}

async fn handle(
    quiz: &QuizLoopService,
    user: UserId,
    session: &mut QuizSession,
    input: Input,
) -> Result<Flow, Box<dyn Error>> {
    match input {
        Input::Select(option) => {
            let Some(question) = session.current_question().map(|q| q.id().clone()) else {
                return Ok(Flow::Continue);
            };
            quiz.select_answer(session, &question, option)
                .map_err(user_facing)?;
            println!("  Selected {}", LABELS[usize::from(option)]);
        }
        Input::Next => {
            let step = quiz.advance(user, session).await.map_err(user_facing)?;
            if let Some(recorded) = after_step(session, step) {
                return Ok(Flow::Finished(recorded));
            }
        }
        Input::Previous => {
            if quiz.retreat(session) {
                render(session);
            } else {
                println!("  Already at the first question.");
            }
        }
        Input::Quit => return Ok(Flow::Quit),
        Input::Unknown => println!("  Answer with A-D, n, p or q."),
    }
    Ok(Flow::Continue)
}

fn after_step(session: &QuizSession, step: QuizStep) -> Option<RecordedQuiz> {
    match step {
        QuizStep::Moved { .. } => {
            render(session);
            None
        }
        QuizStep::Finished(recorded) => Some(recorded),
    }
}

fn render(session: &QuizSession) {
    let Some(question) = session.current_question() else {
        return;
    };
    let progress = session.progress();
    println!(
        "Question {}/{} [{}] {}s",
        progress.current + 1,
        progress.total,
        question.difficulty().as_str(),
        session.time_left()
    );
    println!("{}", question.prompt());
    let selected = session.selected_answer(question.id());
    for (label, (index, option)) in LABELS.iter().zip(question.options().iter().enumerate()) {
        let marker = if selected.is_some_and(|s| usize::from(s) == index) {
            '>'
        } else {
            ' '
        };
        println!(" {marker}{label}. {option}");
    }
}

fn summarize(session: &QuizSession, recorded: &RecordedQuiz) {
    println!("\nScore: {:.0}%", recorded.score);
    for (number, question) in session.batch().questions().iter().enumerate() {
        let record = session.answers().get(question.id());
        let verdict = match record {
            Some(r) if r.is_correct() => "correct",
            Some(r) if r.is_skipped() => "skipped",
            Some(_) => "incorrect",
            None => "unanswered",
        };
        println!("{}. {} ({verdict})", number + 1, question.prompt());
        println!("   answer: {}", question.correct_text());
        println!("   {}", question.explanation());
    }
    println!(
        "\n{} quizzes taken, average {:.1}%",
        recorded.progress.total_quizzes(),
        recorded.progress.average_score()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_digits_select_options() {
        assert_eq!(parse_input("b"), Input::Select(1));
        assert_eq!(parse_input(" D \n"), Input::Select(3));
        assert_eq!(parse_input("3"), Input::Select(2));
    }

    #[test]
    fn navigation_keys() {
        assert_eq!(parse_input(""), Input::Next);
        assert_eq!(parse_input("Prev"), Input::Previous);
        assert_eq!(parse_input("q"), Input::Quit);
        assert_eq!(parse_input("z"), Input::Unknown);
    }
}
