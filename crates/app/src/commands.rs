//! Non-interactive command handlers.

use std::error::Error;

use services::{
    AppError, AppServices, ChatService, IncorrectQuestion, ReviewMode, SignUpOutcome, TopicReview,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tutor_core::model::{ChatMessage, ConversationId, UserId};
use tutor_core::subjects::{SUBJECTS, canonical_subject};

use crate::cli::{ChatCommand, Command, Credentials, QuestionRef, ReviewCommand};
use crate::quiz;

pub type CommandResult = Result<(), Box<dyn Error>>;

/// Log the detail, hand the learner the short notification text.
pub fn user_facing(err: impl Into<AppError>) -> Box<dyn Error> {
    let err = err.into();
    warn!(error = %err, "action failed");
    err.user_message().into()
}

pub async fn dispatch(app: &AppServices, user: UserId, command: Command) -> CommandResult {
    match command {
        Command::Subjects => {
            for subject in SUBJECTS {
                println!("{subject}");
            }
            Ok(())
        }
        Command::Quiz { subject } => quiz::run(&app.quiz(), user, &subject).await,
        Command::Progress { recent } => progress(app, user, recent).await,
        Command::Review(review) => self::review(app, user, review).await,
        Command::Chat(chat) => self::chat(&app.chat(), user, chat).await,
        Command::Login(Credentials { email, password }) => {
            let session = app
                .auth()
                .sign_in(&email, &password)
                .await
                .map_err(user_facing)?;
            println!("Signed in as {} ({})", session.email, session.user_id);
            Ok(())
        }
        Command::Signup(Credentials { email, password }) => {
            match app
                .auth()
                .sign_up(&email, &password)
                .await
                .map_err(user_facing)?
            {
                SignUpOutcome::ConfirmationRequired { email } => {
                    println!("Check {email} for a confirmation link.");
                }
                SignUpOutcome::SignedIn(session) => {
                    println!("Account created, user id {}", session.user_id);
                }
            }
            Ok(())
        }
        Command::Confirm { token_hash } => {
            let session = app
                .auth()
                .confirm_email(&token_hash)
                .await
                .map_err(user_facing)?;
            println!("Email confirmed, user id {}", session.user_id);
            Ok(())
        }
    }
}

// ─── Progress ────────────────────────────────────────────────────────────────

async fn progress(app: &AppServices, user: UserId, recent: u32) -> CommandResult {
    let service = app.progress();
    let dashboard = service.dashboard(user).await.map_err(user_facing)?;
    if dashboard.is_empty() {
        println!("No quizzes taken yet.");
        return Ok(());
    }

    println!(
        "Quizzes taken: {}  average score: {:.1}%",
        dashboard.total_quizzes, dashboard.average_score
    );
    if let Some(last) = dashboard.last_active {
        println!("Last active: {}", last.format("%Y-%m-%d %H:%M"));
    }

    println!("\nSubjects:");
    for summary in &dashboard.subjects {
        println!(
            "  {:<20} {:>3} attempts  {:>5.1}%",
            summary.subject, summary.attempts, summary.average_score
        );
    }
    for (title, insights) in [
        ("Strengths", &dashboard.strengths),
        ("Weaknesses", &dashboard.weaknesses),
    ] {
        if insights.is_empty() {
            continue;
        }
        println!("\n{title}:");
        for insight in insights {
            println!(
                "  {} ({}, {:.1}%)",
                insight.topic, insight.subject, insight.subject_average
            );
        }
    }

    let attempts = service
        .recent_attempts(user, recent)
        .await
        .map_err(user_facing)?;
    if !attempts.is_empty() {
        println!("\nRecent quizzes:");
        for stored in attempts {
            let attempt = &stored.attempt;
            println!(
                "  {}  {:<20} {:>5.1}%  {}s",
                attempt.completed_at.format("%Y-%m-%d %H:%M"),
                attempt.subject,
                attempt.score,
                attempt.time_spent_secs
            );
        }
    }
    Ok(())
}

// ─── Topics to review ────────────────────────────────────────────────────────

async fn review(app: &AppServices, user: UserId, command: ReviewCommand) -> CommandResult {
    let topics = app.topics();
    match command {
        ReviewCommand::List { subject } => {
            let reviews = topics
                .topics_to_review(user, subject_filter(subject.as_deref()))
                .await
                .map_err(user_facing)?;
            if reviews.is_empty() {
                println!("Nothing to review. Keep it up!");
            }
            for (t, review) in reviews.iter().enumerate() {
                println!(
                    "{}. {} ({}): {} incorrect, last {}",
                    t + 1,
                    review.topic,
                    review.subject,
                    review.incorrect_count,
                    review.last_attempted.format("%Y-%m-%d")
                );
                for (q, question) in review.incorrect_questions.iter().enumerate() {
                    println!("   {}. {}", q + 1, question.question);
                    println!("      your answer: {}", question.user_answer_text());
                    println!("      correct:     {}", question.correct_answer);
                }
            }
            Ok(())
        }
        ReviewCommand::Explain { target, subject } => {
            let reviews = topics
                .topics_to_review(user, subject_filter(subject.as_deref()))
                .await
                .map_err(user_facing)?;
            let (_, question) = pick(&reviews, target)?;
            println!("{}", topics.explain(question).await);
            Ok(())
        }
        ReviewCommand::Discuss {
            target,
            subject,
            check,
        } => {
            let reviews = topics
                .topics_to_review(user, subject_filter(subject.as_deref()))
                .await
                .map_err(user_facing)?;
            let (review, question) = pick(&reviews, target)?;
            let mode = if check {
                ReviewMode::CheckUnderstanding
            } else {
                ReviewMode::Explain
            };
            let chat = app.chat();
            let conversation = chat
                .start_review(user, review, question, mode)
                .await
                .map_err(user_facing)?;
            println!("Conversation {}: {}", conversation.id, conversation.title);
            if let Some(reply) = chat
                .respond_to_opening(user, conversation.id)
                .await
                .map_err(user_facing)?
            {
                print_message(&reply);
            }
            Ok(())
        }
    }
}

fn subject_filter(raw: Option<&str>) -> Option<&str> {
    raw.map(|subject| canonical_subject(subject).unwrap_or(subject))
}

fn pick(
    reviews: &[TopicReview],
    target: QuestionRef,
) -> Result<(&TopicReview, &IncorrectQuestion), Box<dyn Error>> {
    let review = target
        .topic
        .checked_sub(1)
        .and_then(|i| reviews.get(i))
        .ok_or_else(|| format!("no topic #{}", target.topic))?;
    let question = target
        .question
        .checked_sub(1)
        .and_then(|i| review.incorrect_questions.get(i))
        .ok_or_else(|| format!("topic #{} has no question #{}", target.topic, target.question))?;
    Ok((review, question))
}

// ─── Chat ────────────────────────────────────────────────────────────────────

async fn chat(chat: &ChatService, user: UserId, command: ChatCommand) -> CommandResult {
    match command {
        ChatCommand::List => {
            for conversation in chat.list_conversations(user).await.map_err(user_facing)? {
                println!(
                    "{:>4}  {}  {}",
                    conversation.id,
                    conversation.updated_at.format("%Y-%m-%d %H:%M"),
                    conversation.title
                );
            }
        }
        ChatCommand::New { title } => {
            let conversation = chat
                .create_conversation(user, &title)
                .await
                .map_err(user_facing)?;
            println!("Created conversation {}", conversation.id);
        }
        ChatCommand::Show { id } => {
            for message in chat.list_messages(user, id).await.map_err(user_facing)? {
                print_message(&message);
            }
        }
        ChatCommand::Send { id, message } if !message.is_empty() => {
            send(chat, user, id, &message.join(" ")).await?;
        }
        ChatCommand::Send { id, .. } => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                // Keep the conversation going after a rejected message.
                if let Err(err) = send(chat, user, id, &line).await {
                    eprintln!("{err}");
                }
            }
        }
        ChatCommand::Delete { id } => {
            chat.delete_conversation(user, id)
                .await
                .map_err(user_facing)?;
            println!("Deleted conversation {id}");
        }
    }
    Ok(())
}

async fn send(chat: &ChatService, user: UserId, id: ConversationId, text: &str) -> CommandResult {
    let exchange = chat
        .send_message(user, id, text)
        .await
        .map_err(user_facing)?;
    print_message(&exchange.reply);
    Ok(())
}

fn print_message(message: &ChatMessage) {
    println!("{}: {}", message.role.speaker(), message.content);
}
