use clap::{Args, Parser, Subcommand};
use tutor_core::model::{ConversationId, UserId};

/// User id for local mode, when no auth provider is configured.
pub const LOCAL_USER: &str = "00000000-0000-0000-0000-000000000001";

/// Terminal front end for the AI tutor.
#[derive(Parser, Debug)]
#[command(name = "tutor", version, about, long_about = None)]
pub struct Cli {
    /// `SQLite` database URL or path
    #[arg(long = "db", env = "TUTOR_DB_URL", default_value = "sqlite://tutor.sqlite3")]
    pub db_url: String,

    /// Learner id used when auth is disabled
    #[arg(long, env = "TUTOR_USER_ID", default_value = LOCAL_USER)]
    pub user: UserId,

    /// Account email, required for protected commands when auth is enabled
    #[arg(long, env = "TUTOR_EMAIL")]
    pub email: Option<String>,

    /// Account password
    #[arg(long, env = "TUTOR_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the quiz subjects
    Subjects,
    /// Take a five-question quiz
    Quiz {
        /// Subject name, case-insensitive
        subject: String,
    },
    /// Show totals, per-subject averages, strengths and weaknesses
    Progress {
        /// Number of recent attempts to list
        #[arg(long, default_value_t = 5)]
        recent: u32,
    },
    /// Topics answered incorrectly in past quizzes
    #[command(subcommand)]
    Review(ReviewCommand),
    /// Conversations with the tutor
    #[command(subcommand)]
    Chat(ChatCommand),
    /// Sign in and print the account's user id
    Login(Credentials),
    /// Create an account
    Signup(Credentials),
    /// Confirm an email address with the token hash from the link
    Confirm { token_hash: String },
}

#[derive(Args, Debug)]
pub struct Credentials {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
}

/// Points at one incorrect question inside the review list (1-based).
#[derive(Args, Debug, Clone, Copy)]
pub struct QuestionRef {
    pub topic: usize,
    pub question: usize,
}

#[derive(Subcommand, Debug)]
pub enum ReviewCommand {
    /// List topics with their incorrect questions
    List {
        #[arg(long)]
        subject: Option<String>,
    },
    /// Ask the tutor to explain one incorrect question
    Explain {
        #[command(flatten)]
        target: QuestionRef,
        #[arg(long)]
        subject: Option<String>,
    },
    /// Open a chat about one incorrect question
    Discuss {
        #[command(flatten)]
        target: QuestionRef,
        #[arg(long)]
        subject: Option<String>,
        /// Ask the tutor to check understanding instead of explaining
        #[arg(long)]
        check: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ChatCommand {
    /// List conversations, most recent first
    List,
    /// Start a new conversation
    New { title: String },
    /// Print a conversation's messages
    Show { id: ConversationId },
    /// Send a message; without one, read messages from stdin until EOF
    Send {
        id: ConversationId,
        message: Vec<String>,
    },
    /// Delete a conversation and its messages
    Delete { id: ConversationId },
}
