use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use services::routes::{Access, Route, resolve};
use services::{AppServices, AuthConfig, AuthSession, Clock, InferenceConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod quiz;

use cli::{Cli, Command};

#[derive(Debug)]
struct InvalidDbUrl(String);

impl std::fmt::Display for InvalidDbUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid --db value: {}", self.0)
    }
}

impl Error for InvalidDbUrl {}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose.
    let fallback = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let db_url = normalize_sqlite_url(&cli.db_url);
    prepare_sqlite_file(&db_url)?;
    debug!(db = %db_url, "opening database");

    let inference = InferenceConfig::from_env();
    info!(base_url = %inference.base_url, model = %inference.model, "model endpoint");
    let app = AppServices::new_sqlite(&db_url, Clock::default_clock(), inference, AuthConfig::from_env())
        .await?;

    let route = route_for(&cli.command);
    let session = match route {
        Some(route) if route.is_protected() => current_session(&app, &cli).await?,
        _ => None,
    };
    if let Some(route) = route {
        if let Access::Redirect(to) = resolve(route, session.as_ref()) {
            return Err(format!("{route} requires a signed-in user; pass --email and --password ({to})").into());
        }
    }
    let user = session.map_or(cli.user, |s| s.user_id);

    commands::dispatch(&app, user, cli.command).await
}

fn route_for(command: &Command) -> Option<Route> {
    match command {
        Command::Subjects => None,
        Command::Quiz { .. } => Some(Route::Quiz),
        Command::Progress { .. } => Some(Route::Progress),
        Command::Review(_) => Some(Route::TopicsToReview),
        Command::Chat(_) => Some(Route::Chat),
        Command::Login(_) => Some(Route::Login),
        Command::Signup(_) => Some(Route::Signup),
        Command::Confirm { .. } => Some(Route::ConfirmEmail),
    }
}

/// Sign in with the configured credentials, or fall back to the local user
/// when no auth provider is configured.
async fn current_session(app: &AppServices, cli: &Cli) -> Result<Option<AuthSession>, Box<dyn Error>> {
    let auth = app.auth();
    if !auth.enabled() {
        return Ok(Some(AuthSession {
            user_id: cli.user,
            email: String::new(),
            access_token: String::new(),
        }));
    }
    match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => Ok(Some(
            auth.sign_in(email, password)
                .await
                .map_err(commands::user_facing)?,
        )),
        _ => Ok(None),
    }
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| InvalidDbUrl(db_url.to_string()))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(InvalidDbUrl(db_url.to_string()).into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls_pass_through() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/tutor.db"),
            "sqlite:///tmp/tutor.db"
        );
    }

    #[test]
    fn bare_paths_become_absolute_urls() {
        let url = normalize_sqlite_url("sqlite:data/tutor.db");
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/tutor.db"));
    }

    #[test]
    fn only_learning_commands_are_guarded() {
        assert_eq!(route_for(&Command::Subjects), None);
        assert!(route_for(&Command::Progress { recent: 1 }).is_some_and(Route::is_protected));
        assert!(
            !route_for(&Command::Confirm {
                token_hash: "abc".into()
            })
            .is_some_and(Route::is_protected)
        );
    }
}
