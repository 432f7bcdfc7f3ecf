use std::fmt;
use std::time::Duration;

use quiz_core::model::{EngineSettings, QuizId};
use services::{AttemptLoopService, Clock};
use storage::http::HttpStoreConfig;
use storage::repository::{QuizDefinitionRepository, Storage, StorageError};
use storage::sqlite::SqliteRepository;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod console;
mod demo;

const DEFAULT_LOG_FILTER: &str = "services=info,storage=info,app=info";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidQuizId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidSeconds { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidQuizId { raw } => write!(f, "invalid --quiz-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidSeconds { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_seconds(flag: &'static str, raw: String) -> Result<Duration, ArgsError> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ArgsError::InvalidSeconds { flag, raw }),
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    api_url: Option<String>,
    api_token: Option<String>,
    quiz_id: QuizId,
    autosave_period: Option<Duration>,
    api_timeout: Option<Duration>,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- take [--db <sqlite_url> | --api <base_url>] [--quiz-id <id>]");
    eprintln!("                           [--autosave-secs <n>] [--api-timeout-secs <n>]");
    eprintln!("  cargo run -p app -- seed [--db <sqlite_url>] [--quiz-id <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!("  --quiz-id 1");
    eprintln!("  --autosave-secs 30");
    eprintln!("  --api-timeout-secs 15");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_API_URL, QUIZ_API_TOKEN, QUIZ_ID, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Take,
    Seed,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("quiz.sqlite3".into()), normalize_sqlite_url);
        let mut api_url = std::env::var("QUIZ_API_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let api_token = std::env::var("QUIZ_API_TOKEN").ok();
        let mut quiz_id = std::env::var("QUIZ_ID")
            .ok()
            .and_then(|value| value.parse::<QuizId>().ok())
            .unwrap_or(QuizId::new(1));
        let mut autosave_period = None;
        let mut api_timeout = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--api" => {
                    api_url = Some(require_value(args, "--api")?);
                }
                "--quiz-id" => {
                    let value = require_value(args, "--quiz-id")?;
                    quiz_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidQuizId { raw: value.clone() })?;
                }
                "--autosave-secs" => {
                    let value = require_value(args, "--autosave-secs")?;
                    autosave_period = Some(parse_seconds("--autosave-secs", value)?);
                }
                "--api-timeout-secs" => {
                    let value = require_value(args, "--api-timeout-secs")?;
                    api_timeout = Some(parse_seconds("--api-timeout-secs", value)?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            api_url,
            api_token,
            quiz_id,
            autosave_period,
            api_timeout,
        })
    }

    fn settings(&self) -> Result<EngineSettings, Box<dyn std::error::Error>> {
        let standard = EngineSettings::standard();
        let Some(period) = self.autosave_period else {
            return Ok(standard);
        };
        Ok(EngineSettings::new(
            standard.tick_interval(),
            period,
            standard.warning_thresholds_secs().to_vec(),
        )?)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn open_sqlite(db_url: &str) -> Result<SqliteRepository, Box<dyn std::error::Error>> {
    prepare_sqlite_file(db_url)?;
    let repo = SqliteRepository::connect(db_url).await?;
    repo.migrate().await?;
    Ok(repo)
}

/// Seeds the demo quiz when the requested id is missing. Returns `true` if it did.
async fn ensure_quiz(
    repo: &SqliteRepository,
    quiz_id: QuizId,
) -> Result<bool, Box<dyn std::error::Error>> {
    match repo.get_by_id(quiz_id).await {
        Ok(_) => Ok(false),
        Err(StorageError::NotFound) => {
            repo.upsert_quiz(&demo::demo_quiz(quiz_id)?).await?;
            Ok(true)
        }
        Err(e) => Err(e.into()),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Take,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Take,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();

    match cmd {
        Command::Seed => {
            let repo = open_sqlite(&parsed.db_url).await?;
            let quiz = demo::demo_quiz(parsed.quiz_id)?;
            repo.upsert_quiz(&quiz).await?;
            tracing::info!(quiz_id = %parsed.quiz_id, db = %parsed.db_url, "demo quiz seeded");
            println!(
                "seeded \"{}\" as quiz {} ({} questions)",
                quiz.title(),
                quiz.quiz_id(),
                quiz.questions().len()
            );
            Ok(())
        }
        Command::Take => {
            let storage = match parsed.api_url.as_deref() {
                Some(base_url) => {
                    let mut config = HttpStoreConfig::new(base_url);
                    if let Some(token) = parsed.api_token.as_deref() {
                        config = config.with_bearer_token(token);
                    }
                    if let Some(timeout) = parsed.api_timeout {
                        config = config.with_request_timeout(timeout);
                    }
                    Storage::http(config)?
                }
                None => {
                    let repo = open_sqlite(&parsed.db_url).await?;
                    if ensure_quiz(&repo, parsed.quiz_id).await? {
                        tracing::info!(quiz_id = %parsed.quiz_id, "seeded demo quiz");
                    }
                    Storage::from_sqlite(&repo)
                }
            };

            let engine = AttemptLoopService::from_storage(Clock::system(), &storage)
                .with_settings(parsed.settings()?);
            let handle = engine.start_attempt(parsed.quiz_id).await?;
            console::run_attempt(handle).await?;
            Ok(())
        }
    }
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
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

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
