mod console;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use services::{
    CatalogError, CatalogFilter, CatalogService, Clock, HistoryRecorder, HistoryService,
    QuizSessionController, SessionState, StepOutcome, Tick, TickOutcome, TokioCountdown,
};
use storage::repository::Storage;
use storage::sqlite::{normalize_sqlite_url, prepare_sqlite_dir};
use study_core::model::{Difficulty, QuizId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

use console::Input;

const DEFAULT_DB_URL: &str = "sqlite://smartstudy.sqlite3";
const DEFAULT_LOG_FILTER: &str = "smartstudy=info,services=info,storage=warn";
const DEFAULT_HISTORY_LIMIT: u32 = 20;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidQuizId { raw: String },
    InvalidLimit { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidQuizId { raw } => write!(f, "invalid --quiz-id value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p smartstudy -- play    [--db <sqlite_url>] [--catalog <file>] [--quiz-id <id>]");
    eprintln!("  cargo run -p smartstudy -- list    [--db <sqlite_url>] [--catalog <file>] [--subject <s>] [--difficulty <d>]");
    eprintln!("  cargo run -p smartstudy -- history [--db <sqlite_url>] [--quiz-id <id>] [--limit <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  command play");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --limit {DEFAULT_HISTORY_LIMIT}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SMARTSTUDY_DB_URL, SMARTSTUDY_CATALOG, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    List,
    History,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "list" => Some(Self::List),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    catalog: Option<PathBuf>,
    quiz_id: Option<QuizId>,
    subject: Option<String>,
    difficulty: Option<Difficulty>,
    limit: u32,
}

impl Args {
    fn parse(cmd: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("SMARTSTUDY_DB_URL")
                .ok()
                .map_or_else(
                    || normalize_sqlite_url(DEFAULT_DB_URL),
                    |url| normalize_sqlite_url(&url),
                ),
            catalog: std::env::var("SMARTSTUDY_CATALOG").ok().map(PathBuf::from),
            quiz_id: None,
            subject: None,
            difficulty: None,
            limit: DEFAULT_HISTORY_LIMIT,
        };

        while let Some(arg) = args.next() {
            match (arg.as_str(), cmd) {
                ("--db", _) => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(&value);
                }
                ("--catalog", Command::Play | Command::List) => {
                    parsed.catalog = Some(PathBuf::from(require_value(args, "--catalog")?));
                }
                ("--quiz-id", Command::Play | Command::History) => {
                    let value = require_value(args, "--quiz-id")?;
                    let id = value
                        .parse::<QuizId>()
                        .map_err(|_| ArgsError::InvalidQuizId { raw: value.clone() })?;
                    parsed.quiz_id = Some(id);
                }
                ("--subject", Command::List) => {
                    parsed.subject = Some(require_value(args, "--subject")?);
                }
                ("--difficulty", Command::List) => {
                    parsed.difficulty = Some(Difficulty::parse(&require_value(args, "--difficulty")?));
                }
                ("--limit", Command::History) => {
                    let value = require_value(args, "--limit")?;
                    parsed.limit = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                }
                ("--help" | "-h", _) => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let args = Args::parse(cmd, &mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_dir(&args.db_url)?;
    let storage = Storage::sqlite(&args.db_url).await?;
    let catalog = CatalogService::new(Arc::clone(&storage.quizzes));

    if let Some(path) = &args.catalog {
        let raw = std::fs::read_to_string(path)?;
        let count = catalog.import_json(&raw).await?;
        println!("Imported {count} quizzes from {}", path.display());
    }

    match cmd {
        Command::Play => play(&storage, &catalog, args.quiz_id).await,
        Command::List => {
            let mut filter = CatalogFilter::new();
            if let Some(subject) = args.subject {
                filter = filter.with_subject(subject);
            }
            if let Some(difficulty) = args.difficulty {
                filter = filter.with_difficulty(difficulty);
            }
            console::print_catalog(&catalog.list(&filter).await?);
            Ok(())
        }
        Command::History => {
            let history = HistoryService::new(Arc::clone(&storage.history));
            match args.quiz_id {
                Some(quiz_id) => match history.quiz_stats(quiz_id).await? {
                    Some(stats) => console::print_stats(&stats),
                    None => println!("quiz {quiz_id} has no recorded attempts"),
                },
                None => {
                    console::print_history(&history.recent(args.limit).await?);
                    for stats in history.overview().await? {
                        console::print_stats(&stats);
                    }
                }
            }
            Ok(())
        }
    }
}

//
// ─── PLAY ──────────────────────────────────────────────────────────────────────
//

async fn play(
    storage: &Storage,
    catalog: &CatalogService,
    quiz_id: Option<QuizId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Handle::current();
    let (recorder, writer) = HistoryRecorder::spawn(Arc::clone(&storage.history), &runtime);
    let (timer, mut ticks) = TokioCountdown::channel(runtime);
    let mut controller =
        QuizSessionController::new(Clock::default(), Box::new(timer), recorder.clone());

    match quiz_id {
        Some(id) => {
            open_quiz(catalog, &mut controller, id).await?;
            start_quiz(&mut controller);
        }
        None => {
            console::print_catalog(&catalog.list(&CatalogFilter::new()).await?);
            println!("Type a quiz id to open it, `help` for commands.");
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let input = Input::parse(&line, controller.state());
                if !handle_input(catalog, &mut controller, input).await? {
                    break;
                }
            }
            Some(tick) = ticks.recv() => on_tick(&mut controller, tick),
        }
    }

    drop(controller);
    drop(recorder);
    let written = writer.await?;
    tracing::debug!(written, "history writer drained");
    Ok(())
}

/// Returns `false` when the player wants to leave.
async fn handle_input(
    catalog: &CatalogService,
    controller: &mut QuizSessionController,
    input: Input,
) -> Result<bool, Box<dyn std::error::Error>> {
    match input {
        Input::Quit => return Ok(false),
        Input::Help => console::print_help(),
        Input::List => match controller.state() {
            SessionState::Idle | SessionState::Selecting(_) => {
                console::print_catalog(&catalog.list(&CatalogFilter::new()).await?);
            }
            _ => println!("Finish or leave the current quiz first."),
        },
        Input::Open(id) => match controller.state() {
            SessionState::Idle | SessionState::Selecting(_) => {
                open_quiz(catalog, controller, id).await?;
            }
            _ => println!("Finish or leave the current quiz first."),
        },
        Input::Start => start_quiz(controller),
        Input::Back => {
            if !(controller.cancel_selection() || controller.dismiss()) {
                println!("Nothing to go back from.");
            }
        }
        Input::Choose(n) => choose(controller, n),
        Input::Next => match controller.advance() {
            StepOutcome::Moved(_) => show_question(controller),
            StepOutcome::Blocked => println!("Answer this question before moving on."),
            StepOutcome::Submitted(result) => console::print_result(&result),
            StepOutcome::Inactive => println!("No quiz is running."),
        },
        Input::Previous => {
            if controller.retreat() {
                show_question(controller);
            }
        }
        Input::Jump(n) => {
            if n > 0 && controller.jump_to(n - 1) {
                show_question(controller);
            } else {
                println!("No question {n}.");
            }
        }
        Input::Submit => match controller.state() {
            SessionState::Confirmed(_) => {
                if let Some(result) = controller.submit() {
                    console::print_result(&result);
                }
            }
            _ => println!("No quiz is running."),
        },
        Input::Unknown(raw) if raw.is_empty() => {}
        Input::Unknown(raw) => println!("Unknown command `{raw}`. Type `help`."),
    }
    Ok(true)
}

async fn open_quiz(
    catalog: &CatalogService,
    controller: &mut QuizSessionController,
    id: QuizId,
) -> Result<(), Box<dyn std::error::Error>> {
    match catalog.get(id).await {
        Ok(quiz) => {
            console::print_card(&quiz);
            controller.select(quiz);
            Ok(())
        }
        Err(CatalogError::NotFound(_)) => {
            println!("There is no quiz {id}.");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn start_quiz(controller: &mut QuizSessionController) {
    match controller.confirm() {
        Ok(_) => show_question(controller),
        Err(err) => println!("{err}"),
    }
}

fn choose(controller: &mut QuizSessionController, n: usize) {
    let Some(attempt) = controller.attempt() else {
        return;
    };
    let question = attempt.current_question();
    let Some(option) = n.checked_sub(1).and_then(|i| question.options().get(i)) else {
        println!("Pick an option between 1 and {}.", question.options().len());
        return;
    };
    let (question_id, option) = (question.id(), option.clone());
    controller.select_answer(question_id, option);
    show_question(controller);
}

fn show_question(controller: &QuizSessionController) {
    if let Some(attempt) = controller.attempt().filter(|a| !a.is_complete()) {
        console::print_question(attempt);
    }
}

fn on_tick(controller: &mut QuizSessionController, tick: Tick) {
    match controller.tick(tick.attempt) {
        TickOutcome::Running { remaining_secs }
            if remaining_secs % 60 == 0 || remaining_secs <= 10 =>
        {
            println!("{} left", console::format_clock(remaining_secs));
        }
        TickOutcome::Running { .. } | TickOutcome::Ignored => {}
        TickOutcome::Expired(result) => {
            println!("Time is up!");
            console::print_result(&result);
        }
    }
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
