use std::fmt;
use std::path::PathBuf;

use storage::repository::Storage;
use storage::sqlite::{normalize_sqlite_url, prepare_sqlite_dir};
use study_core::model::QuizDefinition;

const DEFAULT_DB_URL: &str = "sqlite://smartstudy.sqlite3";

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    catalog: PathBuf,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingCatalog,
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingCatalog => write!(f, "a catalog file is required (--catalog)"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = normalize_sqlite_url(
            &std::env::var("SMARTSTUDY_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.into()),
        );
        let mut catalog = std::env::var("SMARTSTUDY_CATALOG").ok().map(PathBuf::from);

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(&value);
                }
                "--catalog" => {
                    catalog = Some(PathBuf::from(require_value(&mut args, "--catalog")?));
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
            catalog: catalog.ok_or(ArgsError::MissingCatalog)?,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- --catalog <file.json> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --catalog <path>          JSON array of quiz definitions to import");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: {DEFAULT_DB_URL})");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  SMARTSTUDY_DB_URL, SMARTSTUDY_CATALOG");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let raw = std::fs::read_to_string(&args.catalog)?;
    let quizzes: Vec<QuizDefinition> = serde_json::from_str(&raw)?;

    prepare_sqlite_dir(&args.db_url)?;
    let storage = Storage::sqlite(&args.db_url).await?;
    for quiz in &quizzes {
        storage.quizzes.upsert_quiz(quiz).await?;
    }

    println!(
        "Imported {} quizzes from {} into {}",
        quizzes.len(),
        args.catalog.display(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
