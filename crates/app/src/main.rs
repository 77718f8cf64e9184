use std::fmt;

use serde::Serialize;
use services::{AppServices, Clock, SetStats, StudyConfig, normalize_sqlite_url};
use study_core::model::{
    Difficulty, Flashcard, FlashcardDraft, FlashcardId, FlashcardSet, FlashcardSetId, Quality,
    UserId,
};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { command: Command, flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidCard { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { command, flag } => {
                write!(f, "{} requires {flag}", command.name())
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidCard { raw } => write!(
                f,
                "invalid --card value (expected front::back[::easy|medium|hard]): {raw}"
            ),
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

fn parse_id<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidId { flag, raw })
}

fn parse_card(raw: String) -> Result<FlashcardDraft, ArgsError> {
    let parts: Vec<&str> = raw.split("::").collect();
    let draft = match parts.as_slice() {
        [front, back] => FlashcardDraft::new(*front, *back),
        [front, back, difficulty] => {
            let difficulty: Difficulty = difficulty
                .parse()
                .map_err(|_| ArgsError::InvalidCard { raw: raw.clone() })?;
            FlashcardDraft::new(*front, *back).with_difficulty(difficulty)
        }
        _ => return Err(ArgsError::InvalidCard { raw }),
    };
    Ok(draft)
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  study due      --user <id> [--limit <n>]");
    eprintln!("  study review   --card <id> --quality <0-5>");
    eprintln!("  study sets     --user <id>");
    eprintln!("  study show     --set <id>");
    eprintln!(
        "  study create   --user <id> --title <t> [--description <d>] --card <front>::<back>[::<difficulty>] ..."
    );
    eprintln!("  study delete   --set <id>");
    eprintln!("  study history  --card <id>");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --db <sqlite_url>   SQLite URL (default: sqlite://study.sqlite3)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_DB_URL, STUDY_DUE_LIMIT, STUDY_QUALITY_POLICY, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Due,
    Review,
    Sets,
    Show,
    Create,
    Delete,
    History,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "due" => Some(Self::Due),
            "review" => Some(Self::Review),
            "sets" => Some(Self::Sets),
            "show" => Some(Self::Show),
            "create" => Some(Self::Create),
            "delete" => Some(Self::Delete),
            "history" => Some(Self::History),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Due => "due",
            Self::Review => "review",
            Self::Sets => "sets",
            Self::Show => "show",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::History => "history",
        }
    }
}

/// Flags shared by every subcommand; each one checks for the ones it needs.
#[derive(Debug, Default)]
struct Args {
    db_url: Option<String>,
    user: Option<UserId>,
    set: Option<FlashcardSetId>,
    card: Option<FlashcardId>,
    quality: Option<i32>,
    limit: Option<u32>,
    title: Option<String>,
    description: Option<String>,
    cards: Vec<FlashcardDraft>,
}

impl Args {
    fn parse(
        command: Command,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = Some(normalize_sqlite_url(&value));
                }
                "--user" => {
                    parsed.user = Some(parse_id("--user", require_value(args, "--user")?)?);
                }
                "--set" => {
                    parsed.set = Some(parse_id("--set", require_value(args, "--set")?)?);
                }
                "--card" if command == Command::Create => {
                    parsed.cards.push(parse_card(require_value(args, "--card")?)?);
                }
                "--card" => {
                    parsed.card = Some(parse_id("--card", require_value(args, "--card")?)?);
                }
                "--quality" => {
                    let value = require_value(args, "--quality")?;
                    let quality = value.trim().parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--quality",
                        raw: value.clone(),
                    })?;
                    parsed.quality = Some(quality);
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    let limit = value.trim().parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--limit",
                        raw: value.clone(),
                    })?;
                    parsed.limit = Some(limit);
                }
                "--title" => parsed.title = Some(require_value(args, "--title")?),
                "--description" => {
                    parsed.description = Some(require_value(args, "--description")?);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

fn required<T>(value: Option<T>, command: Command, flag: &'static str) -> Result<T, ArgsError> {
    value.ok_or(ArgsError::MissingFlag { command, flag })
}

#[derive(Serialize)]
struct SetDetails {
    set: FlashcardSet,
    stats: SetStats,
    cards: Vec<Flashcard>,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let command = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            print_usage();
            ArgsError::UnknownCommand(first)
        })?,
    };

    let args = Args::parse(command, &mut argv).inspect_err(|_| print_usage())?;

    let mut config = StudyConfig::from_env()?;
    if let Some(db_url) = args.db_url {
        config.db_url = db_url;
    }
    log::debug!("running {} against {}", command.name(), config.db_url);

    let services = AppServices::new_sqlite(&config, Clock::default()).await?;

    match command {
        Command::Due => {
            let user = required(args.user, command, "--user")?;
            let due = services.due_cards().select_due_cards(user, args.limit).await?;
            print_json(&due)?;
        }
        Command::Review => {
            let card = required(args.card, command, "--card")?;
            let quality = required(args.quality, command, "--quality")?;
            let reviewed = services
                .reviews()
                .record_review(card, Quality::new(quality))
                .await?;
            print_json(&reviewed)?;
        }
        Command::Sets => {
            let user = required(args.user, command, "--user")?;
            print_json(&services.sets().list_sets(user).await?)?;
        }
        Command::Show => {
            let set_id = required(args.set, command, "--set")?;
            let sets = services.sets();
            let Some((set, cards)) = sets.get_set(set_id).await? else {
                return Err(format!("set {set_id} not found").into());
            };
            let stats = sets.set_stats(set_id).await?;
            print_json(&SetDetails { set, stats, cards })?;
        }
        Command::Create => {
            let user = required(args.user, command, "--user")?;
            let title = required(args.title, command, "--title")?;
            let set_id = services
                .sets()
                .create_set(user, title, args.description, args.cards)
                .await?;
            print_json(&serde_json::json!({ "set_id": set_id }))?;
        }
        Command::Delete => {
            let set_id = required(args.set, command, "--set")?;
            let deleted = services.sets().delete_set(set_id).await?;
            print_json(&serde_json::json!({ "set_id": set_id, "deleted": deleted }))?;
        }
        Command::History => {
            let card = required(args.card, command, "--card")?;
            print_json(&services.reviews().history(card).await?)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
