use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use practice_core::model::{Rating, SessionItemId, TopicId};
use services::{
    Clock, Confirmation, LoadOutcome, PracticeController, PracticeError, ProgressSync,
    RemoteConfig, SaveReport,
};
use storage::{GitHubRemote, LocalFileRemote, ProgressRemote};
use tracing_subscriber::EnvFilter;

const DEFAULT_BANK: &str = "questions.json";
const DEFAULT_COUNT: usize = 5;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidCount { raw: String },
    InvalidSeed { raw: String },
    ResetNeedsYes,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidCount { raw } => write!(f, "invalid --count value: {raw}"),
            ArgsError::InvalidSeed { raw } => write!(f, "invalid --seed value: {raw}"),
            ArgsError::ResetNeedsYes => {
                write!(f, "reset discards all progress; pass --yes to confirm")
            }
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
    eprintln!("  cargo run -p app -- [practice] [--bank <path>] [--count <n>] [--seed <n>]");
    eprintln!("                                 [--progress-dir <dir>]");
    eprintln!("  cargo run -p app -- reset --yes [--progress-dir <dir>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --bank {DEFAULT_BANK}");
    eprintln!("  --count {DEFAULT_COUNT}");
    eprintln!("  --progress-dir .");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PRACTICE_BANK, PRACTICE_COUNT");
    eprintln!("  PRACTICE_GITHUB_REPO, PRACTICE_GITHUB_TOKEN  # sync progress to GitHub");
    eprintln!("  PRACTICE_PROGRESS_PATH, PRACTICE_GITHUB_API");
    eprintln!("  RUST_LOG (default: info)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Practice,
    Reset,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "practice" => Some(Self::Practice),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

struct Args {
    bank: PathBuf,
    count: usize,
    seed: Option<u64>,
    progress_dir: PathBuf,
    confirmed: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut bank = std::env::var("PRACTICE_BANK")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_BANK), PathBuf::from);
        let mut count = match std::env::var("PRACTICE_COUNT") {
            Ok(raw) => parse_count(raw)?,
            Err(_) => DEFAULT_COUNT,
        };
        let mut seed = None;
        let mut progress_dir = PathBuf::from(".");
        let mut confirmed = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--bank" => bank = PathBuf::from(require_value(args, "--bank")?),
                "--count" => count = parse_count(require_value(args, "--count")?)?,
                "--seed" => {
                    let value = require_value(args, "--seed")?;
                    let parsed = value
                        .parse::<u64>()
                        .map_err(|_| ArgsError::InvalidSeed { raw: value.clone() })?;
                    seed = Some(parsed);
                }
                "--progress-dir" => {
                    progress_dir = PathBuf::from(require_value(args, "--progress-dir")?);
                }
                "--yes" | "-y" => confirmed = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            bank,
            count,
            seed,
            progress_dir,
            confirmed,
        })
    }
}

fn parse_count(raw: String) -> Result<usize, ArgsError> {
    match raw.trim().parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(ArgsError::InvalidCount { raw }),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// GitHub when configured through the environment, otherwise a local directory.
fn build_sync(progress_dir: PathBuf) -> Result<ProgressSync, Box<dyn std::error::Error>> {
    match RemoteConfig::from_env()? {
        Some(config) => {
            tracing::info!(
                repo = %config.repo,
                path = %config.progress_path,
                "using GitHub progress storage"
            );
            let remote: Arc<dyn ProgressRemote> =
                Arc::new(GitHubRemote::new(config.github_settings())?);
            Ok(ProgressSync::with_path(remote, config.progress_path))
        }
        None => {
            tracing::info!(dir = %progress_dir.display(), "using local progress storage");
            Ok(ProgressSync::new(Arc::new(LocalFileRemote::new(progress_dir))))
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Practice,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with('-') => Command::Practice,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            io::Error::new(io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with('-') {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    if cmd == Command::Reset && !parsed.confirmed {
        return Err(ArgsError::ResetNeedsYes.into());
    }

    init_tracing();

    let clock = Clock::default();
    let controller = match parsed.seed {
        Some(seed) => PracticeController::with_seed(clock, seed),
        None => PracticeController::new(clock),
    };
    let mut controller = controller.with_sync(build_sync(parsed.progress_dir.clone())?);

    match cmd {
        Command::Reset => {
            // No load: a file that cannot be decoded must still be resettable.
            controller.reset_progress(Confirmation::Confirmed)?;
            controller.save_progress().await?;
            println!("Progress reset.");
            Ok(())
        }
        Command::Practice => {
            match controller.load_progress().await? {
                LoadOutcome::FreshStart => println!("No saved progress yet; starting fresh."),
                LoadOutcome::Migrated { entries } => {
                    println!("Upgraded old progress file ({entries} answered questions).");
                }
                LoadOutcome::UnknownVersion { version } => {
                    println!("Progress file version {version:?} is not recognised; loaded as-is.");
                }
                LoadOutcome::Loaded { .. } => {}
            }

            let bank = std::fs::read_to_string(&parsed.bank).map_err(|e| {
                io::Error::new(e.kind(), format!("{}: {e}", parsed.bank.display()))
            })?;
            controller.load_bank_json(&bank)?;
            practice(&mut controller, parsed.count).await
        }
    }
}

async fn practice(
    controller: &mut PracticeController,
    count: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let ids: Vec<SessionItemId> = match controller.start_session(count) {
        Ok(items) => items.iter().map(|item| item.session_id()).collect(),
        Err(PracticeError::NoData) => {
            println!("The question bank has no topics.");
            return Ok(());
        }
        Err(PracticeError::NothingLeft) => {
            println!("Every question for the picked topics has been answered.");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let total = ids.len();

    'items: for (index, id) in ids.into_iter().enumerate() {
        loop {
            print_item(controller, index, total, id);
            print!("rate 1-4, +topic / -topic, q to stop > ");
            io::stdout().flush()?;

            let Some(line) = lines.next().transpose()? else {
                break 'items;
            };
            match line.trim() {
                "" => {}
                "q" => break 'items,
                input => {
                    let rating = input.parse::<u8>().ok().map(Rating::from_u8);
                    if let Some(Ok(rating)) = rating {
                        let report = controller.rate(id, rating)?;
                        for update in &report.updates {
                            println!(
                                "  {} -> next review in {} day(s)",
                                update.topic_id, update.interval_days
                            );
                        }
                        continue 'items;
                    }
                    edit_topics(controller, id, input);
                }
            }
        }
    }

    drop(lines);
    let summary = controller.finish_session();
    if summary.rated > 0 {
        let report = controller.save_progress().await?;
        report_save(&report);
    }
    println!("Rated {} of {} question(s).", summary.rated, summary.total);
    Ok(())
}

fn save_notice(report: &SaveReport) -> Option<&'static str> {
    report.remote_changed.then_some(
        "Note: the saved progress had changed since it was loaded; \
         this save replaced those changes.",
    )
}

fn report_save(report: &SaveReport) {
    if let Some(notice) = save_notice(report) {
        println!("{notice}");
    }
}

fn print_item(controller: &PracticeController, index: usize, total: usize, id: SessionItemId) {
    let Some(item) = controller.session().iter().find(|item| item.session_id() == id) else {
        return;
    };
    println!();
    println!(
        "[{}/{}] {} / {}  ({id})",
        index + 1,
        total,
        item.question().module(),
        item.question().topic()
    );
    println!("  {}", item.question().raw());
    let topics: Vec<&str> = item.selected_topics().iter().map(TopicId::as_str).collect();
    println!("  topics: {}", topics.join(", "));

    if let Some(catalog) = controller.catalog() {
        let related: Vec<&str> = catalog
            .topics_in_module(item.question().module())
            .into_iter()
            .filter(|topic| !item.selected_topics().contains(&topic.id))
            .map(|topic| topic.name.as_str())
            .collect();
        if !related.is_empty() {
            println!("  related: {}", related.join(", "));
        }
    }
}

/// `+name` / `-name` edit the reviewed topics; a bare name means the item's module.
fn edit_topics(controller: &mut PracticeController, id: SessionItemId, input: &str) {
    let (add, name) = if let Some(rest) = input.strip_prefix('+') {
        (true, rest.trim())
    } else if let Some(rest) = input.strip_prefix('-') {
        (false, rest.trim())
    } else {
        println!("  expected a rating 1-4, +topic, -topic or q");
        return;
    };
    let Some(module) = controller
        .session()
        .iter()
        .find(|item| item.session_id() == id)
        .map(|item| item.question().module().to_owned())
    else {
        return;
    };
    let topic = if name.contains("::") {
        TopicId::from_raw(name)
    } else {
        TopicId::new(&module, name)
    };

    let result = if add {
        controller.add_topic(id, topic)
    } else {
        controller.remove_topic(id, &topic)
    };
    match result {
        Ok(true) => {}
        Ok(false) => println!("  no change"),
        Err(err) => println!("  {err}"),
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
