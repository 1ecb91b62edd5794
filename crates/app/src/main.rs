mod input;
mod render;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use quiz_core::format_elapsed;
use services::{
    Clock, NavOutcome, QuizSession, SessionHistory, SessionOptions, SessionStatus,
    ValidationOutcome,
};
use storage::{Storage, StoreConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use input::{Input, print_controls};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingExam,
    UnknownArg(String),
    EmptyPath { flag: &'static str },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingExam => write!(f, "run requires --exam <file>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::EmptyPath { flag } => write!(f, "{flag} must not be empty"),
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

fn require_path(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<PathBuf, ArgsError> {
    let value = require_value(args, flag)?;
    if value.trim().is_empty() {
        return Err(ArgsError::EmptyPath { flag });
    }
    Ok(PathBuf::from(value))
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  quiz run --exam <file> [--practice] [--shuffle] [--show-answers-at-end] [--resume <session.json>]"
    );
    eprintln!("  quiz sessions        # list saved sessions, newest first");
    eprintln!("  quiz mistakes        # every incorrect answer across results");
    eprintln!("  quiz clear-sessions  # delete all saved sessions");
    eprintln!();
    eprintln!("Global flags:");
    eprintln!("  --sessions-dir <dir>  (default data/sessions)");
    eprintln!("  --results-dir <dir>   (default results)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_SESSIONS_DIR, QUIZ_RESULTS_DIR, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Sessions,
    Mistakes,
    ClearSessions,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "sessions" => Some(Self::Sessions),
            "mistakes" => Some(Self::Mistakes),
            "clear-sessions" => Some(Self::ClearSessions),
            _ => None,
        }
    }
}

struct Args {
    store: StoreConfig,
    exam: Option<PathBuf>,
    resume: Option<PathBuf>,
    options: SessionOptions,
}

impl Args {
    fn parse(cmd: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut store = StoreConfig::from_env();
        let mut exam = None;
        let mut resume = None;
        let mut options = SessionOptions::default();

        while let Some(arg) = args.next() {
            match (arg.as_str(), cmd) {
                ("--sessions-dir", _) => store.sessions_dir = require_path(args, "--sessions-dir")?,
                ("--results-dir", _) => store.results_dir = require_path(args, "--results-dir")?,
                ("--exam", Command::Run) => exam = Some(require_path(args, "--exam")?),
                ("--resume", Command::Run) => resume = Some(require_path(args, "--resume")?),
                ("--practice", Command::Run) => options = options.with_practice(true),
                ("--shuffle", Command::Run) => options = options.with_shuffle(true),
                ("--show-answers-at-end", Command::Run) => {
                    options = options.with_show_answer_at_end(true);
                }
                ("--help" | "-h", _) => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if cmd == Command::Run && exam.is_none() {
            return Err(ArgsError::MissingExam);
        }

        Ok(Self {
            store,
            exam,
            resume,
            options,
        })
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(cmd, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::filesystem(&parsed.store);
    tracing::debug!(
        sessions = %parsed.store.sessions_dir.display(),
        results = %parsed.store.results_dir.display(),
        "using store directories"
    );

    match cmd {
        Command::Run => run_quiz(&parsed, &storage).await,
        Command::Sessions => list_sessions(&storage),
        Command::Mistakes => list_mistakes(&storage),
        Command::ClearSessions => {
            let removed = SessionHistory::new(&storage).clear_sessions()?;
            println!("Deleted {removed} session file(s).");
            Ok(())
        }
    }
}

// ─── INTERACTIVE LOOP ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

async fn run_quiz(args: &Args, storage: &Storage) -> Result<(), Box<dyn std::error::Error>> {
    let exam = args.exam.as_deref().ok_or(ArgsError::MissingExam)?;
    let clock = Clock::default();
    let mut session = match &args.resume {
        Some(path) => QuizSession::resume_from(exam, path, args.options, storage, clock)?,
        None => QuizSession::open(exam, args.options, storage, clock)?,
    };

    session.subscribe(|event| {
        if let Some(text) = render::render_event(event) {
            println!("{text}");
        }
    });
    print_controls();
    session.begin();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if apply(&mut session, &line) == Flow::Exit {
                        break;
                    }
                }
                None => {
                    session.close_window();
                    break;
                }
            },
            _ = ticker.tick() => {
                session.tick();
            }
            signal = &mut shutdown => {
                if let Err(err) = signal {
                    tracing::warn!(error = %err, "signal listener failed");
                }
                tracing::info!("shutdown requested, saving session");
                session.on_signal();
                break;
            }
        }
    }

    Ok(())
}

fn apply(session: &mut QuizSession, line: &str) -> Flow {
    let input = match Input::parse(line) {
        Ok(input) => input,
        Err(err) => {
            println!("{err}");
            return Flow::Continue;
        }
    };

    match input {
        Input::Select(keys) => {
            for key in keys {
                let checked = !session.engine().selected().contains(&key);
                if let Err(reason) = session.select_option(&key, checked) {
                    println!("cannot select {key}: {reason}");
                    break;
                }
            }
        }
        Input::Show => {
            if let ValidationOutcome::Blocked(reason) = session.show_answer() {
                println!("cannot check answer: {reason}");
            }
        }
        Input::Next => report_nav(session.next()),
        Input::Previous => report_nav(session.previous()),
        Input::Jump(index) => report_nav(session.jump_to(index)),
        Input::Pause => {
            let paused = session.toggle_pause();
            println!("{}", if paused { "Paused." } else { "Resumed." });
        }
        Input::Review => {
            if let Err(reason) = session.enter_review() {
                println!("cannot review: {reason}");
            }
        }
        Input::Study => {
            if let Err(reason) = session.enter_study() {
                println!("cannot study: {reason}");
            }
        }
        Input::Status => {
            let progress = session.progress();
            println!(
                "{} | answered {}/{} ({:.0}%) | time {}",
                session.engine().status_text(),
                progress.answered,
                progress.total,
                progress.percent_answered(),
                session.elapsed_text()
            );
        }
        Input::Save => {
            if session.save_now() {
                println!("Session saved.");
            }
        }
        Input::Quit => {
            session.quit();
            println!("Session saved. Bye.");
            return Flow::Exit;
        }
        Input::Help => print_controls(),
        Input::Empty => {}
    }
    Flow::Continue
}

fn report_nav(outcome: NavOutcome) {
    match outcome {
        NavOutcome::Blocked(reason) => println!("cannot move: {reason}"),
        NavOutcome::Moved | NavOutcome::Completed(_) | NavOutcome::ReviewEnded => {}
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

// ─── HISTORY COMMANDS ──────────────────────────────────────────────────────────

fn list_sessions(storage: &Storage) -> Result<(), Box<dyn std::error::Error>> {
    let items = SessionHistory::new(storage).list_sessions()?;
    if items.is_empty() {
        println!("No saved sessions.");
        return Ok(());
    }
    for item in &items {
        let warning = if item.status == SessionStatus::PossiblyCrashed {
            " (!)"
        } else {
            ""
        };
        println!(
            "{}  {}  [{}{warning}]  {}  {} of {} answered  time {}",
            item.session_date.format("%Y-%m-%d %H:%M:%S"),
            item.exam_title,
            item.status.label(),
            item.progress_text(),
            item.total_answered,
            item.total_questions,
            format_elapsed(item.elapsed),
        );
        println!("    {}", item.path.display());
    }
    Ok(())
}

fn list_mistakes(storage: &Storage) -> Result<(), Box<dyn std::error::Error>> {
    let mistakes = SessionHistory::new(storage).aggregate_mistakes()?;
    if mistakes.is_empty() {
        println!("No incorrect answers recorded.");
        return Ok(());
    }
    for entry in &mistakes {
        println!(
            "[{}] {}",
            entry.completed_at.format("%Y-%m-%d %H:%M"),
            entry.exam_title
        );
        println!("  Q: {}", entry.record.question_text);
        println!("  Your answer: {}", entry.record.your_answer_text);
        println!("  Correct answer: {}", entry.record.correct_answer_text);
    }
    println!("{} incorrect answer(s).", mistakes.len());
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
