use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use moodboard_contracts::board::{Board, BoardItem, GenerationContext, ItemKind, Point, Viewport};
use moodboard_contracts::catalog::{
    seed_board_items, Region, COLOR_SWATCHES, ELEMENTS, MOTIFS, NAMED_COLORS, THEMES,
};
use moodboard_contracts::events::EventWriter;
use moodboard_contracts::log::{FanoutSink, LogEntry, LogLevel, LogSink, Logger};
use moodboard_contracts::prompt::build_prompt;
use moodboard_engine::{candidates, EngineConfig, MoodboardEngine};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(name = "moodboard", version, about = "Wedding moodboard generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate(GenerateArgs),
    Candidates(CandidatesArgs),
    Prompt(PromptArgs),
    Catalog(CatalogArgs),
}

/// Board items to seed the generation context with, one flag per value.
#[derive(Debug, Clone, Default, Args)]
struct ContextArgs {
    #[arg(long = "color")]
    colors: Vec<String>,
    #[arg(long = "element")]
    elements: Vec<String>,
    #[arg(long = "motif")]
    motifs: Vec<String>,
    #[arg(long = "theme")]
    themes: Vec<String>,
    #[arg(long = "ceremony")]
    ceremonies: Vec<String>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long, default_value = "")]
    prompt: String,
    #[arg(long)]
    count: Option<usize>,
    #[command(flatten)]
    context: ContextArgs,
    #[arg(long, default_value_t = Region::North)]
    region: Region,
    /// Start from the regional seed board instead of an empty one.
    #[arg(long)]
    seed_board: bool,
    #[arg(long, default_value_t = 7)]
    seed: u64,
    #[arg(long)]
    center_x: Option<f64>,
    #[arg(long)]
    center_y: Option<f64>,
    #[arg(long, default_value_t = 1280.0)]
    viewport_width: f64,
    #[arg(long, default_value_t = 800.0)]
    viewport_height: f64,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    probe_timeout: Option<f64>,
    #[arg(long)]
    brief_timeout: Option<f64>,
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Parser)]
struct CandidatesArgs {
    #[arg(long)]
    brief: String,
    #[arg(long, default_value_t = 0)]
    index: u64,
    #[arg(long)]
    time_base: Option<u64>,
}

#[derive(Debug, Parser)]
struct PromptArgs {
    #[arg(long, default_value = "")]
    prompt: String,
    #[command(flatten)]
    context: ContextArgs,
}

#[derive(Debug, Parser)]
struct CatalogArgs {
    #[arg(long, default_value_t = Region::North)]
    region: Region,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("moodboard error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Candidates(args) => run_candidates(args),
        Command::Prompt(args) => run_prompt(args),
        Command::Catalog(args) => run_catalog(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let mut config = EngineConfig::from_env();
    if let Some(secs) = args.probe_timeout {
        config = config.with_probe_timeout_secs(secs);
    }
    if let Some(secs) = args.brief_timeout {
        config = config.with_brief_timeout_secs(secs);
    }

    let logger = build_logger(args.events.clone(), args.quiet);
    let engine = MoodboardEngine::new(config, logger)?;

    let mut board = Board::new();
    if args.seed_board {
        board.replace_all(seed_board_items(args.region, args.seed));
    }
    board
        .append_many(context_items(&args.context))
        .context("failed to add context items to the board")?;

    let mut viewport = Viewport::new(args.viewport_width, args.viewport_height);
    let current = viewport.center();
    viewport.pan_by(
        current.x - args.center_x.unwrap_or(current.x),
        current.y - args.center_y.unwrap_or(current.y),
    );

    let outcome = engine.generate_onto(&mut board, &viewport, &args.prompt, args.count)?;
    let report = json!({
        "prompt": outcome.prompt,
        "placeholder": outcome.placeholder.map(|tag| tag.label()),
        "grid": { "columns": outcome.shape.columns, "rows": outcome.shape.rows },
        "center": viewport.center(),
        "board": board,
    });
    print_json(&report)?;
    Ok(0)
}

fn run_candidates(args: CandidatesArgs) -> Result<i32> {
    let time_base = args.time_base.unwrap_or_else(unix_millis);
    for url in candidates::synthesize(&args.brief, args.index, time_base) {
        println!("{url}");
    }
    Ok(0)
}

fn run_prompt(args: PromptArgs) -> Result<i32> {
    let items = context_items(&args.context);
    let context = GenerationContext::from_items(&items);
    println!("{}", build_prompt(&args.prompt, &context));
    Ok(0)
}

fn run_catalog(args: CatalogArgs) -> Result<i32> {
    let report = json!({
        "colors": COLOR_SWATCHES,
        "namedColors": NAMED_COLORS,
        "elements": ELEMENTS,
        "motifs": MOTIFS,
        "themes": THEMES,
        "region": args.region,
        "ceremoniesLabel": args.region.label(),
        "ceremonies": args.region.ceremonies(),
    });
    print_json(&report)?;
    Ok(0)
}

fn print_json(value: &Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}

/// Context flags as board items, stacked in a column left of the origin.
fn context_items(args: &ContextArgs) -> Vec<BoardItem> {
    let groups = [
        (ItemKind::Color, &args.colors),
        (ItemKind::Element, &args.elements),
        (ItemKind::Motif, &args.motifs),
        (ItemKind::Theme, &args.themes),
        (ItemKind::Ceremony, &args.ceremonies),
    ];
    groups
        .into_iter()
        .flat_map(|(kind, values)| {
            values
                .iter()
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(move |value| (kind, value.to_string()))
        })
        .enumerate()
        .map(|(idx, (kind, value))| {
            BoardItem::with_id(
                format!("cli-{}-{idx}", kind.as_str()),
                kind,
                value,
                Point::new(-240.0, idx as f64 * 48.0),
            )
        })
        .collect()
}

fn build_logger(events: Option<PathBuf>, quiet: bool) -> Logger {
    let mut fanout = FanoutSink::default();
    if !quiet {
        fanout.push(Arc::new(StderrSink));
    }
    if let Some(path) = events {
        let session_id = format!("moodboard-{}", unix_millis());
        fanout.push(Arc::new(EventWriter::new(path, session_id)));
    }
    Logger::new(Arc::new(fanout))
}

struct StderrSink;

impl LogSink for StderrSink {
    fn record(&self, entry: &LogEntry) -> Result<()> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{}", format_log_line(entry))?;
        Ok(())
    }
}

fn format_log_line(entry: &LogEntry) -> String {
    let prefix = match entry.level {
        LogLevel::Info => "[gen]",
        LogLevel::Error => "[gen] error:",
    };
    match &entry.data {
        Some(data) => format!("{prefix} {} {data}", entry.message),
        None => format!("{prefix} {}", entry.message),
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
