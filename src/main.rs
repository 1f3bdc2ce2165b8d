use std::collections::HashSet;
use std::io::IsTerminal;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use strata_core::{OutputFormat, StatsSummary, StrataConfig, TimeWindow};
use strata_pulse::cache::{JsonCache, StatsCache};
use strata_pulse::graph::CommitGraph;
use strata_pulse::mining::{GitRepository, MiningOptions};
use strata_pulse::snapshot::WindowSnapshot;
use strata_pulse::store::WindowStore;

#[derive(Parser)]
#[command(
    name = "strata",
    version,
    about = "Software-evolution metrics mined from git history",
    long_about = "strata reconstructs the history of every file in a repository and reports\n\
                   how it evolved: revisions, churn, temporal coupling, indentation complexity,\n\
                   edit proximity and authorship.\n\n\
                   Examples:\n  \
                     strata init                                   Create a .strata.toml config file\n  \
                     strata mine --path .                          Mine history into the cache\n  \
                     strata history --analysis revisions           Most revised files\n  \
                     strata history --analysis coupling --file src/lib.rs\n  \
                     git diff HEAD~1 | strata diff                 Edit proximity of a diff"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .strata.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable tables and summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Mine new commits into the stats cache
    #[command(long_about = "Mine new commits into the stats cache.\n\n\
        Renders the history after the newest cached commit, computes per-revision\n\
        complexity, line counts and proximity for the new commits, and stores the\n\
        result under the cache directory. Re-running is cheap when nothing changed.\n\n\
        Examples:\n  strata mine --path .\n  strata mine --branch main")]
    Mine {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Branch to mine (default: from config, else HEAD)
        #[arg(long)]
        branch: Option<String>,
    },
    /// Analyze the mined history over a time window
    #[command(
        long_about = "Analyze the mined history over a time window.\n\n\
        The window ends at --end (default: the newest commit) and starts at --begin,\n\
        or --since days earlier. The cache is brought up to date first.\n\n\
        Examples:\n  strata history --analysis revisions --since 90\n  \
        strata history --analysis coupling --file src/parser.c\n  \
        strata history --analysis complexity --file src/parser.c --begin 2020-01-01"
    )]
    History {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Analysis type
        #[arg(long, default_value = "revisions")]
        analysis: HistoryAnalysis,

        /// File to analyze (coupling, complexity and authors)
        #[arg(long)]
        file: Option<String>,

        /// Window length in days (default: from config, 365)
        #[arg(long)]
        since: Option<u64>,

        /// Window start, as YYYY-MM-DD or RFC 3339
        #[arg(long)]
        begin: Option<String>,

        /// Window end, as YYYY-MM-DD or RFC 3339
        #[arg(long)]
        end: Option<String>,

        /// Maximum results to show (default: 20)
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Co-change count a coupled file must exceed (overrides config)
        #[arg(long)]
        min_co_changes: Option<u32>,

        /// Co-change ratio a coupled file must exceed (overrides config)
        #[arg(long)]
        min_ratio: Option<f64>,
    },
    /// Measure edit proximity of a unified diff
    #[command(long_about = "Measure edit proximity of a unified diff.\n\n\
        Reads a diff from stdin or a file and reports, per file, the sum of gaps\n\
        between the hunks it touches.\n\n\
        Examples:\n  git diff | strata diff\n  strata diff --file changes.patch")]
    Diff {
        /// Read diff from file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Create a default .strata.toml configuration file
    #[command(long_about = "Create a default .strata.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .strata.toml already exists.")]
    Init,
}

#[derive(Clone, Copy, ValueEnum)]
enum HistoryAnalysis {
    /// Revisions, churn and sum of coupling per file
    Revisions,
    /// Files changing together with --file
    Coupling,
    /// Indentation complexity of --file per revision
    Complexity,
    /// Edit proximity per file
    Proximity,
    /// Main authors of --file
    Authors,
    /// Revisions rolled up per configured module
    Modules,
    /// Per-file metrics at the window end, stored in the window database
    Snapshot,
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mstrata\x1b[0m v{version}: software-evolution metrics from git history\n");

        println!("Quick start:");
        println!("  \x1b[36mstrata init\x1b[0m                   Create a .strata.toml config file");
        println!("  \x1b[36mstrata mine --path .\x1b[0m          Mine history into the cache");
        println!("  \x1b[36mstrata history\x1b[0m                Most revised files of the last year\n");

        println!("All commands:");
        println!("  \x1b[32mmine\x1b[0m      Incrementally update the stats cache");
        println!("  \x1b[32mhistory\x1b[0m   Revisions, coupling, complexity, proximity, authors, modules");
        println!("  \x1b[32mdiff\x1b[0m      Edit proximity of a unified diff");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("strata v{version}: software-evolution metrics from git history\n");

        println!("Quick start:");
        println!("  strata init                   Create a .strata.toml config file");
        println!("  strata mine --path .          Mine history into the cache");
        println!("  strata history                Most revised files of the last year\n");

        println!("All commands:");
        println!("  mine      Incrementally update the stats cache");
        println!("  history   Revisions, coupling, complexity, proximity, authors, modules");
        println!("  diff      Edit proximity of a unified diff");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'strata <command> --help' for details.");
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("STRATA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn read_diff_input(file: &Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            Ok(input)
        }
    }
}

fn open_repository(path: &Path) -> Result<GitRepository> {
    GitRepository::open(path).map_err(|e| {
        miette::miette!(
            help = "Run strata from inside a git repository, or specify --path to one",
            "{}",
            e
        )
    })
}

fn cache_dir(path: &Path, config: &StrataConfig) -> PathBuf {
    if config.cache.dir.is_absolute() {
        config.cache.dir.clone()
    } else {
        path.join(&config.cache.dir)
    }
}

fn spinner(message: &'static str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
    {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

/// Mine new commits into the cache, with a spinner on interactive terminals.
fn mine(
    repo: &GitRepository,
    cache: &JsonCache,
    options: &MiningOptions,
) -> Result<strata_pulse::update::UpdateSummary> {
    let pb = spinner("Mining history...");
    let summary = strata_pulse::update::update_cache(repo, cache, options).inspect_err(|_e| {
        if let Some(pb) = &pb {
            pb.finish_with_message("Failed");
        }
    })?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    for conflict in &summary.conflicts {
        eprintln!(
            "warning: {} renamed {} onto {}, which already had history; kept it",
            conflict.sha, conflict.old_filename, conflict.filename
        );
    }
    Ok(summary)
}

/// Parse a window bound. A bare date means the start of that day (UTC), or
/// its last second when `end_of_day` is set.
fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<FixedOffset>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Ok(time);
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .into_diagnostic()
        .wrap_err(format!("invalid date '{raw}', expected YYYY-MM-DD or RFC 3339"))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| miette::miette!("invalid time of day"))?;
    Ok(date.and_time(time).and_utc().fixed_offset())
}

fn resolve_window(
    graph: &CommitGraph,
    begin: Option<&str>,
    end: Option<&str>,
    since_days: u64,
) -> Result<TimeWindow> {
    let end = match end {
        Some(raw) => parse_bound(raw, true)?,
        None => graph
            .last()
            .map(|commit| commit.creation_time)
            .unwrap_or_else(|| Utc::now().fixed_offset()),
    };
    let window = match begin {
        Some(raw) => TimeWindow::new(parse_bound(raw, false)?, end),
        None => TimeWindow::last_days(end, since_days),
    };
    if window.begin > window.end {
        miette::bail!("window begins after it ends");
    }
    Ok(window)
}

fn require_file(file: Option<&str>, analysis: &str) -> Result<String> {
    file.map(str::to_string).ok_or_else(|| {
        miette::miette!(
            help = "pass the repository-relative path, e.g. --file src/main.c",
            "the {} analysis needs --file",
            analysis
        )
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn day(time: &DateTime<FixedOffset>) -> String {
    time.format("%Y-%m-%d").to_string()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProximityRow {
    file: String,
    revisions: usize,
    proximity: StatsSummary,
}

const DEFAULT_CONFIG: &str = r#"# strata configuration

# Project name, used for the module fallback and the window database
# project = "my-project"

[history]
# branch = "main"
# since_days = 365

[coupling]
# Both thresholds are strict: a file must exceed them to be reported
# min_co_changes = 2
# min_ratio = 0.2

[authors]
# max_authors = 3
# weight = "revisions"    # or "added_lines"

[cache]
# dir = ".strata"

# Module rollup rules, first match wins
# [[modules]]
# name = "parser"
# pattern = "src/parser/**"
"#;

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => StrataConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".strata.toml");
            if default_path.exists() {
                StrataConfig::from_file(default_path)?
            } else {
                StrataConfig::default()
            }
        }
    };
    tracing::debug!(format = %cli.format, modules = config.modules.len(), "configuration loaded");

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
        }
        Some(Command::Mine {
            ref path,
            ref branch,
        }) => {
            let repo = open_repository(path)?;
            let cache = JsonCache::new(&cache_dir(path, &config));
            let options = MiningOptions {
                branch: branch.clone().or_else(|| config.history.branch.clone()),
                ..MiningOptions::default()
            };
            let summary = mine(&repo, &cache, &options)?;

            match cli.format {
                OutputFormat::Json => print_json(&summary)?,
                OutputFormat::Markdown => {
                    println!("# Mining Summary\n");
                    println!("- **New commits:** {}", summary.new_commits);
                    println!("- **Total commits:** {}", summary.total_commits);
                    println!("- **Files with stats:** {}", summary.files);
                }
                OutputFormat::Text => {
                    println!(
                        "Mined {} new commits ({} total, {} files) into {}",
                        summary.new_commits,
                        summary.total_commits,
                        summary.files,
                        cache.dir().display()
                    );
                }
            }
        }
        Some(Command::History {
            ref path,
            analysis,
            ref file,
            since,
            ref begin,
            ref end,
            limit,
            min_co_changes,
            min_ratio,
        }) => {
            let repo = open_repository(path)?;
            let cache = JsonCache::new(&cache_dir(path, &config));
            let options = MiningOptions {
                branch: config.history.branch.clone(),
                ..MiningOptions::default()
            };
            let summary = mine(&repo, &cache, &options)?;
            tracing::info!(new = summary.new_commits, "cache ready");

            let graph = cache.load_graph()?;
            let window = resolve_window(
                &graph,
                begin.as_deref(),
                end.as_deref(),
                since.unwrap_or(config.history.since_days),
            )?;
            let file = file.as_deref();

            match analysis {
                HistoryAnalysis::Revisions => {
                    let report = strata_pulse::revisions::revisions(&graph, &window)?;
                    let top: Vec<_> = report.files.iter().take(limit).collect();
                    match cli.format {
                        OutputFormat::Json => print_json(&top)?,
                        OutputFormat::Markdown => {
                            println!("# Revisions ({})\n", window);
                            println!("| Rank | File | Revisions | Churn | SoC | Last change |");
                            println!("|------|------|-----------|-------|-----|-------------|");
                            for (i, f) in top.iter().enumerate() {
                                println!(
                                    "| {} | `{}` | {} | {} | {} | {} |",
                                    i + 1,
                                    f.path,
                                    f.revisions,
                                    f.total_churn(),
                                    f.soc,
                                    day(&f.last_change)
                                );
                            }
                        }
                        OutputFormat::Text => {
                            println!("Revisions {} (top {limit}):", window);
                            println!("{:-<72}", "");
                            for (i, f) in top.iter().enumerate() {
                                println!(
                                    "{:>2}. {:<40} rev={}  churn={}  soc={}{}",
                                    i + 1,
                                    f.path,
                                    f.revisions,
                                    f.total_churn(),
                                    f.soc,
                                    if f.live { "" } else { "  (gone)" }
                                );
                            }
                        }
                    }
                    for conflict in &report.conflicts {
                        eprintln!(
                            "warning: {} renamed {} onto {}, which was still in use",
                            conflict.sha, conflict.old_filename, conflict.filename
                        );
                    }
                }
                HistoryAnalysis::Coupling => {
                    let file = require_file(file, "coupling")?;
                    let mut thresholds = config.coupling;
                    if let Some(min) = min_co_changes {
                        thresholds.min_co_changes = min;
                    }
                    if let Some(min) = min_ratio {
                        thresholds.min_ratio = min;
                    }
                    let mut report =
                        strata_pulse::coupling::couplings(&graph, &file, &window, &thresholds)?;
                    report.coupled.truncate(limit);
                    match cli.format {
                        OutputFormat::Json => print_json(&report)?,
                        OutputFormat::Markdown => {
                            println!("# Temporal Coupling of `{}`\n", report.file);
                            println!("**Revisions:** {}\n", report.revisions);
                            if report.coupled.is_empty() {
                                println!("No significant coupling detected.");
                            } else {
                                println!("| File | Co-changes | Ratio |");
                                println!("|------|------------|-------|");
                                for c in &report.coupled {
                                    println!("| `{}` | {} | {:.2} |", c.path, c.co_changes, c.ratio);
                                }
                            }
                        }
                        OutputFormat::Text => {
                            println!(
                                "Coupling of {} ({} revisions, {}):",
                                report.file,
                                report.revisions,
                                window
                            );
                            println!("{:-<72}", "");
                            if report.coupled.is_empty() {
                                println!("No significant coupling detected.");
                            }
                            for c in &report.coupled {
                                println!(
                                    "{:<48} co-changes={}  ratio={:.2}",
                                    c.path, c.co_changes, c.ratio
                                );
                            }
                        }
                    }
                }
                HistoryAnalysis::Complexity => {
                    let file = require_file(file, "complexity")?;
                    let stats = cache.load_stats()?;
                    let rows = strata_pulse::trend::complexity_trend(
                        &graph, &stats, &repo, &file, &window,
                    )?;
                    match cli.format {
                        OutputFormat::Json => print_json(&rows)?,
                        OutputFormat::Markdown => {
                            println!("# Complexity of `{file}`\n");
                            println!("| Revision | Date | Lines | Total | Mean | SD | Max |");
                            println!("|----------|------|-------|-------|------|----|-----|");
                            for r in &rows {
                                println!(
                                    "| `{}` | {} | {} | {:.0} | {:.2} | {:.2} | {:.0} |",
                                    r.sha,
                                    day(&r.time),
                                    r.lines,
                                    r.complexity.total,
                                    r.complexity.mean,
                                    r.complexity.sd,
                                    r.complexity.max
                                );
                            }
                        }
                        OutputFormat::Text => {
                            println!("Complexity of {file} ({}):", window);
                            println!("{:-<72}", "");
                            for r in &rows {
                                println!(
                                    "{} {}  lines={}  total={:.0}  mean={:.2}  sd={:.2}  max={:.0}",
                                    r.sha,
                                    day(&r.time),
                                    r.lines,
                                    r.complexity.total,
                                    r.complexity.mean,
                                    r.complexity.sd,
                                    r.complexity.max
                                );
                            }
                        }
                    }
                }
                HistoryAnalysis::Proximity => {
                    let stats = cache.load_stats()?;
                    let samples =
                        strata_pulse::trend::proximity_trend(&graph, &stats, &repo, &window)?;
                    let rows: Vec<ProximityRow> = samples
                        .iter()
                        .take(limit)
                        .map(|sample| ProximityRow {
                            file: sample.name().to_string(),
                            revisions: sample.count(),
                            proximity: sample.summary(),
                        })
                        .collect();
                    match cli.format {
                        OutputFormat::Json => print_json(&rows)?,
                        OutputFormat::Markdown => {
                            println!("# Proximity ({})\n", window);
                            println!("| File | Revisions | Total | Mean | Max |");
                            println!("|------|-----------|-------|------|-----|");
                            for r in &rows {
                                println!(
                                    "| `{}` | {} | {:.0} | {:.1} | {:.0} |",
                                    r.file,
                                    r.revisions,
                                    r.proximity.total,
                                    r.proximity.mean,
                                    r.proximity.max
                                );
                            }
                        }
                        OutputFormat::Text => {
                            println!("Proximity {} (top {limit}):", window);
                            println!("{:-<72}", "");
                            for (i, r) in rows.iter().enumerate() {
                                println!(
                                    "{:>2}. {:<40} total={:.0}  mean={:.1}  max={:.0}",
                                    i + 1,
                                    r.file,
                                    r.proximity.total,
                                    r.proximity.mean,
                                    r.proximity.max
                                );
                            }
                        }
                    }
                }
                HistoryAnalysis::Authors => {
                    let file = require_file(file, "authors")?;
                    let summary = strata_pulse::ownership::authors(&graph, &file, &config.authors)?;
                    match cli.format {
                        OutputFormat::Json => print_json(&summary)?,
                        OutputFormat::Markdown => {
                            println!("# Authors of `{file}`\n");
                            println!("**Distinct authors:** {}\n", summary.distinct_count);
                            for a in &summary.authors {
                                println!("- {} ({:.0}%)", a.name, a.fraction * 100.0);
                            }
                        }
                        OutputFormat::Text => {
                            println!("Authors of {file} ({} distinct):", summary.distinct_count);
                            println!("{:-<72}", "");
                            for a in &summary.authors {
                                println!("{:<40} {:>5.1}%", a.name, a.fraction * 100.0);
                            }
                        }
                    }
                }
                HistoryAnalysis::Modules => {
                    let modules = strata_pulse::revisions::module_revisions(
                        &graph,
                        &window,
                        &config.modules,
                        config.project_name(),
                    )?;
                    let top: Vec<_> = modules.iter().take(limit).collect();
                    match cli.format {
                        OutputFormat::Json => print_json(&top)?,
                        OutputFormat::Markdown => {
                            println!("# Modules ({})\n", window);
                            println!("| Module | Revisions | SoC | Last change |");
                            println!("|--------|-----------|-----|-------------|");
                            for m in &top {
                                println!(
                                    "| {} | {} | {} | {} |",
                                    m.name,
                                    m.revisions,
                                    m.soc,
                                    day(&m.last_change)
                                );
                            }
                        }
                        OutputFormat::Text => {
                            println!("Modules {}:", window);
                            println!("{:-<72}", "");
                            for m in &top {
                                println!("{:<40} rev={}  soc={}", m.name, m.revisions, m.soc);
                            }
                        }
                    }
                }
                HistoryAnalysis::Snapshot => {
                    let store = WindowStore::open(&cache.dir().join("windows.db"))?;
                    let project = config.project_name();
                    let (mut snapshot, reused) = match store.read_window(project, &window)? {
                        Some(stored) => {
                            let snapshot: WindowSnapshot = serde_json::from_value(stored.stats)
                                .into_diagnostic()
                                .wrap_err("stored window snapshot is unreadable")?;
                            (snapshot, true)
                        }
                        None => {
                            let present: HashSet<String> = match graph
                                .commits()
                                .filter(|commit| commit.creation_time <= window.end)
                                .next_back()
                            {
                                Some(commit) => repo.files_at(&commit.sha)?.into_iter().collect(),
                                None => HashSet::new(),
                            };
                            let stats = cache.load_stats()?;
                            let snapshot = strata_pulse::snapshot::window_metrics(
                                &graph, &window, &present, &stats, &repo, &config,
                            )?;
                            store.store_window(project, &window, &snapshot)?;
                            (snapshot, false)
                        }
                    };
                    tracing::info!(reused, project, "window snapshot");

                    snapshot.files.truncate(limit);
                    match cli.format {
                        OutputFormat::Json => print_json(&snapshot)?,
                        OutputFormat::Markdown => {
                            println!("# Snapshot ({})\n", window);
                            println!("| File | Revisions | Lines | Complexity | Proximity | Top author |");
                            println!("|------|-----------|-------|------------|-----------|------------|");
                            for f in &snapshot.files {
                                let author = f
                                    .authors
                                    .as_ref()
                                    .and_then(|a| a.authors.first())
                                    .map(|a| format!("{} ({:.0}%)", a.name, a.fraction * 100.0))
                                    .unwrap_or_default();
                                println!(
                                    "| `{}` | {} | {} | {} | {} | {} |",
                                    f.path,
                                    f.revisions,
                                    f.lines.map_or("-".into(), |n| n.to_string()),
                                    f.complexity.map_or("-".into(), |c| format!("{:.0}", c.total)),
                                    f.proximity.map_or("-".into(), |p| format!("{:.0}", p.total)),
                                    author
                                );
                            }
                        }
                        OutputFormat::Text => {
                            println!("Snapshot {} (top {limit}):", window);
                            println!("{:-<72}", "");
                            for f in &snapshot.files {
                                println!(
                                    "{:<40} rev={}  lines={}  complexity={}  proximity={}",
                                    f.path,
                                    f.revisions,
                                    f.lines.map_or("-".into(), |n| n.to_string()),
                                    f.complexity.map_or("-".into(), |c| format!("{:.0}", c.total)),
                                    f.proximity.map_or("-".into(), |p| format!("{:.0}", p.total)),
                                );
                            }
                            if reused {
                                println!("\n(stored snapshot of this window)");
                            }
                        }
                    }
                }
            }
        }
        Some(Command::Diff { ref file }) => {
            let input = read_diff_input(file)?;
            let per_file = strata_difflens::proximity::proximities(&input)?;

            match cli.format {
                OutputFormat::Json => print_json(&per_file)?,
                OutputFormat::Markdown => {
                    println!("| File | Proximity |");
                    println!("|------|-----------|");
                    for (path, value) in &per_file {
                        println!("| `{path}` | {value} |");
                    }
                }
                OutputFormat::Text => {
                    for (path, value) in &per_file {
                        println!("{path:<60} {value}");
                    }
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(".strata.toml");
            if path.exists() {
                miette::bail!(".strata.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .strata.toml with default configuration");
        }
    }

    Ok(())
}
