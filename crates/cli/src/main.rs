use std::collections::HashSet;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError};

use fieldcount_core::matching::domain::match_context::MatchContext;
use fieldcount_core::matching::domain::match_logger::{
    CompositeMatchResultLogger, MatchResultLogger,
};
use fieldcount_core::matching::domain::match_result::MatchResult;
use fieldcount_core::matching::domain::pending_item::PendingId;
use fieldcount_core::matching::fast_path_matcher::FastPathMatcher;
use fieldcount_core::matching::infrastructure::fuzzy_alias_matcher::FuzzyAliasMatcher;
use fieldcount_core::matching::infrastructure::in_memory_alias_index::InMemoryAliasIndex;
use fieldcount_core::matching::infrastructure::jsonl_match_logger::JsonlMatchResultLogger;
use fieldcount_core::matching::infrastructure::log_match_logger::LogMatchResultLogger;
use fieldcount_core::matching::matcher_config::MatcherConfig;
use fieldcount_core::matching::pending_match_buffer::PendingMatchBuffer;
use fieldcount_core::pipeline::match_hypothesis_use_case::{MatchHypothesisUseCase, Submission};

/// Matches spoken species observations against an alias table.
///
/// Reads one hypothesis per line from stdin: `text` or `text<TAB>confidence`.
/// Lines starting with `~` are partial hypotheses for the next final line.
#[derive(Parser)]
#[command(name = "fieldcount")]
struct Cli {
    /// Alias table (JSON).
    #[arg(long)]
    aliases: PathBuf,

    /// Species pinned to tiles (comma-separated ids).
    #[arg(long, value_delimiter = ',')]
    tiles: Vec<String>,

    /// Species allowed at the current site (comma-separated ids).
    #[arg(long, value_delimiter = ',')]
    site: Vec<String>,

    /// Matcher config file. Defaults to the per-user config if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Append every match result as a JSON line to this file.
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Confidence for lines without an explicit one (0.0-1.0).
    #[arg(long, default_value = "1.0")]
    default_confidence: f32,
}

/// Result delivered by the pending buffer's worker.
enum Event {
    Resolved(PendingId, MatchResult),
    TimedOut(PendingId, String),
}

#[derive(Debug, PartialEq)]
enum Line {
    Partial(String),
    Final { text: String, confidence: f32 },
    Blank,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = match &cli.config {
        Some(path) => MatcherConfig::load(path)?,
        None => MatcherConfig::load_or_default(),
    };

    let index = Arc::new(InMemoryAliasIndex::from_json_file(&cli.aliases)?);
    let context = Arc::new(build_context(&cli, &index));
    let logger = build_logger(&cli)?;

    let fuzzy = Arc::new(FuzzyAliasMatcher::new(
        Arc::clone(&index),
        config.fuzzy.clone(),
    ));
    let pending = PendingMatchBuffer::new(fuzzy, Arc::clone(&logger), &config)?;
    let fast_path = FastPathMatcher::with_threshold(index, config.site_confidence_threshold);
    let use_case = MatchHypothesisUseCase::new(fast_path, pending, logger);

    let (tx, rx) = crossbeam_channel::unbounded();
    let result_tx = tx.clone();
    use_case
        .pending()
        .set_result_listener(Arc::new(move |id: PendingId, result: &MatchResult| {
            let _ = result_tx.send(Event::Resolved(id, result.clone()));
        }));
    use_case
        .pending()
        .set_timeout_listener(Arc::new(move |id: PendingId, text: &str| {
            let _ = tx.send(Event::TimedOut(id, text.to_string()));
        }));

    let mut outstanding: HashSet<PendingId> = HashSet::new();
    let mut partials: Vec<String> = Vec::new();

    for line in io::stdin().lock().lines() {
        match parse_line(&line?, cli.default_confidence) {
            Line::Blank => {}
            Line::Partial(text) => partials.push(text),
            Line::Final { text, confidence } => {
                let attached = std::mem::take(&mut partials);
                match use_case.submit(&text, confidence, &context, attached) {
                    Submission::Accepted(result) => println!("{result}"),
                    Submission::Deferred(id) => {
                        println!("pending {id}: \"{text}\"");
                        outstanding.insert(id);
                    }
                    Submission::Dropped => println!("dropped: \"{text}\""),
                }
            }
        }
        while let Ok(event) = rx.try_recv() {
            print_event(event, &mut outstanding);
        }
    }

    drain(&rx, &mut outstanding, drain_idle_limit(&config));
    use_case.shutdown();
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.aliases.exists() {
        return Err(format!("Alias file not found: {}", cli.aliases.display()).into());
    }
    if !(0.0..=1.0).contains(&cli.default_confidence) {
        return Err(format!(
            "Default confidence must be between 0.0 and 1.0, got {}",
            cli.default_confidence
        )
        .into());
    }
    Ok(())
}

fn build_context(cli: &Cli, index: &InMemoryAliasIndex) -> MatchContext {
    let known: HashSet<&str> = index
        .display_names()
        .iter()
        .map(|(id, _)| id.as_str())
        .collect();
    for id in cli.tiles.iter().chain(cli.site.iter()) {
        if !known.contains(id.as_str()) {
            log::warn!("Unknown species id \"{id}\" in --tiles/--site");
        }
    }

    MatchContext::new()
        .with_tiles(cli.tiles.iter().cloned())
        .with_site_allowed(cli.site.iter().cloned())
        .with_species(index.display_names().iter().cloned())
}

fn build_logger(cli: &Cli) -> Result<Arc<dyn MatchResultLogger>, Box<dyn std::error::Error>> {
    let mut loggers: Vec<Arc<dyn MatchResultLogger>> = vec![Arc::new(LogMatchResultLogger)];
    if let Some(path) = &cli.audit_log {
        let audit = JsonlMatchResultLogger::open(path)
            .map_err(|e| format!("Cannot open audit log {}: {e}", path.display()))?;
        loggers.push(Arc::new(audit));
    }
    Ok(Arc::new(CompositeMatchResultLogger::new(loggers)))
}

fn parse_line(line: &str, default_confidence: f32) -> Line {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(partial) = line.strip_prefix('~') {
        return Line::Partial(partial.trim().to_string());
    }
    if line.trim().is_empty() {
        return Line::Blank;
    }

    match line.rsplit_once('\t') {
        Some((text, conf)) => match conf.trim().parse::<f32>() {
            Ok(confidence) => Line::Final {
                text: text.trim().to_string(),
                confidence,
            },
            Err(_) => {
                log::warn!("Ignoring unparsable confidence \"{conf}\"");
                Line::Final {
                    text: text.trim().to_string(),
                    confidence: default_confidence,
                }
            }
        },
        None => Line::Final {
            text: line.trim().to_string(),
            confidence: default_confidence,
        },
    }
}

/// Longest quiet period worth waiting for: one item running through every
/// attempt, plus slack.
fn drain_idle_limit(config: &MatcherConfig) -> Duration {
    config
        .match_timeout()
        .saturating_mul(config.max_retries.saturating_add(1))
        .saturating_add(Duration::from_millis(500))
}

fn drain(rx: &Receiver<Event>, outstanding: &mut HashSet<PendingId>, idle_limit: Duration) {
    while !outstanding.is_empty() {
        match rx.recv_timeout(idle_limit) {
            Ok(event) => print_event(event, outstanding),
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Giving up on {} pending hypotheses (evicted or still running)",
                    outstanding.len()
                );
                return;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn print_event(event: Event, outstanding: &mut HashSet<PendingId>) {
    match event {
        Event::Resolved(id, result) => {
            outstanding.remove(&id);
            println!("{id}: {result}");
        }
        Event::TimedOut(id, text) => {
            outstanding.remove(&id);
            println!("{id}: timed out \"{text}\"");
        }
    }
}
