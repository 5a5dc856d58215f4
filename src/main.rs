use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use page_patcher::rules::{
    apply_rule_sets, builtin, builtin_names, discover_rule_files, load_from_path, Report,
    RuleError, RuleOutcome, RuleSet, DEFAULT_SETS,
};
use page_patcher::{find_broken_joins, normalize_report, Document, StoreResult};
use similar::{ChangeTag, TextDiff};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILE: &str = "MobilePage.tsx";

#[derive(Parser)]
#[command(name = "page-patcher")]
#[command(about = "Idempotent rule-based patching for a generated UI page", long_about = None)]
#[command(version)]
struct Cli {
    /// Log every rule decision to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply rule sets to the target file (default command)
    Apply {
        #[command(flatten)]
        selection: Selection,

        /// Collapse blank-line runs and duplicate lines after the rules ran
        #[arg(long)]
        normalize: bool,

        /// Dry run - show what would be changed without modifying the file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Report which rules would apply, without writing
    Status {
        #[command(flatten)]
        selection: Selection,
    },

    /// Collapse blank-line runs and consecutive duplicate lines
    Normalize {
        /// Target file
        #[arg(short, long, default_value = DEFAULT_FILE)]
        file: PathBuf,

        /// Dry run - report without modifying the file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Look for join() separators split across lines
    Check {
        /// Target file
        #[arg(short, long, default_value = DEFAULT_FILE)]
        file: PathBuf,
    },

    /// List built-in rule sets and their rules
    List,
}

#[derive(Args)]
struct Selection {
    /// Target file
    #[arg(short, long, default_value = DEFAULT_FILE)]
    file: PathBuf,

    /// Built-in rule set to apply, repeatable, in order
    #[arg(short, long = "set", value_name = "NAME")]
    sets: Vec<String>,

    /// Rule file to apply after the built-in sets, repeatable, in order
    #[arg(short, long = "rules", value_name = "FILE")]
    rules: Vec<PathBuf>,

    /// Directory whose .toml rule files are applied last, in name order
    #[arg(long, value_name = "DIR")]
    rules_dir: Option<PathBuf>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_FILE),
            sets: Vec::new(),
            rules: Vec::new(),
            rules_dir: None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        None => cmd_apply(Selection::default(), false, false, false),

        Some(Commands::Apply {
            selection,
            normalize,
            dry_run,
            diff,
        }) => cmd_apply(selection, normalize, dry_run, diff),

        Some(Commands::Status { selection }) => cmd_status(selection),

        Some(Commands::Normalize {
            file,
            dry_run,
            diff,
        }) => cmd_normalize(&file, dry_run, diff),

        Some(Commands::Check { file }) => cmd_check(&file),

        Some(Commands::List) => cmd_list(),
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "page_patcher=debug"
        } else {
            "page_patcher=warn"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Helper: Resolve the rule sets a command should run, in order.
///
/// Order:
/// 1. `--set` built-in sets
/// 2. `--rules` files
/// 3. `--rules-dir` files, sorted by name
///
/// With none of these given, the default built-in sets run.
fn resolve_sets(selection: &Selection) -> Result<Vec<RuleSet>> {
    let mut sets = Vec::new();

    for name in &selection.sets {
        sets.push(builtin(name)?);
    }

    for path in &selection.rules {
        sets.push(load_from_path(path)?);
    }

    if let Some(dir) = &selection.rules_dir {
        let files = discover_rule_files(dir)?;
        if files.is_empty() {
            anyhow::bail!("No .toml rule files found in {}", dir.display());
        }
        for path in files {
            sets.push(load_from_path(&path)?);
        }
    }

    if sets.is_empty() {
        for name in DEFAULT_SETS {
            sets.push(builtin(name)?);
        }
    }

    Ok(sets)
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

/// Helper: Print one line per rule, plus diagnostics for failures.
fn print_report(report: &Report, dry_run: bool) {
    for (rule_id, result) in report.iter() {
        match result {
            Ok(RuleOutcome::Applied { replacements }) => {
                let verb = if dry_run { "Would apply" } else { "Applied" };
                println!(
                    "{} {}: {} at {} location(s)",
                    "✓".green(),
                    rule_id,
                    verb,
                    replacements
                );
            }
            Ok(RuleOutcome::AlreadyApplied) => {
                println!("{} {}: Already applied", "⊙".yellow(), rule_id);
            }
            Err(RuleError::NotFound { hint }) => {
                println!("{} {}: Not found", "⊘".cyan(), rule_id);
                if let Some(hint) = hint {
                    println!("  {}", format!("Hint: {}", hint).dimmed());
                }
            }
            Err(e) => {
                eprintln!("{} {}: Failed - {}", "✗".red(), rule_id, e);

                match e {
                    RuleError::AmbiguousMatch { count } => {
                        eprintln!(
                            "  {}",
                            format!("CONFLICT: Query matched {} locations (expected 1)", count)
                                .red()
                        );
                        eprintln!("  Action: Extend the search text so it is unique");
                    }
                    RuleError::MalformedResult(err) => {
                        let location = err.location();
                        eprintln!(
                            "  Fragment line {}, column {}: {}",
                            location.line, location.column, location.context
                        );
                        eprintln!("  Action: Escape line breaks in the replacement as \\n");
                    }
                    RuleError::NotIdempotent => {
                        eprintln!("  Action: Add a marker, or make the query miss its own output");
                    }
                    _ => {}
                }
            }
        }
    }
}

fn print_summary(report: &Report) {
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", report.applied()).green());
    println!(
        "  {} already applied",
        format!("{}", report.already_applied()).yellow()
    );
    println!("  {} not found", format!("{}", report.not_found()).cyan());
    println!("  {} failed", format!("{}", report.failed()).red());
}

/// Helper: Warn about join() separators split across lines.
fn report_broken_joins(text: &str) -> usize {
    let broken = find_broken_joins(text);
    for location in &broken {
        eprintln!(
            "{} line {}: join separator is not closed on the same line: {}",
            "⚠".yellow(),
            location.line,
            location.context.dimmed()
        );
    }
    broken.len()
}

fn cmd_apply(selection: Selection, normalize: bool, dry_run: bool, show_diff: bool) -> Result<()> {
    // 1. Resolve rule sets before touching the file
    let sets = resolve_sets(&selection)?;

    // 2. Load the document
    let mut document = Document::load(&selection.file)
        .with_context(|| format!("Could not load {}", selection.file.display()))?;

    println!("File: {}", selection.file.display());
    println!(
        "Rule sets: {}",
        sets.iter()
            .map(|set| set.meta.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();

    if dry_run {
        println!("{}", "[DRY RUN - showing what would be applied]".cyan());
        println!();
    }

    // 3. Apply each set in order, on the output of the previous one
    let mut report = Report::default();
    for set in &sets {
        println!("Applying {}...", set.meta.name);
        let applied = set.apply(&document.text);
        print_report(&applied.report, dry_run);
        document.text = applied.text;
        report.extend(applied.report);
        println!();
    }

    // 4. Optional cleanup
    if normalize {
        let (text, stats) = normalize_report(&document.text);
        document.text = text;
        println!(
            "Normalized: {} lines -> {} lines ({} blank, {} duplicate removed)",
            stats.lines_before,
            stats.lines_after,
            stats.blank_lines_removed,
            stats.duplicates_removed
        );
        println!();
    }

    // 5. Advisory check on the result
    let broken = report_broken_joins(&document.text);
    if broken > 0 {
        println!();
    }

    if show_diff && document.is_modified() {
        display_diff(&document.path, document.original(), &document.text);
        println!();
    }

    // 6. Store
    if dry_run {
        println!("{}", "File not written (dry run)".dimmed());
    } else {
        match document.store()? {
            StoreResult::Written { path, bytes } => {
                println!("Wrote {} ({} bytes)", path.display(), bytes);
            }
            StoreResult::Unchanged { path } => {
                println!("{}", format!("{} unchanged", path.display()).dimmed());
            }
        }
    }
    println!();

    // 7. Summary
    print_summary(&report);

    Ok(())
}

fn cmd_status(selection: Selection) -> Result<()> {
    let sets = resolve_sets(&selection)?;
    let document = Document::load(&selection.file)
        .with_context(|| format!("Could not load {}", selection.file.display()))?;

    println!("{}", "Rule Status Report".bold());
    println!("File: {}", selection.file.display());
    println!();

    let mut applied = Vec::new();
    let mut pending = Vec::new();
    let mut not_found = Vec::new();
    let mut failed = Vec::new();

    // Evaluated in memory, nothing is stored
    let result = apply_rule_sets(&document.text, &sets);
    for (id, outcome) in result.report.entries {
        match outcome {
            Ok(RuleOutcome::AlreadyApplied) => applied.push(id),
            Ok(RuleOutcome::Applied { replacements }) => {
                pending.push((id, format!("{replacements} location(s) would change")))
            }
            Err(RuleError::NotFound { hint }) => {
                let reason = hint
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "no match".to_string());
                not_found.push((id, reason));
            }
            Err(e) => failed.push((id, e.to_string())),
        }
    }

    if !applied.is_empty() {
        println!(
            "{} {} ({} rules)",
            "✓".green(),
            "APPLIED".green().bold(),
            applied.len()
        );
        for id in &applied {
            println!("  - {}", id);
        }
        println!();
    }

    if !pending.is_empty() {
        println!(
            "{} {} ({} rules)",
            "⊙".yellow(),
            "NOT APPLIED".yellow().bold(),
            pending.len()
        );
        for (id, reason) in &pending {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    if !not_found.is_empty() {
        println!(
            "{} {} ({} rules)",
            "⊘".cyan(),
            "NOT FOUND".cyan().bold(),
            not_found.len()
        );
        for (id, reason) in &not_found {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    if !failed.is_empty() {
        println!(
            "{} {} ({} rules)",
            "✗".red(),
            "FAILED".red().bold(),
            failed.len()
        );
        for (id, reason) in &failed {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    Ok(())
}

fn cmd_normalize(file: &Path, dry_run: bool, show_diff: bool) -> Result<()> {
    let mut document =
        Document::load(file).with_context(|| format!("Could not load {}", file.display()))?;

    let (text, stats) = normalize_report(&document.text);
    document.text = text;

    println!(
        "Reduced from {} to {} lines ({} blank, {} duplicate removed)",
        stats.lines_before, stats.lines_after, stats.blank_lines_removed, stats.duplicates_removed
    );

    if show_diff && document.is_modified() {
        display_diff(&document.path, document.original(), &document.text);
    }

    if dry_run {
        println!("{}", "File not written (dry run)".dimmed());
        return Ok(());
    }

    if let StoreResult::Written { path, .. } = document.store()? {
        println!("Wrote {}", path.display());
    }

    Ok(())
}

fn cmd_check(file: &Path) -> Result<()> {
    let document =
        Document::load(file).with_context(|| format!("Could not load {}", file.display()))?;

    let broken = report_broken_joins(&document.text);
    if broken > 0 {
        eprintln!("{} {} broken join(s) found", "✗".red(), broken);
        std::process::exit(1);
    }

    println!("{} All joins look correct", "✓".green());
    Ok(())
}

fn cmd_list() -> Result<()> {
    for name in builtin_names() {
        let set = builtin(name)?;
        let default_marker = if DEFAULT_SETS.contains(&name) {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        };

        println!("{}{}", name.bold(), default_marker);
        if let Some(description) = &set.meta.description {
            println!("  {}", description.dimmed());
        }
        for rule in &set.rules {
            let kind = if rule.is_pattern() { "pattern" } else { "literal" };
            match &rule.description {
                Some(description) => println!("  - {} [{}]: {}", rule.id, kind, description),
                None => println!("  - {} [{}]", rule.id, kind),
            }
        }
        println!();
    }

    Ok(())
}
