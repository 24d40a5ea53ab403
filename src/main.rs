use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use fixbase::config::{load_or_default, Settings};
use fixbase::git::{log_baseline_commits, BaselineHandler};
use fixbase::{apply_fixes, RuleMatchMap};
use similar::{ChangeTag, TextDiff};
use std::collections::{BTreeSet, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fixbase")]
#[command(about = "Apply analysis autofixes and run baseline comparison scans", long_about = None)]
#[command(version)]
struct Cli {
    /// Run as if started in this directory
    #[arg(short = 'C', long, global = true)]
    directory: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Upper bound in seconds on every git invocation
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    git_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply fixes from an analysis results file
    Apply {
        /// JSON results document produced by the analysis engine
        #[arg(short, long)]
        results: PathBuf,

        /// Dry run - show the fixed lines without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Compare against a baseline commit
    #[command(subcommand)]
    Baseline(BaselineCommand),
}

#[derive(Subcommand)]
enum BaselineCommand {
    /// Show tracked changes since the reference's merge-base
    Status(RefArgs),

    /// Show which commits a baseline comparison covers
    Log(RefArgs),

    /// Run a command with the working tree rewound to the reference
    Run {
        #[command(flatten)]
        reference: RefArgs,

        /// Results file the command writes; fingerprinted while rewound
        #[arg(long)]
        results: Option<PathBuf>,

        /// Current results to filter against the baseline results
        #[arg(long, requires = "results")]
        head: Option<PathBuf>,

        /// Where to write the filtered results (stdout if omitted)
        #[arg(short, long, requires = "head")]
        output: Option<PathBuf>,

        /// Command to run, e.g. `-- scanner --json -o baseline.json`
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

#[derive(Args)]
struct RefArgs {
    /// Baseline commit, branch, tag or relative ref
    #[arg(long = "ref")]
    reference: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let workdir = match cli.directory {
        Some(dir) => dir
            .canonicalize()
            .with_context(|| format!("cannot access {}", dir.display()))?,
        None => env::current_dir().context("cannot determine current directory")?,
    };
    let mut settings = load_or_default(&workdir)?;
    if let Some(secs) = cli.git_timeout {
        settings.git.timeout_secs = secs;
    }
    debug!(?settings, "loaded settings");

    match cli.command {
        Commands::Apply {
            results,
            dry_run,
            diff,
        } => cmd_apply(&workdir, &settings, &results, dry_run, diff),

        Commands::Baseline(BaselineCommand::Status(args)) => {
            cmd_baseline_status(&workdir, &settings, &args.reference)
        }

        Commands::Baseline(BaselineCommand::Log(args)) => {
            log_baseline_commits(&settings.git.runner(&workdir), &args.reference);
            Ok(())
        }

        Commands::Baseline(BaselineCommand::Run {
            reference,
            results,
            head,
            output,
            command,
        }) => cmd_baseline_run(
            &workdir,
            &settings,
            &reference.reference,
            &command,
            results.as_deref(),
            head.as_deref(),
            output.as_deref(),
        ),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "fixbase=info",
        1 => "fixbase=debug",
        _ => "fixbase=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (fixed)", file.display()).dimmed());

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

fn cmd_apply(
    workdir: &Path,
    settings: &Settings,
    results: &Path,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let show_diff = show_diff || settings.fix.show_diff;

    let mut matches = RuleMatchMap::load(workdir.join(results))?;
    matches.rebase(workdir);
    println!(
        "Loaded {} matches from {}",
        matches.len(),
        results.display()
    );

    // Capture file contents before applying (for diff output). Only files
    // with a fix are read.
    let mut contents_before: HashMap<PathBuf, String> = HashMap::new();
    if show_diff && !dry_run {
        let targets: BTreeSet<&PathBuf> = matches
            .matches()
            .filter(|m| m.literal_fix().is_some() || m.fix_regex.is_some())
            .map(|m| &m.path)
            .collect();
        for path in targets {
            if let Ok(content) = fs::read_to_string(path) {
                contents_before.insert(path.clone(), content);
            }
        }
    }

    if dry_run {
        println!("{}", "[DRY RUN - showing fixed lines, no files written]".cyan());
    }

    let report = apply_fixes(&matches, dry_run)?;

    for preview in &report.previews {
        println!(
            "{} {}:{} ({})",
            "~".cyan(),
            relative(workdir, &preview.path).display(),
            preview.start_line,
            preview.rule_id.dimmed()
        );
        for line in &preview.fixed_lines {
            println!("    {}", line.green());
        }
    }

    for file in &report.modified_files {
        println!("{} Fixed {}", "✓".green(), relative(workdir, file).display());
        if let (Some(before), Ok(after)) = (contents_before.get(file), fs::read_to_string(file)) {
            if before != &after {
                display_diff(relative(workdir, file), before, &after);
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    if dry_run {
        println!("  {} fixes previewed", format!("{}", report.previews.len()).cyan());
    } else {
        println!(
            "  {} files modified",
            format!("{}", report.modified_count()).green()
        );
    }

    Ok(())
}

fn relative<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

fn cmd_baseline_status(workdir: &Path, settings: &Settings, reference: &str) -> Result<()> {
    let handler = BaselineHandler::new(workdir, reference, &settings.git)?;
    let status = handler.status();

    println!("{}", "Baseline Status Report".bold());
    println!("Reference: {}", handler.reference());
    println!();

    let groups = [
        ("ADDED".green(), &status.added),
        ("MODIFIED".yellow(), &status.modified),
        ("REMOVED".red(), &status.removed),
        ("UNMERGED".magenta(), &status.unmerged),
    ];
    for (label, paths) in groups {
        if paths.is_empty() {
            continue;
        }
        println!("{} ({} paths)", label.bold(), paths.len());
        for path in paths {
            println!("  - {}", path.display());
        }
        println!();
    }

    if status.changed_paths().next().is_none() {
        println!("{}", "No tracked changes since the reference.".dimmed());
    }
    Ok(())
}

fn cmd_baseline_run(
    workdir: &Path,
    settings: &Settings,
    reference: &str,
    command: &[String],
    results: Option<&Path>,
    head: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let handler = BaselineHandler::new(workdir, reference, &settings.git)?;
    handler.log_commits();

    let (program, args) = command
        .split_first()
        .context("no command given to run against the baseline")?;

    let scan = handler.run_in_baseline(|| -> Result<_> {
        info!("running `{}` against {}", command.join(" "), reference);
        let status = Command::new(program)
            .args(args)
            .current_dir(workdir)
            .status()
            .with_context(|| format!("failed to run {program}"))?;

        let fingerprints = match results {
            Some(path) => {
                let baseline = RuleMatchMap::load(workdir.join(path))?;
                Some(baseline.fingerprints(workdir)?)
            }
            None => None,
        };
        Ok((status, fingerprints))
    })?;
    let (status, fingerprints) = scan?;

    info!("baseline command exited with {status}");

    if let (Some(fingerprints), Some(head)) = (fingerprints, head) {
        let mut current = RuleMatchMap::load(workdir.join(head))?;
        let before = current.len();
        let removed = current.remove_baseline(workdir, &fingerprints)?;
        info!(
            "{} of {} findings already present in {}",
            removed, before, reference
        );

        let json = current.to_json()?;
        match output {
            Some(path) => {
                let path = workdir.join(path);
                fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!(
                    "Wrote {} new findings to {}",
                    current.len(),
                    path.display()
                );
            }
            None => println!("{json}"),
        }
    }

    Ok(())
}
