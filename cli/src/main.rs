use std::{
    collections::BTreeSet,
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context};
use clap::{ArgAction, Parser};
use console::style;
use globset::{Glob, GlobSet, GlobSetBuilder};
use hantidy_core::{
    render_diff, Analysis, Analyzer, Config, DiffMode, LineRange, Section, Stats, Tier,
};
use serde::Serialize;
use walkdir::WalkDir;

/// hantidy CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "hantidy",
    about = "Lint and fix mixed Chinese/Latin markdown documents."
)]
struct Args {
    /// Path to config file (YAML). Defaults to hantidy.yml if present.
    #[arg(long, default_value = "hantidy.yml")]
    config: PathBuf,

    /// Emit JSON output for automation.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Exit non-zero when any issue remains after filtering.
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Suppress per-issue output.
    #[arg(long, action = ArgAction::SetTrue)]
    quiet: bool,

    /// Files or directories to lint.
    #[arg(value_name = "PATH", default_value = ".", num_args = 0..)]
    paths: Vec<PathBuf>,

    /// Report only these rule codes (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "CODE[,CODE]")]
    only: Vec<String>,

    /// Drop these rule codes from the report (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "CODE[,CODE]")]
    disable: Vec<String>,

    /// Apply fixes instead of reporting issues.
    #[arg(long, action = ArgAction::SetTrue)]
    fix: bool,

    /// Tiers to apply with --fix (comma-separated: safe,suggested).
    #[arg(long, value_delimiter = ',', default_value = "safe", value_name = "TIER[,TIER]")]
    tiers: Vec<String>,

    /// Inclusive 0-based line range START:END to scope --fix.
    #[arg(long, value_name = "START:END")]
    range: Option<String>,

    /// Write fixed output back to the file instead of stdout.
    #[arg(long, action = ArgAction::SetTrue)]
    write: bool,

    /// Preview the fix as a two-sided diff instead of applying it.
    #[arg(long, value_name = "line|token")]
    diff: Option<String>,
}

#[derive(Debug, Serialize)]
struct FileResult {
    path: String,
    stats: Stats,
    issues: Vec<hantidy_core::ClassifiedIssue>,
    sections: Vec<Section>,
}

#[derive(Debug, Serialize)]
struct OutputReport {
    files: Vec<FileResult>,
    total_issues: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let (config, config_root) = load_config(&args.config)?;
    let ignore = build_ignore_set(&config.ignore_globs)?;
    let analyzer = Analyzer::new(config);

    let mut files = collect_files(&args.paths, ignore.as_ref())?;
    files.sort();
    if files.is_empty() {
        bail!("no markdown or text files matched the given paths");
    }

    if args.fix || args.diff.is_some() {
        run_fix(&args, &analyzer, &files)
    } else {
        run_lint(&args, &analyzer, &config_root, &files)
    }
}

fn run_lint(
    args: &Args,
    analyzer: &Analyzer,
    config_root: &Path,
    files: &[PathBuf],
) -> anyhow::Result<()> {
    let mut file_reports = Vec::new();
    let mut total_issues = 0usize;

    for path in files {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut analysis = analyzer.analyze(&content);
        filter_issues(&mut analysis, &args.only, &args.disable);
        total_issues += analysis.stats.total;

        let rel_path = pathdiff::diff_paths(path, config_root).unwrap_or_else(|| path.clone());
        if !args.quiet && !args.json {
            print_human_report(&rel_path, &analysis);
        }
        file_reports.push(FileResult {
            path: rel_path.to_string_lossy().replace('\\', "/"),
            stats: analysis.stats,
            issues: analysis.issues,
            sections: analysis.structure.sections,
        });
    }

    let output = OutputReport {
        files: file_reports,
        total_issues,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !args.quiet {
        println!(
            "\n{} files, {} issues",
            output.files.len(),
            output.total_issues
        );
    }

    if args.strict && total_issues > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_fix(args: &Args, analyzer: &Analyzer, files: &[PathBuf]) -> anyhow::Result<()> {
    if files.len() > 1 && !args.write && args.diff.is_none() {
        bail!("--fix over multiple files requires --write");
    }
    let tiers = parse_tiers(&args.tiers)?;
    let range = args.range.as_deref().map(parse_range).transpose()?;

    for path in files {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let plan = analyzer.plan_fix(&content, &tiers, range);

        if let Some(mode) = &args.diff {
            let mode = parse_diff_mode(mode)?;
            let preview = analyzer.preview_fix(&content, &plan);
            let view = render_diff(&preview.original_segment, &preview.processed_segment, mode);
            println!(
                "{} (estimate: safe {}, suggested {}, warning {})",
                style(path.to_string_lossy()).bold(),
                plan.estimate.safe,
                plan.estimate.suggested,
                plan.estimate.warning
            );
            println!("{}", style("--- original").red());
            print!("{}", view.original_marked);
            println!("{}", style("+++ processed").green());
            print!("{}", view.processed_marked);
            continue;
        }

        let result = analyzer.apply_fix(&content, &plan);
        if args.write {
            fs::write(path, &result.text)
                .with_context(|| format!("failed to write {}", path.display()))?;
        } else {
            print!("{}", result.text);
        }
        if !args.quiet {
            eprintln!(
                "{}: {} lines changed ({} chars {})",
                style(path.to_string_lossy()).bold(),
                result.report.modified_lines,
                result.report.character_delta.abs(),
                if result.report.character_delta >= 0 {
                    "added"
                } else {
                    "removed"
                }
            );
            for change in &result.report.changes {
                eprintln!("  line {} [{}]", change.line, style(change.kind).yellow());
            }
        }
    }
    Ok(())
}

fn print_human_report(path: &Path, analysis: &Analysis) {
    println!(
        "{} ({} issues: {} safe, {} suggested, {} warning)",
        style(path.to_string_lossy()).bold(),
        analysis.stats.total,
        analysis.stats.safe,
        analysis.stats.suggested,
        analysis.stats.warning
    );
    if analysis.issues.is_empty() {
        println!("  {}", style("clean").green());
        return;
    }
    for classified in &analysis.issues {
        let issue = &classified.issue;
        println!(
            "  [{}] {}:{} {} {}",
            style(classified.tier).yellow(),
            issue.line + 1,
            issue.start_col + 1,
            style(&issue.code).cyan(),
            issue.message
        );
    }
    if !analysis.structure.sections.is_empty() {
        println!("  sections:");
        for section in &analysis.structure.sections {
            println!(
                "    {} {} (lines {}-{}): {} issues",
                "#".repeat(section.level as usize),
                if section.heading.is_empty() {
                    "(untitled)"
                } else {
                    section.heading.as_str()
                },
                section.range.start + 1,
                section.range.end + 1,
                section.stats.total
            );
        }
    }
}

fn filter_issues(analysis: &mut Analysis, only: &[String], disable: &[String]) {
    if only.is_empty() && disable.is_empty() {
        return;
    }
    let keep = |code: &str| {
        if !only.is_empty() {
            only.iter().any(|c| c == code)
        } else {
            !disable.iter().any(|c| c == code)
        }
    };
    analysis.issues.retain(|i| keep(&i.issue.code));
    analysis.grouped.safe.retain(|i| keep(&i.issue.code));
    analysis.grouped.suggested.retain(|i| keep(&i.issue.code));
    analysis.grouped.warning.retain(|i| keep(&i.issue.code));
    analysis.stats = Stats {
        total: analysis.issues.len(),
        safe: analysis.grouped.safe.len(),
        suggested: analysis.grouped.suggested.len(),
        warning: analysis.grouped.warning.len(),
    };
}

fn parse_tiers(names: &[String]) -> anyhow::Result<BTreeSet<Tier>> {
    let mut tiers = BTreeSet::new();
    for name in names {
        let tier = match name.trim().to_lowercase().as_str() {
            "safe" => Tier::Safe,
            "suggested" => Tier::Suggested,
            "warning" => Tier::Warning,
            other => bail!("unknown tier `{other}` (expected safe, suggested, or warning)"),
        };
        tiers.insert(tier);
    }
    Ok(tiers)
}

fn parse_range(raw: &str) -> anyhow::Result<LineRange> {
    let (start, end) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("range must be START:END, got `{raw}`"))?;
    Ok(LineRange {
        start: start.trim().parse().context("range start")?,
        end: end.trim().parse().context("range end")?,
    })
}

fn parse_diff_mode(raw: &str) -> anyhow::Result<DiffMode> {
    match raw.trim().to_lowercase().as_str() {
        "line" => Ok(DiffMode::Line),
        "token" => Ok(DiffMode::Token),
        other => bail!("unknown diff mode `{other}` (expected line or token)"),
    }
}

fn build_ignore_set(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

fn collect_files(paths: &[PathBuf], ignore: Option<&GlobSet>) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut walker = WalkDir::new(path).into_iter();
            while let Some(entry_res) = walker.next() {
                let entry = entry_res?;
                let entry_path = entry.path();
                if let Some(set) = ignore {
                    if set.is_match(entry_path) {
                        if entry.file_type().is_dir() {
                            walker.skip_current_dir();
                        }
                        continue;
                    }
                }
                if entry.file_type().is_file() && is_supported(entry_path) {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => matches!(ext.to_lowercase().as_str(), "md" | "markdown" | "txt"),
        None => false,
    }
}

fn load_config(path: &PathBuf) -> anyhow::Result<(Config, PathBuf)> {
    let config = Config::load(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    let root = if path.exists() {
        path.parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        env::current_dir()?
    };
    Ok((config, root))
}
