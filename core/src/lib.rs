//! hantidy core analysis engine.
//! Detects formatting and punctuation issues in mixed Chinese/Latin markdown,
//! classifies them into risk tiers, indexes documents into heading-bounded
//! sections, and plans, previews, and applies tier-scoped fixes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod diff;
mod fixer;
mod plan;
mod rules;
mod structure;

pub use config::{Config, ConfigError};
pub use diff::{render_diff, DiffMode, DiffView};
pub use fixer::{
    ChangeKind, ChangeReport, FixPreview, FixResult, LineChange, ProcessOptions, TextStats,
};
pub use plan::{Estimate, Plan, Scope};
pub use structure::{OutlineEntry, Section, Structure};

/// Severity of a single reported issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// How a suggested fix applies to the flagged span.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FixKind {
    Replace,
    Delete,
    Merge,
}

/// Suggested rewrite attached to an issue. `affected_lines` is set for
/// multi-line fixes (merges) only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixHint {
    pub kind: FixKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_lines: Option<Vec<usize>>,
}

/// A single finding. `line` is a 0-based absolute index into the analyzed
/// text; columns are 0-based character offsets within that line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub line: usize,
    pub start_col: usize,
    pub end_col: usize,
    pub severity: Severity,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixHint>,
}

/// Rule codes eligible for unattended application.
const SAFE_CODES: &[&str] = &[
    "missing-space",
    "header-space",
    "mixed-punc",
    "indent-style",
    "quote-style",
];

/// Rule codes whose fixes reflow text and deserve a look first.
const SUGGESTED_CODES: &[&str] = &["broken-line"];

/// Risk tier controlling how a fix may be applied. Codes missing from every
/// tier table resolve to `Warning`, never to an auto-fixable tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Safe,
    Suggested,
    Warning,
}

impl Tier {
    pub const fn ordinal(self) -> u8 {
        match self {
            Tier::Safe => 1,
            Tier::Suggested => 2,
            Tier::Warning => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Tier::Safe => "SAFE",
            Tier::Suggested => "SUGGESTED",
            Tier::Warning => "WARNING",
        }
    }

    /// Only SAFE fixes may run without review.
    pub const fn auto_fix_eligible(self) -> bool {
        matches!(self, Tier::Safe)
    }

    pub const fn codes(self) -> &'static [&'static str] {
        match self {
            Tier::Safe => SAFE_CODES,
            Tier::Suggested => SUGGESTED_CODES,
            Tier::Warning => &[],
        }
    }

    /// Resolve a rule code to its tier. Unknown codes land in `Warning`.
    pub fn for_code(code: &str) -> Tier {
        if SAFE_CODES.contains(&code) {
            Tier::Safe
        } else if SUGGESTED_CODES.contains(&code) {
            Tier::Suggested
        } else {
            Tier::Warning
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// An issue together with its resolved tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedIssue {
    #[serde(flatten)]
    pub issue: Issue,
    pub tier: Tier,
}

/// Issues bucketed by tier, in scan order within each bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grouped {
    #[serde(rename = "SAFE")]
    pub safe: Vec<ClassifiedIssue>,
    #[serde(rename = "SUGGESTED")]
    pub suggested: Vec<ClassifiedIssue>,
    #[serde(rename = "WARNING")]
    pub warning: Vec<ClassifiedIssue>,
}

impl Grouped {
    pub(crate) fn from_issues(issues: Vec<Issue>) -> Self {
        let mut grouped = Grouped::default();
        for issue in issues {
            let tier = Tier::for_code(&issue.code);
            let classified = ClassifiedIssue { issue, tier };
            match tier {
                Tier::Safe => grouped.safe.push(classified),
                Tier::Suggested => grouped.suggested.push(classified),
                Tier::Warning => grouped.warning.push(classified),
            }
        }
        grouped
    }

    pub(crate) fn stats(&self) -> Stats {
        Stats {
            total: self.safe.len() + self.suggested.len() + self.warning.len(),
            safe: self.safe.len(),
            suggested: self.suggested.len(),
            warning: self.warning.len(),
        }
    }

    /// Buckets flattened in tier order.
    pub(crate) fn flatten(&self) -> Vec<ClassifiedIssue> {
        let mut all = Vec::with_capacity(self.stats().total);
        all.extend_from_slice(&self.safe);
        all.extend_from_slice(&self.suggested);
        all.extend_from_slice(&self.warning);
        all
    }
}

/// Issue counts per tier.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub safe: usize,
    pub suggested: usize,
    pub warning: usize,
}

/// Inclusive 0-based line range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    /// Clamp into `[0, line_count - 1]`; out-of-order bounds collapse onto
    /// the clamped end.
    pub fn clamp_to(self, line_count: usize) -> LineRange {
        let last = line_count.saturating_sub(1);
        let end = self.end.min(last);
        let start = self.start.min(end);
        LineRange { start, end }
    }
}

/// Full analysis output for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub issues: Vec<ClassifiedIssue>,
    pub grouped: Grouped,
    pub stats: Stats,
    pub structure: Structure,
}

/// Stateless engine over an immutable [`Config`]. Every operation recomputes
/// from the text it is handed; inspection never mutates, and the fixer only
/// produces new strings.
pub struct Analyzer {
    config: Config,
}

impl Analyzer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every detector over `text`, then classify, group, and index the
    /// findings.
    pub fn analyze(&self, text: &str) -> Analysis {
        let issues = self.run_rules(text);
        let grouped = Grouped::from_issues(issues);
        let stats = grouped.stats();
        let structure = structure::analyze_structure(self, text);
        Analysis {
            issues: grouped.flatten(),
            grouped,
            stats,
            structure,
        }
    }

    /// Estimate what [`apply_fix`](Self::apply_fix) would touch under the
    /// given tier selection and optional line range. Unselected tiers always
    /// estimate zero, even when issues of that tier exist in scope.
    pub fn plan_fix(
        &self,
        text: &str,
        selected_tiers: &BTreeSet<Tier>,
        section_range: Option<LineRange>,
    ) -> Plan {
        plan::build_plan(self, text, selected_tiers, section_range)
    }

    /// Apply the plan's tier transforms, returning the rewritten text and a
    /// line-level change report. Lines outside the plan's range are
    /// reattached verbatim.
    pub fn apply_fix(&self, text: &str, plan: &Plan) -> FixResult {
        fixer::apply_fix(text, plan, self.config.detailed_changes_cap)
    }

    /// Same scoping as [`apply_fix`](Self::apply_fix), but non-destructive:
    /// returns only the affected slice before and after transformation.
    pub fn preview_fix(&self, text: &str, plan: &Plan) -> FixPreview {
        fixer::preview_fix(text, plan)
    }

    /// One-shot cleanup pipeline: run every enabled stage over the whole
    /// text, independent of tier planning.
    pub fn process_text(&self, text: &str, options: &ProcessOptions) -> FixResult {
        let output = fixer::process_text(text, options);
        let report = fixer::change_report(text, &output, self.config.detailed_changes_cap);
        FixResult {
            text: output,
            report,
        }
    }

    pub(crate) fn run_rules(&self, text: &str) -> Vec<Issue> {
        let lines: Vec<&str> = text.split('\n').collect();
        let in_fence = rules::fence_interior(&lines);
        let mut issues = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if line.trim().is_empty() || in_fence[idx] {
                continue;
            }
            for rule in rules::LINE_RULES {
                issues.extend(rule(line, idx));
            }
        }
        for rule in rules::DOC_RULES {
            issues.extend(rule(text));
        }
        if !self.config.disabled_codes.is_empty() {
            issues.retain(|issue| !self.config.disabled_codes.iter().any(|c| c == &issue.code));
        }
        issues
    }
}

/// CJK Unified Ideographs block. The narrow class every detector uses for
/// adjacency decisions.
pub(crate) fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Wider class used only for merge-joiner decisions: ideographs plus CJK
/// punctuation and fullwidth forms.
pub(crate) fn is_cjk_or_fullwidth(c: char) -> bool {
    is_cjk(c) || ('\u{3000}'..='\u{303f}').contains(&c) || ('\u{ff00}'..='\u{ffef}').contains(&c)
}

/// Split on `\n`, tolerating CRLF input by dropping the trailing `\r`.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}
