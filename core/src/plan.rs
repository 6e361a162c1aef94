//! Fix planning. A plan captures the caller's tier selection and optional
//! line range together with an estimate of what applying it now would touch.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{split_lines, Analyzer, Grouped, LineRange, Tier};

/// Whether a plan covers the whole document or one line range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Section,
}

/// Per-tier issue counts under the plan's selection. An unselected tier
/// reports zero even when issues of that tier exist in scope; the estimate
/// answers "what would happen if you apply now", not "what exists".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Estimate {
    pub safe: usize,
    pub suggested: usize,
    pub warning: usize,
}

/// Ephemeral fix plan, produced by [`Analyzer::plan_fix`] and consumed
/// immediately by apply or preview. Not persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub scope: Scope,
    pub selected_tiers: BTreeSet<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_range: Option<LineRange>,
    pub estimate: Estimate,
}

pub(crate) fn build_plan(
    analyzer: &Analyzer,
    text: &str,
    selected_tiers: &BTreeSet<Tier>,
    section_range: Option<LineRange>,
) -> Plan {
    let (scope, clamped, scoped_text) = match section_range {
        Some(range) => {
            let lines = split_lines(text);
            let range = range.clamp_to(lines.len());
            let slice = lines[range.start..=range.end].join("\n");
            (Scope::Section, Some(range), slice)
        }
        None => (Scope::Global, None, text.to_string()),
    };
    // Always re-analyze the scoped text rather than reusing section stats,
    // so the estimate cannot go stale against edited input.
    let grouped = Grouped::from_issues(analyzer.run_rules(&scoped_text));
    let stats = grouped.stats();
    let count_if = |tier: Tier, count: usize| {
        if selected_tiers.contains(&tier) {
            count
        } else {
            0
        }
    };
    Plan {
        scope,
        selected_tiers: selected_tiers.clone(),
        section_range: clamped,
        estimate: Estimate {
            safe: count_if(Tier::Safe, stats.safe),
            suggested: count_if(Tier::Suggested, stats.suggested),
            warning: count_if(Tier::Warning, stats.warning),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn analyzer() -> Analyzer {
        Analyzer::new(Config::default())
    }

    fn tiers(list: &[Tier]) -> BTreeSet<Tier> {
        list.iter().copied().collect()
    }

    #[test]
    fn global_plan_counts_selected_tiers_only() {
        // One SAFE issue (missing-space) and one SUGGESTED (broken-line).
        let text = "中文English\n后续内容。";
        let plan = analyzer().plan_fix(text, &tiers(&[Tier::Safe]), None);
        assert_eq!(plan.scope, Scope::Global);
        assert!(plan.estimate.safe > 0);
        assert_eq!(plan.estimate.suggested, 0);
        assert_eq!(plan.estimate.warning, 0);
    }

    #[test]
    fn unselected_tier_estimates_zero_even_when_issues_exist() {
        let text = "这是第一句\n这是第二句。";
        let a = analyzer();
        let unselected = a.plan_fix(text, &tiers(&[Tier::Safe]), None);
        assert_eq!(unselected.estimate.suggested, 0);
        let selected = a.plan_fix(text, &tiers(&[Tier::Suggested]), None);
        assert_eq!(selected.estimate.suggested, 1);
    }

    #[test]
    fn section_plan_re_analyzes_only_the_slice() {
        // Issues on lines 0 and 3; a plan scoped to lines 2-3 must only see
        // the second one.
        let text = "中文English\n正常的一行。\n正常的一行。\n中文,标点";
        let plan = analyzer().plan_fix(
            text,
            &tiers(&[Tier::Safe]),
            Some(LineRange { start: 2, end: 3 }),
        );
        assert_eq!(plan.scope, Scope::Section);
        assert_eq!(plan.estimate.safe, 1);
    }

    #[test]
    fn section_range_is_clamped() {
        let text = "一行。\n两行。";
        let plan = analyzer().plan_fix(
            text,
            &tiers(&[Tier::Safe]),
            Some(LineRange { start: 0, end: 99 }),
        );
        assert_eq!(plan.section_range, Some(LineRange { start: 0, end: 1 }));
    }

    #[test]
    fn empty_selection_estimates_zero_everywhere() {
        let text = "中文English\n这是第一句\n这是第二句。";
        let plan = analyzer().plan_fix(text, &BTreeSet::new(), None);
        assert_eq!(plan.estimate, Estimate::default());
    }
}
