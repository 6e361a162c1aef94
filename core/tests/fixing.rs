use std::collections::BTreeSet;

use hantidy_core::{
    render_diff, Analyzer, ChangeKind, Config, DiffMode, LineRange, Scope, Tier,
};

fn analyzer() -> Analyzer {
    Analyzer::new(Config::default())
}

fn tiers(list: &[Tier]) -> BTreeSet<Tier> {
    list.iter().copied().collect()
}

#[test]
fn empty_tier_selection_returns_text_unchanged() {
    let a = analyzer();
    let text = "##标题\n　缩进\n中文English\n这是第一句\n这是第二句。\n";
    let plan = a.plan_fix(text, &BTreeSet::new(), None);
    let result = a.apply_fix(text, &plan);
    assert_eq!(result.text, text);
    assert_eq!(result.report.modified_lines, 0);
    assert_eq!(result.report.character_delta, 0);
}

#[test]
fn safe_fix_normalizes_format_and_spacing() {
    let a = analyzer();
    let text = "前言。\n##标题\n　缩进的中文English混排";
    let plan = a.plan_fix(text, &tiers(&[Tier::Safe]), None);
    let result = a.apply_fix(text, &plan);
    assert_eq!(result.text, "前言。\n\n## 标题\n缩进的中文 English 混排\n");
}

#[test]
fn suggested_fix_merges_and_normalizes_quotes() {
    let a = analyzer();
    let text = "他说\"第一句\n还没有结束\"。";
    let plan = a.plan_fix(text, &tiers(&[Tier::Suggested]), None);
    let result = a.apply_fix(text, &plan);
    assert_eq!(result.text, "他说\u{201c}第一句还没有结束\u{201d}。");
}

#[test]
fn plan_estimate_reports_zero_for_unselected_tiers() {
    let a = analyzer();
    let text = "中文English\n这是第一句\n这是第二句。";
    let plan = a.plan_fix(text, &tiers(&[Tier::Safe]), None);
    assert!(plan.estimate.safe > 0);
    assert_eq!(plan.estimate.suggested, 0);
    let both = a.plan_fix(text, &tiers(&[Tier::Safe, Tier::Suggested]), None);
    assert!(both.estimate.suggested > 0);
}

#[test]
fn section_scoped_safe_fix_preserves_outside_lines() {
    let lines: Vec<String> = (0..10).map(|i| format!("　第{i}行has缩进")).collect();
    let text = lines.join("\n");
    let a = analyzer();
    let plan = a.plan_fix(&text, &tiers(&[Tier::Safe]), Some(LineRange { start: 3, end: 5 }));
    assert_eq!(plan.scope, Scope::Section);
    let result = a.apply_fix(&text, &plan);
    let out: Vec<&str> = result.text.split('\n').collect();
    for i in 0..3 {
        assert_eq!(out[i], lines[i], "line {i} before the range must not move");
    }
    let tail_len = 10 - 6;
    for i in 0..tail_len {
        assert_eq!(
            out[out.len() - tail_len + i],
            lines[6 + i],
            "line {} after the range must not move",
            6 + i
        );
    }
    assert_ne!(out[3], lines[3]);
}

#[test]
fn section_scoped_merge_changes_slice_line_count_only() {
    let a = analyzer();
    let text = "第零行。\n这是第一句\n这是第二句。\n第三行。";
    let plan = a.plan_fix(text, &tiers(&[Tier::Suggested]), Some(LineRange { start: 1, end: 2 }));
    let result = a.apply_fix(text, &plan);
    assert_eq!(result.text, "第零行。\n这是第一句这是第二句。\n第三行。");
    assert_eq!(result.report.original.lines, 4);
    assert_eq!(result.report.processed.lines, 3);
}

#[test]
fn preview_is_non_destructive_and_returns_the_slice() {
    let a = analyzer();
    let text = "第零行。\n　缩进行\n第二行。";
    let plan = a.plan_fix(text, &tiers(&[Tier::Safe]), Some(LineRange { start: 1, end: 1 }));
    let preview = a.preview_fix(text, &plan);
    assert_eq!(preview.original_segment, "　缩进行");
    assert_eq!(preview.processed_segment, "缩进行\n");
}

#[test]
fn quote_fix_is_idempotent_inside_fenced_blocks() {
    let a = analyzer();
    let text = "```\n他说\u{201c}你好\u{201d}。\n```\n普通\"引用\"文本。";
    let plan = a.plan_fix(text, &tiers(&[Tier::Suggested]), None);
    let once = a.apply_fix(text, &plan).text;
    let twice = a.apply_fix(&once, &a.plan_fix(&once, &tiers(&[Tier::Suggested]), None)).text;
    assert!(once.contains("```\n他说\u{201c}你好\u{201d}。\n```"));
    assert_eq!(once, twice);
}

#[test]
fn change_report_labels_the_fix_kinds() {
    let a = analyzer();
    let text = "他说\"好\"\n";
    let plan = a.plan_fix(text, &tiers(&[Tier::Suggested]), None);
    let result = a.apply_fix(text, &plan);
    assert_eq!(result.text, "他说\u{201c}好\u{201d}\n");
    assert_eq!(result.report.modified_lines, 1);
    assert_eq!(result.report.changes[0].kind, ChangeKind::Quotes);
    assert_eq!(result.report.changes[0].line, 1);
}

#[test]
fn out_of_order_range_is_clamped_not_rejected() {
    let a = analyzer();
    let text = "一。\n二。\n三。";
    let plan = a.plan_fix(text, &tiers(&[Tier::Safe]), Some(LineRange { start: 9, end: 1 }));
    assert_eq!(plan.section_range, Some(LineRange { start: 1, end: 1 }));
    let result = a.apply_fix(text, &plan);
    assert_eq!(result.text, "一。\n二。\n\n三。");
}

#[test]
fn token_diff_marks_the_removed_middle_span() {
    let view = render_diff("ab12你好", "ab你好", DiffMode::Token);
    assert_eq!(view.original_marked, "ab[-12-]你好\n");
    assert_eq!(view.processed_marked, "ab你好\n");
}

#[test]
fn line_diff_wraps_whole_differing_lines() {
    let view = render_diff("保持\n旧的行", "保持\n新的行", DiffMode::Line);
    assert_eq!(view.original_marked, "保持\n[-旧的行-]\n");
    assert_eq!(view.processed_marked, "保持\n{+新的行+}\n");
}

#[test]
fn diff_of_preview_round_trips_through_the_fixer() {
    let a = analyzer();
    let text = "中文English";
    let plan = a.plan_fix(text, &tiers(&[Tier::Safe]), None);
    let preview = a.preview_fix(text, &plan);
    let view = render_diff(&preview.original_segment, &preview.processed_segment, DiffMode::Token);
    // Common prefix and suffix tokens stay unmarked; only the inserted
    // space is highlighted on the processed side.
    assert_eq!(view.original_marked.lines().next().unwrap(), "中文English");
    assert_eq!(view.processed_marked.lines().next().unwrap(), "中文{+ +}English");
}
