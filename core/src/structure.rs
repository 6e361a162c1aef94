//! Structural indexer. Builds an outline from the top two heading levels and
//! partitions the document into contiguous sections, re-running the rule set
//! per section for local statistics.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{rules, Analyzer, ClassifiedIssue, Grouped, Issue, LineRange, Stats};

/// Outline matcher for `#` and `##` lines. The space after the marker is
/// optional here, unlike the `header-space` rule, so a heading missing its
/// space still anchors a section. The two patterns are intentionally
/// different; tests pin both.
static OUTLINE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,2})(.*)$").unwrap());

/// One recognized heading line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutlineEntry {
    pub level: u8,
    pub text: String,
    pub line_start: usize,
}

/// A heading-bounded slice of the document with its local issue statistics.
/// Ranges are absolute, inclusive line indices; section `i` ends one line
/// before section `i + 1` starts, and the last section ends at the final
/// line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub level: u8,
    pub range: LineRange,
    pub stats: Stats,
    pub sample_issues: Vec<ClassifiedIssue>,
}

/// Outline plus derived sections. Recomputed on every analysis; never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Structure {
    pub outline: Vec<OutlineEntry>,
    pub sections: Vec<Section>,
}

pub(crate) fn analyze_structure(analyzer: &Analyzer, text: &str) -> Structure {
    let lines: Vec<&str> = text.split('\n').collect();
    let in_fence = rules::fence_interior(&lines);
    let outline = parse_outline(&lines);
    let sections = outline
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let start = entry.line_start;
            let end = if idx + 1 < outline.len() {
                outline[idx + 1].line_start - 1
            } else {
                lines.len() - 1
            };
            let range = LineRange { start, end };
            build_section(analyzer, &lines, &in_fence, entry, range)
        })
        .collect();
    Structure { outline, sections }
}

fn parse_outline(lines: &[&str]) -> Vec<OutlineEntry> {
    let mut outline = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        // Empty input still splits into one empty line; never a heading.
        let Some(caps) = OUTLINE_HEADING.captures(line) else {
            continue;
        };
        outline.push(OutlineEntry {
            level: caps[1].len() as u8,
            text: caps[2].trim().to_string(),
            line_start: i,
        });
    }
    outline
}

/// Re-run the rule set over the section body (heading line excluded) with
/// issue lines re-based to absolute document coordinates.
fn build_section(
    analyzer: &Analyzer,
    lines: &[&str],
    in_fence: &[bool],
    entry: &OutlineEntry,
    range: LineRange,
) -> Section {
    let mut issues: Vec<Issue> = Vec::new();
    let body_start = range.start + 1;
    if body_start <= range.end {
        for (i, line) in lines[body_start..=range.end].iter().enumerate() {
            if line.trim().is_empty() || in_fence[body_start + i] {
                continue;
            }
            for rule in rules::LINE_RULES {
                issues.extend(rule(line, body_start + i));
            }
        }
        let slice = lines[body_start..=range.end].join("\n");
        for rule in rules::DOC_RULES {
            for mut issue in rule(&slice) {
                issue.line += body_start;
                if let Some(affected) = issue.fix.as_mut().and_then(|f| f.affected_lines.as_mut())
                {
                    for line in affected.iter_mut() {
                        *line += body_start;
                    }
                }
                issues.push(issue);
            }
        }
    }
    if !analyzer.config().disabled_codes.is_empty() {
        issues.retain(|issue| {
            !analyzer
                .config()
                .disabled_codes
                .iter()
                .any(|c| c == &issue.code)
        });
    }
    let grouped = Grouped::from_issues(issues);
    let stats = grouped.stats();
    let mut sample_issues = grouped.flatten();
    sample_issues.truncate(analyzer.config().sample_issues_cap);
    Section {
        heading: entry.text.clone(),
        level: entry.level,
        range,
        stats,
        sample_issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn structure_of(text: &str) -> Structure {
        analyze_structure(&Analyzer::new(Config::default()), text)
    }

    #[test]
    fn outline_accepts_headings_without_a_space() {
        let structure = structure_of("##标题\n正文。");
        assert_eq!(structure.outline.len(), 1);
        assert_eq!(structure.outline[0].level, 2);
        assert_eq!(structure.outline[0].text, "标题");
        assert_eq!(structure.outline[0].line_start, 0);
    }

    #[test]
    fn outline_ignores_deeper_heading_markers_as_level_two() {
        // The 1-2 marker match is greedy; `###` indexes as a level-2 entry
        // whose text keeps the extra marker.
        let structure = structure_of("###深层标题");
        assert_eq!(structure.outline.len(), 1);
        assert_eq!(structure.outline[0].level, 2);
        assert_eq!(structure.outline[0].text, "#深层标题");
    }

    #[test]
    fn sections_partition_the_document() {
        let text = "# 一\n内容甲\n内容乙\n## 二\n内容丙\n# 三\n内容丁";
        let structure = structure_of(text);
        assert_eq!(structure.sections.len(), structure.outline.len());
        assert_eq!(structure.sections.len(), 3);
        let ranges: Vec<(usize, usize)> = structure
            .sections
            .iter()
            .map(|s| (s.range.start, s.range.end))
            .collect();
        assert_eq!(ranges, vec![(0, 2), (3, 4), (5, 6)]);
        for pair in structure.sections.windows(2) {
            assert_eq!(pair[0].range.end + 1, pair[1].range.start);
        }
        assert_eq!(structure.sections.last().unwrap().range.end, 6);
    }

    #[test]
    fn no_headings_means_no_sections() {
        let structure = structure_of("只有正文。\n再来一行。");
        assert!(structure.outline.is_empty());
        assert!(structure.sections.is_empty());
    }

    #[test]
    fn section_stats_exclude_the_heading_line() {
        // The heading itself lacks a marker space but its issue is not
        // counted against the section body.
        let text = "##标题\n中文English";
        let structure = structure_of(text);
        let section = &structure.sections[0];
        assert_eq!(section.stats.safe, 1);
        assert_eq!(section.stats.total, 1);
        assert_eq!(section.sample_issues[0].issue.code, "missing-space");
    }

    #[test]
    fn section_issue_lines_are_absolute() {
        let text = "# 一\n正常行。\n## 二\n中文,标点";
        let structure = structure_of(text);
        let second = &structure.sections[1];
        assert_eq!(second.range.start, 2);
        assert_eq!(second.sample_issues[0].issue.line, 3);
    }

    #[test]
    fn section_broken_line_issues_are_rebased() {
        let text = "# 一\n这是第一句\n这是第二句。";
        let structure = structure_of(text);
        let section = &structure.sections[0];
        let broken: Vec<&ClassifiedIssue> = section
            .sample_issues
            .iter()
            .filter(|i| i.issue.code == "broken-line")
            .collect();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].issue.line, 1);
        assert_eq!(
            broken[0].issue.fix.as_ref().unwrap().affected_lines.as_deref(),
            Some(&[1, 2][..])
        );
    }

    #[test]
    fn sample_issues_are_capped() {
        let mut cfg = Config::default();
        cfg.sample_issues_cap = 2;
        let body: String = std::iter::repeat("中文English\n").take(6).collect();
        let text = format!("# 标题\n{body}");
        let structure = analyze_structure(&Analyzer::new(cfg), &text);
        let section = &structure.sections[0];
        assert!(section.stats.total > 2);
        assert_eq!(section.sample_issues.len(), 2);
    }

    #[test]
    fn empty_section_body_has_zero_stats() {
        let text = "# 一\n# 二\n正文。";
        let structure = structure_of(text);
        assert_eq!(structure.sections[0].range, LineRange { start: 0, end: 0 });
        assert_eq!(structure.sections[0].stats.total, 0);
    }
}
