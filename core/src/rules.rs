//! Detector set. Four line rules run per non-blank line outside fenced
//! blocks; two document rules scan the whole text because they need fence
//! state or adjacent-line context. All rules are pure and emit zero or more
//! [`Issue`]s.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{is_cjk, FixHint, FixKind, Issue, Severity};

pub(crate) type LineRule = fn(&str, usize) -> Vec<Issue>;
pub(crate) type DocRule = fn(&str) -> Vec<Issue>;

pub(crate) const LINE_RULES: &[LineRule] = &[
    check_indent,
    check_header_space,
    check_mixed_punc,
    check_missing_space,
];

pub(crate) const DOC_RULES: &[DocRule] = &[check_quotes, check_broken_lines];

static HEADING_SPACED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s").unwrap());
static LIST_UNORDERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*+]\s").unwrap());
static LIST_ORDERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s").unwrap());
static BLOCKQUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*>").unwrap());
static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```").unwrap());
pub(crate) static THEMATIC_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:-{3,}|\*{3,}|_{3,})\s*$").unwrap());

static HEADER_NO_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})[^ ]").unwrap());
static WHOLE_LINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*`[^`]+`\s*$").unwrap());
static INDENTED_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{4,}").unwrap());

/// Block-level constructs that never take part in a line merge: headings,
/// list items, blockquotes, and fence delimiters.
static BLOCK_CONSTRUCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{1,6}(?:\s|$)|^\s*(?:[-*+]\s|\d+\.\s|>)|^\s*```").unwrap());

/// Characters that end a sentence, CJK or ASCII.
const SENTENCE_TERMINALS: &[char] = &['。', '！', '？', '：', '.', '!', '?', ':'];

/// Lines exempt from the indent rule: block-level markdown syntax, where a
/// leading run is structural rather than accidental.
pub(crate) fn is_indent_exempt(trimmed: &str) -> bool {
    HEADING_SPACED.is_match(trimmed)
        || LIST_UNORDERED.is_match(trimmed)
        || LIST_ORDERED.is_match(trimmed)
        || BLOCKQUOTE.is_match(trimmed)
        || FENCE.is_match(trimmed)
        || THEMATIC_BREAK.is_match(trimmed)
}

/// Per-line fence state for a document: true for lines strictly inside a
/// fenced block. Delimiter lines themselves are not interior; they stay
/// visible to the line-start syntax checks.
pub(crate) fn fence_interior(lines: &[&str]) -> Vec<bool> {
    let mut flags = vec![false; lines.len()];
    let mut in_fence = false;
    for (i, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        flags[i] = in_fence;
    }
    flags
}

/// Replace inline code spans (backticks included) with spaces so adjacency
/// rules neither fire inside code nor see false adjacency across it. The
/// masked string has the same character count as the input.
pub(crate) fn mask_inline_code(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = chars.clone();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '`' {
            if let Some(gap) = chars[i + 1..].iter().position(|&c| c == '`') {
                let end = i + 1 + gap;
                for slot in out.iter_mut().take(end + 1).skip(i) {
                    *slot = ' ';
                }
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    out.into_iter().collect()
}

pub(crate) const fn fullwidth_counterpart(c: char) -> Option<char> {
    match c {
        ',' => Some('，'),
        '.' => Some('。'),
        ':' => Some('：'),
        ';' => Some('；'),
        '?' => Some('？'),
        '!' => Some('！'),
        _ => None,
    }
}

/// Non-canonical quotation glyphs the detector flags, with the canonical
/// curly replacement suggested per glyph.
const fn quote_replacement(c: char) -> Option<char> {
    match c {
        '"' | '「' | '『' => Some('\u{201c}'),
        '」' | '』' => Some('\u{201d}'),
        _ => None,
    }
}

/// Flag accidental leading indentation on a paragraph line. A fullwidth
/// space or tab run is always flagged; a run of exactly 2 spaces is
/// tolerated as a possible list continuation, and 4+ spaces mark indented
/// code. Block-level lines are exempt.
pub(crate) fn check_indent(line: &str, idx: usize) -> Vec<Issue> {
    let trimmed = line.trim();
    if trimmed.is_empty() || line.starts_with("    ") || is_indent_exempt(trimmed) {
        return Vec::new();
    }
    let run: String = line.chars().take_while(|c| c.is_whitespace()).collect();
    if run.is_empty() {
        return Vec::new();
    }
    let flagged = if run.contains('\u{3000}') || run.contains('\t') {
        true
    } else {
        matches!(run.chars().count(), 1 | 3)
    };
    if !flagged {
        return Vec::new();
    }
    vec![Issue {
        line: idx,
        start_col: 0,
        end_col: run.chars().count(),
        severity: Severity::Warning,
        code: "indent-style".into(),
        message: "Paragraph starts with indentation; remove it to keep lines flush.".into(),
        fix: Some(FixHint {
            kind: FixKind::Delete,
            text: String::new(),
            affected_lines: None,
        }),
    }]
}

/// Flag an ATX heading marker not followed by a space.
pub(crate) fn check_header_space(line: &str, idx: usize) -> Vec<Issue> {
    let Some(caps) = HEADER_NO_SPACE.captures(line) else {
        return Vec::new();
    };
    let marker = caps.get(1).expect("marker group").as_str();
    let width = marker.chars().count();
    vec![Issue {
        line: idx,
        start_col: 0,
        end_col: width,
        severity: Severity::Error,
        code: "header-space".into(),
        message: "Heading marker is missing a space before its text.".into(),
        fix: Some(FixHint {
            kind: FixKind::Replace,
            text: format!("{marker} "),
            affected_lines: None,
        }),
    }]
}

/// Flag ASCII sentence punctuation directly after a CJK character, outside
/// inline code.
pub(crate) fn check_mixed_punc(line: &str, idx: usize) -> Vec<Issue> {
    let masked: Vec<char> = mask_inline_code(line).chars().collect();
    let mut issues = Vec::new();
    for i in 0..masked.len().saturating_sub(1) {
        if !is_cjk(masked[i]) {
            continue;
        }
        let Some(full) = fullwidth_counterpart(masked[i + 1]) else {
            continue;
        };
        issues.push(Issue {
            line: idx,
            start_col: i + 1,
            end_col: i + 2,
            severity: Severity::Warning,
            code: "mixed-punc".into(),
            message: format!(
                "ASCII punctuation `{}` follows CJK text; use `{}`.",
                masked[i + 1],
                full
            ),
            fix: Some(FixHint {
                kind: FixKind::Replace,
                text: full.to_string(),
                affected_lines: None,
            }),
        });
    }
    issues
}

/// Flag a CJK character directly adjacent to a Latin letter or digit,
/// outside inline code. Both orders are scanned, CJK-first pairs before
/// Latin-first pairs.
pub(crate) fn check_missing_space(line: &str, idx: usize) -> Vec<Issue> {
    let masked: Vec<char> = mask_inline_code(line).chars().collect();
    let mut issues = Vec::new();
    let mut push = |i: usize, a: char, b: char| {
        issues.push(Issue {
            line: idx,
            start_col: i,
            end_col: i + 2,
            severity: Severity::Info,
            code: "missing-space".into(),
            message: "Missing space between CJK and Latin characters.".into(),
            fix: Some(FixHint {
                kind: FixKind::Replace,
                text: format!("{a} {b}"),
                affected_lines: None,
            }),
        });
    };
    for i in 0..masked.len().saturating_sub(1) {
        if is_cjk(masked[i]) && masked[i + 1].is_ascii_alphanumeric() {
            push(i, masked[i], masked[i + 1]);
        }
    }
    for i in 0..masked.len().saturating_sub(1) {
        if masked[i].is_ascii_alphanumeric() && is_cjk(masked[i + 1]) {
            push(i, masked[i], masked[i + 1]);
        }
    }
    issues
}

/// Flag non-canonical quotation glyphs. Content inside fenced blocks,
/// whole-line inline code, indented code, and inline code spans is exempt;
/// the fence toggle flips on each bare delimiter line.
pub(crate) fn check_quotes(text: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut in_fence = false;
    for (idx, line) in text.split('\n').enumerate() {
        if line.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || WHOLE_LINE_CODE.is_match(line) || INDENTED_CODE.is_match(line) {
            continue;
        }
        for (col, c) in mask_inline_code(line).chars().enumerate() {
            let Some(replacement) = quote_replacement(c) else {
                continue;
            };
            issues.push(Issue {
                line: idx,
                start_col: col,
                end_col: col + 1,
                severity: Severity::Warning,
                code: "quote-style".into(),
                message: format!("Non-canonical quotation mark `{c}`; use curly quotes."),
                fix: Some(FixHint {
                    kind: FixKind::Replace,
                    text: replacement.to_string(),
                    affected_lines: None,
                }),
            });
        }
    }
    issues
}

/// Flag adjacent line pairs that look like one wrapped paragraph: both
/// non-empty, neither a block construct, thematic break, or indented code,
/// and the first does not end in a sentence terminal. The suggested joiner
/// is empty when both boundary characters are CJK, otherwise one space.
pub(crate) fn check_broken_lines(text: &str) -> Vec<Issue> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut issues = Vec::new();
    let mut in_fence = false;
    for i in 0..lines.len().saturating_sub(1) {
        let current = lines[i].trim_end();
        let next = lines[i + 1].trim_end();
        if current.is_empty() || next.is_empty() {
            continue;
        }
        if FENCE.is_match(current) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if BLOCK_CONSTRUCT.is_match(current) || BLOCK_CONSTRUCT.is_match(next) {
            continue;
        }
        if THEMATIC_BREAK.is_match(current) || THEMATIC_BREAK.is_match(next) {
            continue;
        }
        if current.starts_with("    ") || next.starts_with("    ") {
            continue;
        }
        let last = current.chars().last();
        if last.is_some_and(|c| SENTENCE_TERMINALS.contains(&c)) {
            continue;
        }
        let first = next.chars().next();
        let joiner = if last.is_some_and(is_cjk) && first.is_some_and(is_cjk) {
            ""
        } else {
            " "
        };
        issues.push(Issue {
            line: i,
            start_col: 0,
            end_col: current.chars().count(),
            severity: Severity::Warning,
            code: "broken-line".into(),
            message: format!(
                "Paragraph appears broken across lines {} and {}; consider merging.",
                i + 1,
                i + 2
            ),
            fix: Some(FixHint {
                kind: FixKind::Merge,
                text: format!("{current}{joiner}{next}"),
                affected_lines: Some(vec![i, i + 1]),
            }),
        });
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_flags_fullwidth_space() {
        let issues = check_indent("　段落缩进", 3);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "indent-style");
        assert_eq!(issues[0].line, 3);
        assert_eq!((issues[0].start_col, issues[0].end_col), (0, 1));
    }

    #[test]
    fn indent_flags_tab_and_odd_space_runs() {
        assert_eq!(check_indent("\t正文", 0).len(), 1);
        assert_eq!(check_indent(" 正文", 0).len(), 1);
        assert_eq!(check_indent("   正文", 0).len(), 1);
    }

    #[test]
    fn indent_tolerates_two_spaces_and_code_blocks() {
        assert!(check_indent("  可能是列表延续", 5).is_empty());
        assert!(check_indent("    code line", 5).is_empty());
    }

    #[test]
    fn indent_exempts_block_constructs() {
        assert!(check_indent("# 标题", 0).is_empty());
        assert!(check_indent("- 列表项", 0).is_empty());
        assert!(check_indent("1. 列表项", 0).is_empty());
        assert!(check_indent("> 引用", 0).is_empty());
        assert!(check_indent("```rust", 0).is_empty());
        assert!(check_indent("---", 0).is_empty());
    }

    #[test]
    fn header_space_flags_missing_space() {
        let issues = check_header_space("##标题", 0);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!((issues[0].start_col, issues[0].end_col), (0, 2));
        assert_eq!(issues[0].fix.as_ref().unwrap().text, "## ");
    }

    #[test]
    fn header_space_ignores_correct_headings_and_bare_markers() {
        assert!(check_header_space("## 标题", 0).is_empty());
        assert!(check_header_space("##", 0).is_empty());
    }

    #[test]
    fn mixed_punc_flags_ascii_after_cjk() {
        let issues = check_mixed_punc("中文,English.", 0);
        assert_eq!(issues.len(), 1);
        assert_eq!((issues[0].start_col, issues[0].end_col), (2, 3));
        assert_eq!(issues[0].fix.as_ref().unwrap().text, "，");
    }

    #[test]
    fn mixed_punc_skips_inline_code() {
        assert!(check_mixed_punc("`中文,` 其余正常。", 0).is_empty());
    }

    #[test]
    fn mixed_punc_does_not_bridge_masked_code_spans() {
        // The comma follows a code span, not the ideograph before it.
        assert!(check_mixed_punc("中`x`,", 0).is_empty());
    }

    #[test]
    fn missing_space_flags_both_orders() {
        let issues = check_missing_space("中a和b中", 0);
        let cols: Vec<(usize, usize)> = issues.iter().map(|i| (i.start_col, i.end_col)).collect();
        // CJK-first pairs are reported before Latin-first pairs.
        assert_eq!(cols, vec![(0, 2), (2, 4), (1, 3), (3, 5)]);
    }

    #[test]
    fn quotes_flag_straight_and_corner_glyphs() {
        let issues = check_quotes("他说\"你好\"\n「书名」\n『引文』");
        let codes: Vec<&str> = issues.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes.len(), 6);
        assert!(codes.iter().all(|&c| c == "quote-style"));
        assert_eq!(issues[2].fix.as_ref().unwrap().text, "\u{201c}");
        assert_eq!(issues[3].fix.as_ref().unwrap().text, "\u{201d}");
    }

    #[test]
    fn quotes_skip_fenced_and_indented_code() {
        let text = "```\n\"quoted\"\n```\n    \"code\"\n`\"inline\"`";
        assert!(check_quotes(text).is_empty());
    }

    #[test]
    fn broken_line_suggests_empty_joiner_for_cjk_boundary() {
        let issues = check_broken_lines("这是第一句\n这是第二句。");
        assert_eq!(issues.len(), 1);
        let fix = issues[0].fix.as_ref().unwrap();
        assert_eq!(fix.kind, FixKind::Merge);
        assert_eq!(fix.text, "这是第一句这是第二句。");
        assert_eq!(fix.affected_lines.as_deref(), Some(&[0, 1][..]));
    }

    #[test]
    fn broken_line_suggests_space_joiner_for_latin_boundary() {
        let issues = check_broken_lines("first fragment\nsecond fragment.");
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].fix.as_ref().unwrap().text,
            "first fragment second fragment."
        );
    }

    #[test]
    fn broken_line_respects_terminals_and_blocks() {
        assert!(check_broken_lines("这一句结束了。\n下一句。").is_empty());
        assert!(check_broken_lines("# 标题\n正文").is_empty());
        assert!(check_broken_lines("正文\n- 列表").is_empty());
    }

    #[test]
    fn broken_line_skips_fenced_content() {
        let text = "```\nlet a\nlet b\n```";
        assert!(check_broken_lines(text).is_empty());
    }

    #[test]
    fn mask_preserves_character_positions() {
        let masked = mask_inline_code("前`code`后");
        assert_eq!(masked.chars().count(), "前`code`后".chars().count());
        assert!(masked.starts_with('前'));
        assert!(masked.ends_with('后'));
    }
}
