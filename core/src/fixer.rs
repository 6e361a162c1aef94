//! Tier-scoped text transforms and the change report. SAFE rewrites
//! normalize markdown formatting and spacing; SUGGESTED rewrites merge
//! broken lines and normalize quotation marks. WARNING has no automatic
//! transform. A plan with a line range rewrites only that slice; everything
//! outside it is reattached verbatim.

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::rules::{fullwidth_counterpart, is_indent_exempt, THEMATIC_BREAK};
use crate::{is_cjk, is_cjk_or_fullwidth, split_lines, Plan, Tier};

/// Rewritten text plus the line-level change report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixResult {
    pub text: String,
    pub report: ChangeReport,
}

/// Non-destructive preview of a fix: the affected slice before and after
/// transformation (the whole text when the plan is global).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixPreview {
    pub original_segment: String,
    pub processed_segment: String,
}

/// Coarse label for one changed line pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Punctuation,
    Quotes,
    Spacing,
    Other,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Punctuation => "punctuation",
            ChangeKind::Quotes => "quotes",
            ChangeKind::Spacing => "spacing",
            ChangeKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// One before/after line pair. `line` is 1-based for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineChange {
    pub line: usize,
    pub original: String,
    pub processed: String,
    pub kind: ChangeKind,
}

/// Character, line, and word counts for one side of a fix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextStats {
    pub characters: usize,
    pub lines: usize,
    pub words: usize,
}

/// Line-level summary of what a fix changed. `changes` is capped; the
/// `modified_lines` count is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeReport {
    pub original: TextStats,
    pub processed: TextStats,
    pub modified_lines: usize,
    pub character_delta: i64,
    pub changes: Vec<LineChange>,
}

struct ScopedFix {
    original_segment: String,
    processed_segment: String,
    output: String,
}

pub(crate) fn apply_fix(text: &str, plan: &Plan, changes_cap: usize) -> FixResult {
    let scoped = scoped_transform(text, plan);
    let report = change_report(text, &scoped.output, changes_cap);
    FixResult {
        text: scoped.output,
        report,
    }
}

pub(crate) fn preview_fix(text: &str, plan: &Plan) -> FixPreview {
    let scoped = scoped_transform(text, plan);
    FixPreview {
        original_segment: scoped.original_segment,
        processed_segment: scoped.processed_segment,
    }
}

fn scoped_transform(text: &str, plan: &Plan) -> ScopedFix {
    match plan.section_range {
        Some(range) => {
            let lines = split_lines(text);
            let range = range.clamp_to(lines.len());
            let segment = lines[range.start..=range.end].join("\n");
            let processed = apply_transforms(&segment, plan);
            let mut output = String::new();
            if range.start > 0 {
                output.push_str(&lines[..range.start].join("\n"));
                output.push('\n');
            }
            output.push_str(&processed);
            if range.end + 1 < lines.len() {
                output.push('\n');
                output.push_str(&lines[range.end + 1..].join("\n"));
            }
            ScopedFix {
                original_segment: segment,
                processed_segment: processed,
                output,
            }
        }
        None => {
            let processed = apply_transforms(text, plan);
            ScopedFix {
                original_segment: text.to_string(),
                processed_segment: processed.clone(),
                output: processed,
            }
        }
    }
}

fn apply_transforms(segment: &str, plan: &Plan) -> String {
    let mut out = segment.to_string();
    if plan.selected_tiers.contains(&Tier::Safe) {
        out = fix_markdown_format(&out);
        out = fix_spacing(&out);
    }
    if plan.selected_tiers.contains(&Tier::Suggested) {
        out = merge_broken_lines(&out);
        out = normalize_quotes(&out);
    }
    out
}

static HEADING_ANY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s*(.*)").unwrap());
static LIST_UNORDERED_ANY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)[-*+]\s*(.+)$").unwrap());
static LIST_ORDERED_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)(\d+)\.\s*(.+)$").unwrap());
static LIST_NESTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s{4,})([-*+]|\d+\.)\s*(.+)$").unwrap());
static PADDED_INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`\s+([^`]+)\s+`").unwrap());
static MULTI_BLANK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// SAFE markdown-format pass: flush paragraph indentation, normalize heading
/// and list markers, insert a blank line before headings, tighten inline
/// code, and collapse runs of blank lines.
pub(crate) fn fix_markdown_format(text: &str) -> String {
    let lines = split_lines(text);
    let mut processed: Vec<String> = Vec::with_capacity(lines.len());
    for (i, raw) in lines.iter().enumerate() {
        let prev = if i > 0 { lines[i - 1] } else { "" };
        let line = fix_paragraph_indent(raw);
        let (line, needs_blank_before) = fix_heading(&line, prev);
        if needs_blank_before {
            if let Some(last) = processed.last() {
                if !last.is_empty() {
                    processed.push(String::new());
                }
            }
        }
        let line = fix_list_markers(&line);
        let line = tighten_inline_code(&line);
        processed.push(line);
    }
    normalize_blank_lines(&processed.join("\n"))
}

/// Strip disallowed leading indentation from a paragraph line, with the same
/// exemptions as the indent rule.
fn fix_paragraph_indent(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.is_empty() || line.starts_with("    ") || is_indent_exempt(trimmed) {
        return line.to_string();
    }
    let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
    if indent.is_empty() {
        return line.to_string();
    }
    if indent.contains('\u{3000}') || indent.contains('\t') {
        return line
            .trim_start_matches(['\u{3000}', '\t'])
            .to_string();
    }
    let width = indent.chars().count();
    if width == 1 || (width >= 3 && width != 4) {
        return line.trim_start().to_string();
    }
    // Two spaces may continue a list item; leave them.
    line.to_string()
}

/// Normalize a heading to `marker + space + content` and report whether a
/// blank line is needed before it (previous line non-blank and not itself a
/// heading).
fn fix_heading(line: &str, prev: &str) -> (String, bool) {
    let Some(caps) = HEADING_ANY.captures(line) else {
        return (line.to_string(), false);
    };
    let marker = &caps[1];
    let content = caps[2].trim();
    let prev_is_heading = prev.starts_with('#');
    let needs_blank = !prev.trim().is_empty() && !prev_is_heading;
    (format!("{marker} {content}"), needs_blank)
}

/// Normalize list markers and re-indent nested markers to two spaces per
/// level. Thematic breaks are left alone.
fn fix_list_markers(line: &str) -> String {
    if THEMATIC_BREAK.is_match(line) {
        return line.to_string();
    }
    let line = LIST_UNORDERED_ANY.replace(line, "$1- $2");
    let line = LIST_ORDERED_ANY.replace(&line, "$1$2. $3");
    let line = LIST_NESTED.replace(&line, |caps: &Captures| {
        let level = caps[1].chars().count() / 4 + 1;
        format!("{}{} {}", "  ".repeat(level), &caps[2], &caps[3])
    });
    line.into_owned()
}

/// Trim padding just inside inline code spans. Fence delimiter lines pass
/// through.
fn tighten_inline_code(line: &str) -> String {
    if line.starts_with("```") {
        return line.to_string();
    }
    PADDED_INLINE_CODE.replace_all(line, "`$1`").into_owned()
}

/// Drop leading/trailing blank lines, collapse runs of blank lines to one,
/// and end with a newline.
fn normalize_blank_lines(text: &str) -> String {
    let trimmed = text.trim_start_matches('\n').trim_end_matches('\n');
    let mut out = MULTI_BLANK.replace_all(trimmed, "\n\n").into_owned();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

static CJK_THEN_LATIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\u{4e00}-\u{9fff}])([A-Za-z0-9])").unwrap());
static LATIN_THEN_CJK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z0-9])([\u{4e00}-\u{9fff}])").unwrap());
static SPACE_BEFORE_CLOSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\u{4e00}-\u{9fff}])[ \t]+([，。！？：；）】”])").unwrap());
static SPACE_AFTER_OPENING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([（【“])\s+([\u{4e00}-\u{9fff}])").unwrap());
static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// SAFE spacing pass: insert boundary spaces between CJK and Latin runs,
/// strip spaces hugging CJK punctuation, and collapse space/tab runs. The
/// document's own newline flavor is preserved.
pub(crate) fn fix_spacing(text: &str) -> String {
    let crlf = text.contains("\r\n");
    let processed: Vec<String> = split_lines(text)
        .into_iter()
        .map(|line| {
            if THEMATIC_BREAK.is_match(line) {
                return line.to_string();
            }
            let line = CJK_THEN_LATIN.replace_all(line, "$1 $2");
            let line = LATIN_THEN_CJK.replace_all(&line, "$1 $2");
            let line = SPACE_BEFORE_CLOSING.replace_all(&line, "$1$2");
            let line = SPACE_AFTER_OPENING.replace_all(&line, "$1$2");
            SPACE_RUN.replace_all(&line, " ").into_owned()
        })
        .collect();
    processed.join(if crlf { "\r\n" } else { "\n" })
}

static ORDERED_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.").unwrap());

/// Lines that never take part in a merge: blanks, block-level constructs
/// (marker space not required), thematic breaks, and hard-break lines ending
/// in two spaces.
fn should_not_merge(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.starts_with('#')
        || trimmed.starts_with('-')
        || trimmed.starts_with('*')
        || trimmed.starts_with('+')
        || trimmed.starts_with('>')
        || trimmed.starts_with("```")
        || ORDERED_PREFIX.is_match(trimmed)
        || THEMATIC_BREAK.is_match(trimmed)
    {
        return true;
    }
    line.ends_with("  ")
}

/// An indented line directly under a list item continues that item.
fn is_list_continuation(line: &str, prev: &str) -> bool {
    let prev_trimmed = prev.trim();
    let prev_is_list = prev_trimmed.starts_with('-')
        || prev_trimmed.starts_with('*')
        || prev_trimmed.starts_with('+')
        || ORDERED_PREFIX.is_match(prev_trimmed);
    if !prev_is_list {
        return false;
    }
    let mut chars = line.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(a), Some(b)) if a.is_whitespace() && b.is_whitespace()
    )
}

/// SUGGESTED merge pass: join wrapped paragraph lines, with an empty joiner
/// between CJK boundaries and one space otherwise. Fenced content is emitted
/// verbatim; the same adjacency rules as the broken-line detector apply.
pub(crate) fn merge_broken_lines(text: &str) -> String {
    let lines = split_lines(text);
    let mut result: Vec<String> = Vec::new();
    let mut paragraph = String::new();
    let mut in_fence = false;
    for (i, line) in lines.iter().enumerate() {
        if line.trim().starts_with("```") {
            if !paragraph.is_empty() {
                result.push(std::mem::take(&mut paragraph));
            }
            result.push(line.to_string());
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            result.push(line.to_string());
            continue;
        }
        let prev = if i > 0 { lines[i - 1] } else { "" };
        let continuation = is_list_continuation(line, prev);
        if should_not_merge(line) || paragraph.is_empty() || continuation {
            if !paragraph.is_empty() {
                result.push(std::mem::take(&mut paragraph));
            }
            if should_not_merge(line) || continuation {
                result.push(line.to_string());
            } else {
                paragraph = line.to_string();
            }
        } else {
            let trimmed = line.trim();
            let last = paragraph.chars().last();
            let first = trimmed.chars().next();
            if !(last.is_some_and(is_cjk_or_fullwidth) && first.is_some_and(is_cjk_or_fullwidth)) {
                paragraph.push(' ');
            }
            paragraph.push_str(trimmed);
        }
    }
    if !paragraph.is_empty() {
        result.push(paragraph);
    }
    result.join("\n")
}

/// Every glyph the quote normalizer rewrites, canonical curly doubles
/// included so mismatched survivors get re-alternated.
const FOREIGN_QUOTES: &[&str] = &[
    "\"",
    "\u{201c}",
    "\u{201d}",
    "「",
    "」",
    "『",
    "』",
    "\u{201a}",
    "\u{201e}",
    "\u{2039}",
    "\u{203a}",
    "«",
    "»",
];

static FOREIGN_QUOTE_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| AhoCorasick::new(FOREIGN_QUOTES));
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`\n]+`").unwrap());

/// SUGGESTED quote pass. Every foreign quote glyph outside protected spans
/// is replaced positionally: the 1st, 3rd, 5th... occurrence becomes the
/// canonical opener, the 2nd, 4th, 6th... the canonical closer, and an odd
/// total appends one closer at the end of the scope. The alternation is not
/// pairing-aware: nested or interleaved quotations will be mis-paired. That
/// is the documented contract, not a defect.
pub(crate) fn normalize_quotes(text: &str) -> String {
    let protected = protected_ranges(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut opener = true;
    for mat in FOREIGN_QUOTE_MATCHER.find_iter(text) {
        if protected
            .iter()
            .any(|&(start, end)| mat.start() >= start && mat.start() < end)
        {
            continue;
        }
        out.push_str(&text[last..mat.start()]);
        out.push(if opener { '\u{201c}' } else { '\u{201d}' });
        opener = !opener;
        last = mat.end();
    }
    out.push_str(&text[last..]);
    if !opener {
        out.push('\u{201d}');
    }
    out
}

/// Byte ranges exempt from quote replacement: fenced blocks, inline code
/// spans outside them, and 4-space-indented lines.
fn protected_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for mat in FENCED_BLOCK.find_iter(text) {
        ranges.push((mat.start(), mat.end()));
    }
    for mat in INLINE_CODE.find_iter(text) {
        let overlaps = ranges
            .iter()
            .any(|&(start, end)| mat.start() < end && mat.end() > start);
        if !overlaps {
            ranges.push((mat.start(), mat.end()));
        }
    }
    let mut offset = 0;
    for segment in text.split_inclusive('\n') {
        let content = segment.strip_suffix('\n').unwrap_or(segment);
        if content.starts_with("    ") {
            ranges.push((offset, offset + content.len()));
        }
        offset += segment.len();
    }
    ranges
}

/// Stage toggles for the one-shot cleanup pipeline. Traditional-character
/// conversion belongs to an external converter and has no stage here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessOptions {
    pub merge_broken_lines: bool,
    pub fix_format: bool,
    pub fix_punctuation: bool,
    pub normalize_quotes: bool,
    pub fix_spacing: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            merge_broken_lines: false,
            fix_format: true,
            fix_punctuation: true,
            normalize_quotes: true,
            fix_spacing: true,
        }
    }
}

/// One-shot cleanup: every enabled stage in a fixed order, independent of
/// tier planning.
pub(crate) fn process_text(text: &str, options: &ProcessOptions) -> String {
    let mut out = text.to_string();
    if options.merge_broken_lines {
        out = merge_broken_lines(&out);
    }
    if options.fix_format {
        out = fix_markdown_format(&out);
    }
    if options.fix_punctuation {
        out = normalize_punctuation(&out);
    }
    if options.normalize_quotes {
        out = normalize_quotes(&out);
    }
    if options.fix_spacing {
        out = fix_spacing(&out);
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

const fn ascii_counterpart(c: char) -> Option<char> {
    match c {
        '，' => Some(','),
        '。' => Some('.'),
        '：' => Some(':'),
        '；' => Some(';'),
        '！' => Some('!'),
        '？' => Some('?'),
        _ => None,
    }
}

/// Punctuation normalization by script context: ASCII sentence marks after
/// CJK become fullwidth (unless a word character follows, which keeps
/// `3.14` and `中文.com` intact), a comma between a digit and CJK becomes
/// fullwidth, and fullwidth marks after Latin or digits become ASCII.
/// Fenced blocks, inline code, and thematic breaks are untouched.
pub(crate) fn normalize_punctuation(text: &str) -> String {
    let protected = protected_punctuation_ranges(text);
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut out = String::with_capacity(text.len());
    for i in 0..chars.len() {
        let (offset, c) = chars[i];
        if protected
            .iter()
            .any(|&(start, end)| offset >= start && offset < end)
        {
            out.push(c);
            continue;
        }
        let prev = i.checked_sub(1).map(|p| chars[p].1);
        let next = chars.get(i + 1).map(|&(_, n)| n);
        if let Some(full) = fullwidth_counterpart(c) {
            let after_cjk = prev.is_some_and(is_cjk);
            let before_word = next.is_some_and(is_word_char);
            if after_cjk && !before_word {
                out.push(full);
                continue;
            }
            if c == ',' && prev.is_some_and(|p| p.is_ascii_digit()) && next.is_some_and(is_cjk) {
                out.push('，');
                continue;
            }
        }
        if let Some(ascii) = ascii_counterpart(c) {
            if prev.is_some_and(|p| p.is_ascii_alphanumeric()) {
                out.push(ascii);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Byte ranges the punctuation pass must not rewrite: fenced blocks, inline
/// code spans, and whole thematic-break lines.
fn protected_punctuation_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for mat in FENCED_BLOCK.find_iter(text) {
        ranges.push((mat.start(), mat.end()));
    }
    for mat in INLINE_CODE.find_iter(text) {
        let overlaps = ranges
            .iter()
            .any(|&(start, end)| mat.start() < end && mat.end() > start);
        if !overlaps {
            ranges.push((mat.start(), mat.end()));
        }
    }
    let mut offset = 0;
    for segment in text.split_inclusive('\n') {
        let content = segment.strip_suffix('\n').unwrap_or(segment);
        if THEMATIC_BREAK.is_match(content) {
            ranges.push((offset, offset + content.len()));
        }
        offset += segment.len();
    }
    ranges
}

/// Words for report statistics: CJK ideographs count one each, every other
/// word counts once.
fn count_words(text: &str) -> usize {
    text.unicode_words()
        .map(|word| {
            if word.chars().any(is_cjk) {
                word.chars().filter(|&c| is_cjk(c)).count()
            } else {
                1
            }
        })
        .sum()
}

fn text_stats(text: &str) -> TextStats {
    TextStats {
        characters: text.chars().count(),
        lines: split_lines(text).len(),
        words: count_words(text),
    }
}

const PUNCT_CHARS: &[char] = &[
    ',', '.', ':', ';', '!', '?', '，', '。', '：', '；', '！', '？',
];

const QUOTE_CHARS: &[char] = &[
    '"', '\'', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}', '「', '」', '『', '』',
];

fn strip_chars(line: &str, set: &[char]) -> String {
    line.chars().filter(|c| !set.contains(c)).collect()
}

fn strip_whitespace(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}

fn classify_change(original: &str, processed: &str) -> ChangeKind {
    let orig_blank = original.trim().is_empty();
    let proc_blank = processed.trim().is_empty();
    if orig_blank && !proc_blank {
        return ChangeKind::Added;
    }
    if !orig_blank && proc_blank {
        return ChangeKind::Removed;
    }
    if strip_chars(original, PUNCT_CHARS) == strip_chars(processed, PUNCT_CHARS) {
        return ChangeKind::Punctuation;
    }
    if strip_chars(original, QUOTE_CHARS) == strip_chars(processed, QUOTE_CHARS) {
        return ChangeKind::Quotes;
    }
    if strip_whitespace(original) == strip_whitespace(processed) {
        return ChangeKind::Spacing;
    }
    ChangeKind::Other
}

/// Pair lines by index across input and output and summarize the deltas.
pub(crate) fn change_report(original: &str, processed: &str, changes_cap: usize) -> ChangeReport {
    let original_lines = split_lines(original);
    let processed_lines = split_lines(processed);
    let mut modified_lines = 0;
    let mut changes = Vec::new();
    for i in 0..original_lines.len().max(processed_lines.len()) {
        let before = original_lines.get(i).copied().unwrap_or("");
        let after = processed_lines.get(i).copied().unwrap_or("");
        if before == after {
            continue;
        }
        modified_lines += 1;
        if changes.len() < changes_cap {
            changes.push(LineChange {
                line: i + 1,
                original: before.to_string(),
                processed: after.to_string(),
                kind: classify_change(before, after),
            });
        }
    }
    ChangeReport {
        original: text_stats(original),
        processed: text_stats(processed),
        modified_lines,
        character_delta: processed.chars().count() as i64 - original.chars().count() as i64,
        changes,
    }
}
