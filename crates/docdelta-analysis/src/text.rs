// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text differencing at line, word and character granularity.
//
// `exact` aligns lines with an LCS table, `smart` aligns whitespace tokens
// with a bounded-lookahead greedy scan, and `character` runs a full LCS over
// characters. Every difference carries token ranges in the method's own
// units so callers can map fragments back to text runs.

use std::ops::Range;

use docdelta_core::{ChangeType, DifferenceType, Severity, TextComparisonMethod, severity};
use tracing::{debug, instrument};

/// Tokens searched ahead on each side by the greedy word scan.
pub const LOOKAHEAD: usize = 10;

/// Longest run of tokens collapsed into one `modified` span.
pub const MAX_MODIFIED_SPAN: usize = 5;

/// Largest LCS table (cells) built before falling back to the greedy scan.
pub const LCS_CELL_LIMIT: usize = 4_000_000;

/// One contiguous change between the two texts.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDifference {
    pub change_type: ChangeType,
    /// Fragment removed or replaced (empty for pure additions).
    pub base_text: String,
    /// Fragment inserted or substituted (empty for pure deletions).
    pub compare_text: String,
    /// Token range replaced in the base text.
    pub base_range: Range<usize>,
    /// Token range inserted from the compare text.
    pub compare_range: Range<usize>,
    /// Changed length relative to the longer text, in [0, 1].
    pub magnitude: f64,
    pub severity: Severity,
    /// Token unit the ranges are expressed in. Differs from the requested
    /// method when a character diff fell back to words.
    pub method: TextComparisonMethod,
}

impl TextDifference {
    /// Short human-readable summary, used as the difference description.
    pub fn describe(&self) -> String {
        match self.change_type {
            ChangeType::Added => format!("Text added: \"{}\"", excerpt(&self.compare_text)),
            ChangeType::Deleted => format!("Text deleted: \"{}\"", excerpt(&self.base_text)),
            ChangeType::Modified => format!(
                "Text changed: \"{}\" → \"{}\"",
                excerpt(&self.base_text),
                excerpt(&self.compare_text)
            ),
        }
    }
}

fn excerpt(text: &str) -> String {
    const LIMIT: usize = 60;
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= LIMIT {
        flat
    } else {
        let cut: String = flat.chars().take(LIMIT).collect();
        format!("{cut}…")
    }
}

/// Split `text` into the tokens a method works on.
pub fn tokenize(text: &str, method: TextComparisonMethod) -> Vec<&str> {
    match method {
        TextComparisonMethod::Exact => text.lines().collect(),
        TextComparisonMethod::Smart => text.split_whitespace().collect(),
        TextComparisonMethod::Character => text
            .char_indices()
            .map(|(idx, ch)| &text[idx..idx + ch.len_utf8()])
            .collect(),
    }
}

fn separator(method: TextComparisonMethod) -> &'static str {
    match method {
        TextComparisonMethod::Exact => "\n",
        TextComparisonMethod::Smart => " ",
        TextComparisonMethod::Character => "",
    }
}

/// Raw alignment result before fragments and severities are attached.
#[derive(Debug, Clone, PartialEq)]
struct Span {
    change: ChangeType,
    base: Range<usize>,
    compare: Range<usize>,
}

/// Differ configured for one comparison method.
#[derive(Debug, Clone)]
pub struct TextDiffer {
    method: TextComparisonMethod,
    lookahead: usize,
    max_modified_span: usize,
}

impl TextDiffer {
    pub fn new(method: TextComparisonMethod) -> Self {
        Self {
            method,
            lookahead: LOOKAHEAD,
            max_modified_span: MAX_MODIFIED_SPAN,
        }
    }

    pub fn method(&self) -> TextComparisonMethod {
        self.method
    }

    /// Compare two optional texts. `None` is treated like an empty string.
    #[instrument(skip_all, fields(method = ?self.method))]
    pub fn diff(&self, base: Option<&str>, compare: Option<&str>) -> Vec<TextDifference> {
        let base = base.unwrap_or("");
        let compare = compare.unwrap_or("");
        if base == compare {
            return Vec::new();
        }

        let blank = |text: &str| match self.method {
            TextComparisonMethod::Character => text.is_empty(),
            _ => text.trim().is_empty(),
        };
        match (blank(base), blank(compare)) {
            (true, true) => return Vec::new(),
            (true, false) => return vec![self.whole_text(ChangeType::Added, base, compare)],
            (false, true) => return vec![self.whole_text(ChangeType::Deleted, base, compare)],
            (false, false) => {}
        }

        let mut method = self.method;
        let mut a = tokenize(base, method);
        let mut b = tokenize(compare, method);

        if method == TextComparisonMethod::Character && !fits_lcs(&a, &b) {
            debug!(base_chars = a.len(), compare_chars = b.len(), "character table too large, using word diff");
            method = TextComparisonMethod::Smart;
            a = tokenize(base, method);
            b = tokenize(compare, method);
        }

        let spans = match method {
            TextComparisonMethod::Character => lcs_spans(&a, &b, false),
            TextComparisonMethod::Exact if fits_lcs(&a, &b) => lcs_spans(&a, &b, true),
            TextComparisonMethod::Exact | TextComparisonMethod::Smart => {
                greedy_spans(&a, &b, self.lookahead, self.max_modified_span)
            }
        };

        let total = base.chars().count().max(compare.chars().count()).max(1) as f64;
        let sep = separator(method);
        let differences: Vec<TextDifference> = spans
            .into_iter()
            .map(|span| {
                let base_text = a[span.base.clone()].join(sep);
                let compare_text = b[span.compare.clone()].join(sep);
                let changed = base_text.chars().count().max(compare_text.chars().count()) as f64;
                let magnitude = (changed / total).clamp(0.0, 1.0);
                TextDifference {
                    change_type: span.change,
                    base_text,
                    compare_text,
                    base_range: span.base,
                    compare_range: span.compare,
                    magnitude,
                    severity: severity(DifferenceType::Text, magnitude),
                    method,
                }
            })
            .collect();

        debug!(count = differences.len(), "text diff complete");
        differences
    }

    /// One side is missing: report the whole other side, always as major.
    fn whole_text(&self, change: ChangeType, base: &str, compare: &str) -> TextDifference {
        let base_len = tokenize(base, self.method).len();
        let compare_len = tokenize(compare, self.method).len();
        TextDifference {
            change_type: change,
            base_text: base.to_string(),
            compare_text: compare.to_string(),
            base_range: 0..base_len,
            compare_range: 0..compare_len,
            magnitude: 1.0,
            severity: Severity::Major,
            method: self.method,
        }
    }
}

/// Rebuild the compare text by applying `differences` to `base`. Exact for
/// the `character` method, where tokens are characters and the separator is
/// empty.
pub fn apply(base: &str, differences: &[TextDifference]) -> String {
    let chars: Vec<char> = base.chars().collect();
    let mut out = String::with_capacity(base.len());
    let mut cursor = 0usize;
    for difference in differences {
        let start = difference.base_range.start.min(chars.len());
        let end = difference.base_range.end.min(chars.len());
        if start > cursor {
            out.extend(&chars[cursor..start]);
        }
        out.push_str(&difference.compare_text);
        cursor = cursor.max(end);
    }
    if cursor < chars.len() {
        out.extend(&chars[cursor..]);
    }
    out
}

fn fits_lcs(a: &[&str], b: &[&str]) -> bool {
    (a.len() + 1).saturating_mul(b.len() + 1) <= LCS_CELL_LIMIT
}

// -- LCS -----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Equal,
    Delete,
    Insert,
}

/// Minimal edit script between `a` and `b` via a suffix LCS table. Common
/// prefix and suffix are peeled off first to keep the table small.
fn lcs_ops(a: &[&str], b: &[&str]) -> Vec<Op> {
    let prefix = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];
    let (n, m) = (a_mid.len(), b_mid.len());

    // table[i * (m + 1) + j] = LCS length of a_mid[i..] and b_mid[j..]
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a_mid[i] == b_mid[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut ops = vec![Op::Equal; prefix];
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a_mid[i] == b_mid[j] {
            ops.push(Op::Equal);
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            ops.push(Op::Delete);
            i += 1;
        } else {
            ops.push(Op::Insert);
            j += 1;
        }
    }
    ops.extend(std::iter::repeat_n(Op::Delete, n - i));
    ops.extend(std::iter::repeat_n(Op::Insert, m - j));
    ops.extend(std::iter::repeat_n(Op::Equal, suffix));
    ops
}

/// Group an edit script into spans. With `pair_modified`, a block holding
/// both deletions and insertions becomes one `modified` span; otherwise it
/// yields a `deleted` span followed by an `added` span.
fn lcs_spans(a: &[&str], b: &[&str], pair_modified: bool) -> Vec<Span> {
    let ops = lcs_ops(a, b);
    let mut spans = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    let mut idx = 0;
    while idx < ops.len() {
        if ops[idx] == Op::Equal {
            i += 1;
            j += 1;
            idx += 1;
            continue;
        }
        let (i0, j0) = (i, j);
        while idx < ops.len() && ops[idx] != Op::Equal {
            match ops[idx] {
                Op::Delete => i += 1,
                Op::Insert => j += 1,
                Op::Equal => unreachable!("loop stops at equal ops"),
            }
            idx += 1;
        }
        let deleted = i > i0;
        let inserted = j > j0;
        if pair_modified && deleted && inserted {
            spans.push(Span {
                change: ChangeType::Modified,
                base: i0..i,
                compare: j0..j,
            });
            continue;
        }
        if deleted {
            spans.push(Span {
                change: ChangeType::Deleted,
                base: i0..i,
                compare: j0..j0,
            });
        }
        if inserted {
            spans.push(Span {
                change: ChangeType::Added,
                base: i..i,
                compare: j0..j,
            });
        }
    }
    spans
}

// -- Greedy lookahead ---------------------------------------------------------

/// Scan both token streams; on a mismatch look up to `lookahead` tokens ahead
/// on each side for the other side's current token. The closer hit decides
/// whether the skipped tokens were added or deleted; a tie or no hit
/// collapses into a `modified` span of at most `max_span` tokens.
fn greedy_spans(a: &[&str], b: &[&str], lookahead: usize, max_span: usize) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);

    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            i += 1;
            j += 1;
            continue;
        }

        let in_compare = (1..=lookahead).find(|&k| j + k < b.len() && b[j + k] == a[i]);
        let in_base = (1..=lookahead).find(|&k| i + k < a.len() && a[i + k] == b[j]);

        match (in_base, in_compare) {
            (Some(da), Some(db)) if da < db => {
                push_merged(&mut spans, ChangeType::Deleted, i..i + da, j..j);
                i += da;
            }
            (Some(da), None) => {
                push_merged(&mut spans, ChangeType::Deleted, i..i + da, j..j);
                i += da;
            }
            (Some(da), Some(db)) if db < da => {
                push_merged(&mut spans, ChangeType::Added, i..i, j..j + db);
                j += db;
            }
            (None, Some(db)) => {
                push_merged(&mut spans, ChangeType::Added, i..i, j..j + db);
                j += db;
            }
            _ => {
                let mut k = 1;
                while k < max_span && i + k < a.len() && j + k < b.len() && a[i + k] != b[j + k] {
                    k += 1;
                }
                spans.push(Span {
                    change: ChangeType::Modified,
                    base: i..i + k,
                    compare: j..j + k,
                });
                i += k;
                j += k;
            }
        }
    }

    if i < a.len() {
        push_merged(&mut spans, ChangeType::Deleted, i..a.len(), j..j);
    }
    if j < b.len() {
        push_merged(&mut spans, ChangeType::Added, a.len()..a.len(), j..b.len());
    }
    spans
}

/// Append a span, extending the previous one when it is the same kind of
/// change and directly adjacent.
fn push_merged(spans: &mut Vec<Span>, change: ChangeType, base: Range<usize>, compare: Range<usize>) {
    if let Some(last) = spans.last_mut() {
        let adjacent = match change {
            ChangeType::Added => last.base == base && last.compare.end == compare.start,
            ChangeType::Deleted => last.compare == compare && last.base.end == base.start,
            ChangeType::Modified => false,
        };
        if last.change == change && adjacent {
            last.base.end = base.end;
            last.compare.end = compare.end;
            return;
        }
    }
    spans.push(Span {
        change,
        base,
        compare,
    });
}
