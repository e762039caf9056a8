// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Maps text-diff token ranges back to the PDF-space boxes of the runs they
// came from.

use std::ops::Range;

use docdelta_core::{Rect, TextComparisonMethod, TextRun};

/// Page text assembled from runs, remembering which characters came from
/// which run.
#[derive(Debug, Clone)]
pub struct TextLayout {
    text: String,
    /// Character range of each non-blank run within `text`, with its box.
    runs: Vec<(Range<usize>, Option<Rect>)>,
}

impl TextLayout {
    /// One run per line, trimmed, blank runs dropped. Produces the same text
    /// as `docdelta_core::artifacts::page_text`.
    pub fn new(runs: &[TextRun]) -> Self {
        let mut text = String::new();
        let mut spans = Vec::new();
        let mut cursor = 0usize;
        for run in runs {
            let fragment = run.text.trim();
            if fragment.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push('\n');
                cursor += 1;
            }
            let len = fragment.chars().count();
            text.push_str(fragment);
            spans.push((cursor..cursor + len, run.rect));
            cursor += len;
        }
        Self { text, runs: spans }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Character range of every token `tokenize(text, method)` yields, in the
    /// same order.
    pub fn token_spans(&self, method: TextComparisonMethod) -> Vec<Range<usize>> {
        let chars: Vec<char> = self.text.chars().collect();
        match method {
            TextComparisonMethod::Character => (0..chars.len()).map(|i| i..i + 1).collect(),
            TextComparisonMethod::Smart => {
                let mut spans = Vec::new();
                let mut start = None;
                for (i, ch) in chars.iter().enumerate() {
                    match (ch.is_whitespace(), start) {
                        (true, Some(s)) => {
                            spans.push(s..i);
                            start = None;
                        }
                        (false, None) => start = Some(i),
                        _ => {}
                    }
                }
                if let Some(s) = start {
                    spans.push(s..chars.len());
                }
                spans
            }
            TextComparisonMethod::Exact => {
                if chars.is_empty() {
                    return Vec::new();
                }
                let mut spans = Vec::new();
                let mut start = 0;
                for (i, ch) in chars.iter().enumerate() {
                    if *ch == '\n' {
                        spans.push(start..i);
                        start = i + 1;
                    }
                }
                spans.push(start..chars.len());
                spans
            }
        }
    }

    /// PDF-space box covering the tokens in `tokens`, or `None` when the
    /// range is empty or none of the covered runs has a box.
    ///
    /// Partially covered runs are narrowed horizontally in proportion to the
    /// characters covered.
    pub fn rect_for(&self, tokens: Range<usize>, spans: &[Range<usize>]) -> Option<Rect> {
        if tokens.is_empty() || tokens.start >= spans.len() {
            return None;
        }
        let last = tokens.end.min(spans.len()) - 1;
        let chars = spans[tokens.start].start..spans[last].end;

        let mut covered: Option<Rect> = None;
        for (run_chars, rect) in &self.runs {
            let Some(rect) = rect else { continue };
            let start = chars.start.max(run_chars.start);
            let end = chars.end.min(run_chars.end);
            if start >= end {
                continue;
            }
            let len = run_chars.len().max(1) as f64;
            let from = (start - run_chars.start) as f64 / len;
            let to = (end - run_chars.start) as f64 / len;
            let part = Rect::new(
                rect.x + rect.width * from,
                rect.y,
                rect.width * (to - from),
                rect.height,
            );
            covered = Some(match covered {
                Some(acc) => acc.union(&part),
                None => part,
            });
        }
        covered
    }
}
