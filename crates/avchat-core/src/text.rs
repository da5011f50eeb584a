//! Text handling for chat input and speech output.
//!
//! Sanitizes user input, strips retrieval citation markers, removes
//! markdown before synthesis, and segments streamed responses into
//! sentence-sized speech units.

/// Longest user message accepted, in characters.
pub const MAX_INPUT_CHARS: usize = 5000;

/// Sentence terminators, ASCII and full-width.
const TERMINATORS: &[char] = &['.', '?', '!', ':', ';', '。', '？', '！', '：', '；'];

/// Clean up raw user input.
///
/// Removes control characters other than newline and tab, trims, and caps
/// the result at [`MAX_INPUT_CHARS`] characters.
#[must_use]
pub fn sanitize_input(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|&c| !c.is_control() || c == '\n' || c == '\t')
        .collect();
    let capped: String = cleaned.trim().chars().take(MAX_INPUT_CHARS).collect();
    capped.trim_end().to_string()
}

/// Remove `[docN]` citation markers inserted by grounded responses.
#[must_use]
pub fn strip_citations(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("[doc") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 4..];
        let digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 && after[digits..].starts_with(']') {
            rest = &after[digits + 1..];
        } else {
            result.push_str("[doc");
            rest = after;
        }
    }
    result.push_str(rest);
    result
}

/// Length of a trailing prefix that could still grow into a citation marker.
///
/// Streamed fragments can split `[doc12]` anywhere, so callers hold this
/// many trailing bytes back until the next fragment arrives.
#[must_use]
pub fn partial_citation_len(text: &str) -> usize {
    let Some(start) = text.rfind('[') else {
        return 0;
    };
    let tail = &text[start..];
    let could_continue = if tail.len() <= 4 {
        "[doc".starts_with(tail)
    } else {
        tail.starts_with("[doc") && tail[4..].chars().all(|c| c.is_ascii_digit())
    };
    if could_continue { tail.len() } else { 0 }
}

/// Strip markdown from one speech unit so formatting is not read aloud.
///
/// Fence and rule lines are dropped, block markers removed, link targets
/// replaced by their labels. Lines are joined with single spaces.
#[must_use]
pub fn speakable(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    for line in text.lines().map(str::trim) {
        if line.starts_with("```") || is_rule(line) {
            continue;
        }
        push_plain(strip_block_marker(line), &mut plain);
        plain.push(' ');
    }
    plain.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Segmentation limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmenterConfig {
    /// Units shorter than this are carried into the next one.
    pub min_chars: usize,
    /// Buffers longer than this without a boundary are split at a space.
    pub max_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_chars: 8,
            max_chars: 400,
        }
    }
}

/// Incremental sentence segmenter for streamed responses.
///
/// A unit ends at a terminator or newline followed by whitespace or the end
/// of the buffer.
#[derive(Debug, Default)]
pub struct SentenceSegmenter {
    buffer: String,
    config: SegmenterConfig,
}

impl SentenceSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            buffer: String::new(),
            config,
        }
    }

    /// Append a fragment and return every unit it completed.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.buffer.push_str(fragment);

        let mut units = Vec::new();
        while let Some(end) = self.next_boundary() {
            let unit: String = self.buffer.drain(..end).collect();
            let unit = unit.trim();
            if !unit.is_empty() {
                units.push(unit.to_string());
            }
        }
        units
    }

    /// Return whatever is left once the response has ended.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }

    /// Text buffered but not yet emitted.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Byte offset just past the next unit, if one is complete.
    fn next_boundary(&self) -> Option<usize> {
        let mut chars = self.buffer.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            let at_boundary = c == '\n'
                || (TERMINATORS.contains(&c)
                    && chars.peek().is_none_or(|&(_, next)| next.is_whitespace()));
            if !at_boundary {
                continue;
            }
            let end = i + c.len_utf8();
            if self.buffer[..end].trim().chars().count() >= self.config.min_chars {
                return Some(end);
            }
        }

        self.overflow_split()
    }

    /// Split point for a buffer that grew past `max_chars` with no boundary.
    fn overflow_split(&self) -> Option<usize> {
        let (limit, next) = self.buffer.char_indices().nth(self.config.max_chars)?;
        if next.is_whitespace() {
            return Some(limit + next.len_utf8());
        }
        let head = &self.buffer[..limit];
        match head.char_indices().rev().find(|&(_, c)| c.is_whitespace()) {
            Some((space, c)) if space > 0 => Some(space + c.len_utf8()),
            _ => Some(limit),
        }
    }
}

/// Segment a complete response into speech units.
#[must_use]
pub fn split_units(text: &str, config: SegmenterConfig) -> Vec<String> {
    let mut segmenter = SentenceSegmenter::new(config);
    let mut units = segmenter.push(text);
    units.extend(segmenter.finish());
    units
}

// ── Internal helpers ───────────────────────────────────────────────

/// `---`, `***` or `___`, spaces allowed.
fn is_rule(line: &str) -> bool {
    let marks: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && marks
            .chars()
            .next()
            .is_some_and(|first| matches!(first, '-' | '*' | '_') && marks.chars().all(|c| c == first))
}

/// Quote, heading, bullet and ordinal markers at the start of a line.
fn strip_block_marker(line: &str) -> &str {
    let line = line.trim_start_matches(['>', '#', ' ']);
    if let Some(rest) = line
        .strip_prefix(['-', '*', '+'])
        .and_then(|rest| rest.strip_prefix(' '))
    {
        return rest;
    }
    let after_digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if after_digits.len() < line.len() {
        if let Some(rest) = after_digits
            .strip_prefix(['.', ')'])
            .and_then(|rest| rest.strip_prefix(' '))
        {
            return rest;
        }
    }
    line
}

/// Append `text` without emphasis, code ticks or link targets.
fn push_plain(text: &str, out: &mut String) {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' | '`' | '~' => {}
            '_' if chars.next_if_eq(&'_').is_some() => {}
            '[' => {
                let label: String = chars.by_ref().take_while(|&c| c != ']').collect();
                if chars.next_if_eq(&'(').is_some() {
                    chars.by_ref().take_while(|&c| c != ')').for_each(drop);
                    push_plain(&label, out);
                } else {
                    out.push('[');
                    out.push_str(&label);
                    out.push(']');
                }
            }
            _ => out.push(c),
        }
    }
}
