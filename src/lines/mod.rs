//! Line counting and character-offset ⇄ line-number mapping.
//!
//! Offsets are counted in characters (Unicode scalar values), never bytes.
//! Only `\n` terminates a line; a `\r\n` pair is one break.

/// Minimum number of digit cells reserved in the line-number gutter.
pub const GUTTER_MIN_DIGITS: i32 = 3;
/// Margin cells added around the digits (one each side).
pub const GUTTER_MARGIN: i32 = 2;
/// Glyph width used when the caller passes a non-positive one.
pub const DEFAULT_GLYPH_WIDTH: i32 = 8;

/// Number of lines in `text`: `\n` count + 1.  Empty text is one line.
pub fn count_lines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count() + 1
}

/// Character offset of the first character of zero-based `line`.
///
/// A line past the end yields the text's character length.
pub fn line_start_offset(text: &str, line: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let mut current = 0usize;
    let mut pos     = 0usize;
    for c in text.chars() {
        pos += 1;
        if c == '\n' {
            current += 1;
            if current == line {
                return pos;
            }
        }
    }
    pos
}

/// Zero-based line containing character `offset`.  Negative offsets map to
/// line 0; offsets past the end map to the last line.
pub fn line_of_offset(text: &str, offset: i64) -> usize {
    let Ok(offset) = usize::try_from(offset) else {
        return 0;
    };
    text.chars().take(offset).filter(|&c| c == '\n').count()
}

/// Gutter width in pixels for `line_count` lines drawn with `glyph_width`
/// pixel glyphs.  Non-positive inputs fall back to one line and
/// [`DEFAULT_GLYPH_WIDTH`].
pub fn required_gutter_width(line_count: i32, glyph_width: i32) -> i32 {
    let line_count  = if line_count  <= 0 { 1 } else { line_count };
    let glyph_width = if glyph_width <= 0 { DEFAULT_GLYPH_WIDTH } else { glyph_width };

    let mut digits = 1;
    let mut rest   = line_count;
    while rest >= 10 {
        digits += 1;
        rest   /= 10;
    }
    (digits.max(GUTTER_MIN_DIGITS) + GUTTER_MARGIN).saturating_mul(glyph_width)
}

// ── LineIndex ────────────────────────────────────────────────────────────────

/// Precomputed line-start table for repeated lookups over one buffer.
///
/// Answers exactly what the free functions answer, in `O(log n)`.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts:    Vec<usize>,
    char_len:  usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts   = vec![0usize];
        let mut char_len = 0usize;
        for c in text.chars() {
            char_len += 1;
            if c == '\n' {
                starts.push(char_len);
            }
        }
        Self { starts, char_len }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Character length of the indexed text.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    pub fn line_start(&self, line: usize) -> usize {
        self.starts.get(line).copied().unwrap_or(self.char_len)
    }

    pub fn line_of(&self, offset: i64) -> usize {
        let Ok(offset) = usize::try_from(offset) else {
            return 0;
        };
        self.starts.partition_point(|&s| s <= offset) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Line1\nLine2\nLine3";

    #[test]
    fn counts() {
        assert_eq!(count_lines(""), 1);
        assert_eq!(count_lines("Hello World"), 1);
        assert_eq!(count_lines(SAMPLE), 3);
        assert_eq!(count_lines("Line1\nLine2\n"), 3);
        assert_eq!(count_lines("\n\n\n"), 4);
        assert_eq!(count_lines("Line1\r\nLine2\r\nLine3"), 3);
    }

    #[test]
    fn line_starts() {
        assert_eq!(line_start_offset(SAMPLE, 0), 0);
        assert_eq!(line_start_offset(SAMPLE, 1), 6);
        assert_eq!(line_start_offset(SAMPLE, 2), 12);
        assert_eq!(line_start_offset("Line1\nLine2", 10), 11);
        assert_eq!(line_start_offset("\n\n\n", 1), 1);
        assert_eq!(line_start_offset("\n\n\n", 2), 2);
    }

    #[test]
    fn offsets_to_lines() {
        assert_eq!(line_of_offset(SAMPLE, 0), 0);
        assert_eq!(line_of_offset(SAMPLE, 3), 0);
        assert_eq!(line_of_offset(SAMPLE, 6), 1);
        assert_eq!(line_of_offset(SAMPLE, 10), 1);
        assert_eq!(line_of_offset(SAMPLE, 12), 2);
        assert_eq!(line_of_offset("Test", -1), 0);
        assert_eq!(line_of_offset("", 5), 0);
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let text = "中文\n第二行";
        assert_eq!(line_start_offset(text, 1), 3);
        assert_eq!(line_of_offset(text, 3), 1);
        assert_eq!(line_of_offset(text, 2), 0);
    }

    #[test]
    fn gutter_width() {
        assert_eq!(required_gutter_width(10, 8), 40);
        assert_eq!(required_gutter_width(10_000, 8), 56);
        assert_eq!(required_gutter_width(0, 8), 40);
        assert_eq!(required_gutter_width(100, 0), 40);
        assert_eq!(required_gutter_width(-3, -1), 40);
    }

    #[test]
    fn index_agrees_with_free_functions() {
        for text in ["", SAMPLE, "\n\n\n", "a\r\nb\n", "中文\n第二行\n"] {
            let idx = LineIndex::new(text);
            assert_eq!(idx.line_count(), count_lines(text));
            for line in 0..idx.line_count() + 2 {
                assert_eq!(idx.line_start(line), line_start_offset(text, line), "{text:?} line {line}");
            }
            for off in -2..(idx.char_len() as i64 + 2) {
                assert_eq!(idx.line_of(off), line_of_offset(text, off), "{text:?} offset {off}");
            }
        }
    }
}
