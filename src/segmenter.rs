//! Incremental sentence segmentation
//!
//! Turns a stream of arbitrarily split text fragments into speakable
//! sentence units as early as possible. A unit ends at the first `.`, `!`
//! or `?` that is followed by whitespace or by the end of the buffered text.

#[cfg(test)]
mod proptests;

/// A complete, speakable piece of a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceUnit {
    pub text: String,
    /// Always true: units are never emitted as partial speech
    pub last: bool,
}

impl SentenceUnit {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            last: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Buffers fragments of one completion and cuts them into sentence units.
///
/// One instance per streamed reply. The buffer only ever holds the
/// unconsumed suffix of the reply, and `scanned` remembers how far into that
/// suffix we already looked so confirmed text is never inspected twice.
#[derive(Debug, Default)]
pub struct SentenceSegmenter {
    buffer: String,
    scanned: usize,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and drain every sentence it completes.
    pub fn feed(&mut self, chunk: &str) -> Vec<SentenceUnit> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.buffer.push_str(chunk);

        let mut units = Vec::new();
        while let Some(end) = self.next_boundary() {
            let rest = self.buffer.split_off(end);
            let sentence = std::mem::replace(&mut self.buffer, rest);
            self.scanned = 0;
            units.push(SentenceUnit::new(sentence));
        }
        units
    }

    /// Flush whatever is left once the source stream has ended.
    pub fn finish(&mut self) -> Option<SentenceUnit> {
        let remaining = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if remaining.trim().is_empty() {
            None
        } else {
            Some(SentenceUnit::new(remaining))
        }
    }

    /// Text waiting for a boundary
    #[allow(dead_code)] // Used by tests and diagnostics
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Byte offset just past the terminator of the first complete sentence.
    ///
    /// A terminator at offset zero never closes a unit: a sentence needs at
    /// least one character before its punctuation.
    fn next_boundary(&mut self) -> Option<usize> {
        let tail = self.buffer.get(self.scanned..).unwrap_or_default();
        let mut chars = tail.char_indices().peekable();
        while let Some((offset, c)) = chars.next() {
            let index = self.scanned + offset;
            if !is_terminator(c) || index == 0 {
                continue;
            }
            match chars.peek() {
                Some((_, next)) if next.is_whitespace() => return Some(index + c.len_utf8()),
                Some(_) => {}
                None => return Some(index + c.len_utf8()),
            }
        }
        // A terminator at the end of the buffer always closes a unit, so
        // nothing already scanned can turn into a boundary later.
        self.scanned = self.buffer.len();
        None
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}
