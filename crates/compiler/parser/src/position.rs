//! Source positions.
//!
//! Positions are carried as a single packed `u64`: the line lives in the high
//! bits and the character offset in the low 22 bits. Lines are zero-based and
//! characters count Unicode scalar values from the start of the line.

/// A `(line, character)` pair packed as `(line << 22) | character`.
pub type PackedPosition = u64;

const CHARACTER_BITS: u32 = 22;
const CHARACTER_MASK: u64 = (1 << CHARACTER_BITS) - 1;
const LINE_MASK: u64 = (1 << 30) - 1;

/// Packs a zero-based line and character into a [`PackedPosition`].
///
/// Lines beyond `2^30` and characters beyond `2^22` are truncated.
pub const fn pack_position(line: u32, character: u32) -> PackedPosition {
    ((line as u64 & LINE_MASK) << CHARACTER_BITS) | (character as u64 & CHARACTER_MASK)
}

/// Splits a [`PackedPosition`] back into `(line, character)`.
pub const fn unpack_position(position: PackedPosition) -> (u32, u32) {
    (
        ((position >> CHARACTER_BITS) & LINE_MASK) as u32,
        (position & CHARACTER_MASK) as u32,
    )
}

/// Maps byte offsets of a source text to packed line/character positions.
///
/// `\n`, `\r\n` and a lone `\r` each end a line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut line_starts = vec![0];
        let mut offset = 0;
        while offset < bytes.len() {
            match bytes[offset] {
                b'\r' if bytes.get(offset + 1) == Some(&b'\n') => {
                    offset += 2;
                    line_starts.push(offset);
                }
                b'\r' | b'\n' => {
                    offset += 1;
                    line_starts.push(offset);
                }
                _ => offset += 1,
            }
        }
        Self { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset at which `line` starts, if the line exists.
    pub fn line_start(&self, line: u32) -> Option<usize> {
        self.line_starts.get(line as usize).copied()
    }

    /// Packed position of `offset` in `source`.
    ///
    /// `source` must be the text this index was built from. Offsets past the end
    /// are clamped to the end of the text.
    pub fn position(&self, source: &str, offset: usize) -> PackedPosition {
        let offset = offset.min(source.len());
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line];
        let character = match source.get(line_start..offset) {
            Some(text) => text.chars().count(),
            None => offset - line_start,
        };
        pack_position(line as u32, character as u32)
    }

    /// Byte offset of a packed position in `source`, clamped to the line end.
    pub fn offset(&self, source: &str, position: PackedPosition) -> usize {
        let (line, character) = unpack_position(position);
        let Some(start) = self.line_start(line) else {
            return source.len();
        };
        let line_end = self
            .line_start(line + 1)
            .unwrap_or(source.len())
            .min(source.len());
        source[start..line_end]
            .char_indices()
            .nth(character as usize)
            .map_or(line_end, |(index, _)| start + index)
    }
}
