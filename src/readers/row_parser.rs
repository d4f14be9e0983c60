use crate::error::{ProcessingError, Result};
use crate::models::{StationRecord, StationTable};
use crate::utils::constants::{FIELD_SEPARATOR, LINE_TERMINATOR};
use std::hash::BuildHasher;

/// Lazy iterator over the `name;value` rows of a line-aligned chunk.
///
/// Names are borrowed from the chunk. The final row may end at the end of
/// the slice instead of a newline. After the first error the iterator is
/// fused and yields nothing more.
pub struct RowParser<'a> {
    data: &'a [u8],
    position: usize,
    failed: bool,
}

impl<'a> RowParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            failed: false,
        }
    }

    /// Byte offset of the next unparsed row within the chunk
    pub fn position(&self) -> usize {
        self.position
    }

    fn parse_next(&mut self) -> Result<StationRecord<'a>> {
        let start = self.position;
        let rest = &self.data[start..];

        let separator = match rest.iter().position(|&b| b == FIELD_SEPARATOR) {
            Some(index) => index,
            None => return Err(self.fault(start, "missing ';' separator")),
        };
        let name = &rest[..separator];
        if name.is_empty() {
            return Err(self.fault(start, "empty station name"));
        }
        if name.contains(&LINE_TERMINATOR) {
            return Err(self.fault(start, "missing ';' separator"));
        }

        let (value, consumed) = match parse_tenths(&rest[separator + 1..]) {
            Some(parsed) => parsed,
            None => return Err(self.fault(start, "value is not of the form -?D{1,2}.D")),
        };

        let mut end = start + separator + 1 + consumed;
        match self.data.get(end) {
            Some(&LINE_TERMINATOR) => end += 1,
            None => {}
            Some(_) => return Err(self.fault(start, "trailing bytes after value")),
        }

        self.position = end;
        Ok(StationRecord::new(name, value))
    }

    fn fault(&self, start: usize, reason: &'static str) -> ProcessingError {
        let rest = &self.data[start..];
        let line_end = rest
            .iter()
            .position(|&b| b == LINE_TERMINATOR)
            .unwrap_or(rest.len());
        ProcessingError::malformed(start, &rest[..line_end], reason)
    }
}

impl<'a> Iterator for RowParser<'a> {
    type Item = Result<StationRecord<'a>>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.data.len() {
            return None;
        }

        let parsed = self.parse_next();
        if parsed.is_err() {
            self.failed = true;
        }
        Some(parsed)
    }
}

impl std::iter::FusedIterator for RowParser<'_> {}

/// Decode a fixed-point `-?D{1,2}.D` value into tenths.
///
/// Returns the value and the number of bytes consumed, not counting the line
/// terminator. No float or temporary string is built.
#[inline]
pub fn parse_tenths(bytes: &[u8]) -> Option<(i32, usize)> {
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        _ => (false, bytes),
    };
    let sign_len = usize::from(negative);

    let digit = |index: usize| -> Option<i32> {
        match digits.get(index) {
            Some(&b) if b.is_ascii_digit() => Some(i32::from(b - b'0')),
            _ => None,
        }
    };

    let (magnitude, len) = match digits.get(1) {
        // D.D
        Some(b'.') => (digit(0)? * 10 + digit(2)?, 3),
        // DD.D
        _ if digits.get(2) == Some(&b'.') => {
            (digit(0)? * 100 + digit(1)? * 10 + digit(3)?, 4)
        }
        _ => return None,
    };

    let value = if negative { -magnitude } else { magnitude };
    Some((value, sign_len + len))
}

/// Parse a whole chunk into `table`, returning the number of rows seen.
pub fn parse_chunk_into<S: BuildHasher>(chunk: &[u8], table: &mut StationTable<S>) -> Result<u64> {
    let mut parser = RowParser::new(chunk);
    let mut rows = 0;
    loop {
        let offset = parser.position();
        match parser.next() {
            Some(record) => {
                table.observe(record?, offset)?;
                rows += 1;
            }
            None => break,
        }
    }
    Ok(rows)
}
