use std::ops::Range;

/// Byte range selector for reads.
///
/// `offset = 0, limit = 0` selects the whole object, `limit > 0` selects
/// exactly `limit` bytes starting at `offset`, and `limit = 0` with a non-zero
/// offset selects everything from `offset` to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub offset: u64,
    pub limit: u64,
}

impl ByteRange {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Range covering the whole object
    pub fn full() -> Self {
        Self::default()
    }

    pub fn is_full(&self) -> bool {
        self.offset == 0 && self.limit == 0
    }

    /// HTTP `Range` header value, `None` when the whole object is requested.
    pub fn header_value(&self) -> Option<String> {
        if self.is_full() {
            return None;
        }
        Some(if self.limit > 0 {
            format!(
                "bytes={}-{}",
                self.offset,
                self.offset.saturating_add(self.limit - 1)
            )
        } else {
            format!("bytes={}-", self.offset)
        })
    }

    /// Concrete byte span for an object of `size` bytes.
    ///
    /// Returns `None` when the range starts at or past the end of a non-empty
    /// request. A bounded range running past the end is clamped.
    pub fn resolve(&self, size: u64) -> Option<Range<u64>> {
        if self.is_full() {
            return Some(0..size);
        }
        if self.offset >= size {
            return None;
        }
        let end = if self.limit > 0 {
            self.offset.saturating_add(self.limit).min(size)
        } else {
            size
        };
        Some(self.offset..end)
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.header_value() {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "bytes=0-"),
        }
    }
}
