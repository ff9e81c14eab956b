use std::ops::Range;

use miette::SourceSpan;

/// Position relative to start of source.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Idx(pub u32);

/// Holds a view into a source, along with the human-facing line and column of its start.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Debug)]
pub struct Span {
    start: Idx,
    len: u32,
    /// 1-based
    line: u32,
    /// 1-based, counted in characters
    col: u32,
}

impl Span {
    pub fn new(start: Idx, len: u32, line: u32, col: u32) -> Self {
        Span {
            start,
            len,
            line,
            col,
        }
    }

    pub fn dummy() -> Self {
        Span::new(Idx(0), 0, 1, 1)
    }

    pub fn offs(&self) -> usize {
        self.start.0 as usize
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn end(&self) -> usize {
        self.offs() + self.len()
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn col(&self) -> u32 {
        self.col
    }

    pub fn as_range(&self) -> Range<usize> {
        self.offs()..self.end()
    }

    /// Span covering both `self` and `other`, keeping the position of whichever starts first.
    pub fn join(self, other: Span) -> Span {
        let (first, last) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };
        let len = last.end().max(first.end()) - first.offs();
        Span::new(first.start, len as u32, first.line, first.col)
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

impl From<Span> for Range<usize> {
    fn from(value: Span) -> Self {
        value.as_range()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_orders_spans() {
        let a = Span::new(Idx(4), 3, 1, 5);
        let b = Span::new(Idx(10), 2, 1, 11);
        let joined = b.join(a);
        assert_eq!(joined.as_range(), 4..12);
        assert_eq!(joined.col(), 5);
    }
}
