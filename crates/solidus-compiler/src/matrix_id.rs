//! Buffer handles used by compiled operations.

use std::fmt;

/// Where the storage behind a [`MatrixId`] lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    /// The caller-supplied parameter buffer.
    Parameters,
    /// An entry of the sequence's constant pool.
    Constant(u32),
    /// A stack or heap slot; slot 0 is the result buffer.
    Slot(u32),
}

/// An opaque reference to a buffer or to a row block of one.
///
/// Handles carry no shape: the compiler tracks shapes while planning, and
/// the runtime resolves a handle against the buffers live at that point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatrixId {
    source: Source,
    block: Option<(usize, usize)>,
}

impl MatrixId {
    /// The parameter buffer.
    #[must_use]
    pub const fn parameters() -> Self {
        Self {
            source: Source::Parameters,
            block: None,
        }
    }

    /// The result buffer.
    #[must_use]
    pub const fn result() -> Self {
        Self::slot(0)
    }

    /// A numbered slot.
    #[must_use]
    pub const fn slot(index: u32) -> Self {
        Self {
            source: Source::Slot(index),
            block: None,
        }
    }

    /// A constant pool entry.
    #[must_use]
    pub const fn constant(index: u32) -> Self {
        Self {
            source: Source::Constant(index),
            block: None,
        }
    }

    /// Returns the underlying storage.
    #[must_use]
    pub const fn source(self) -> Source {
        self.source
    }

    /// Returns `(start_row, rows)` if this handle is a row block.
    #[must_use]
    pub const fn block_range(self) -> Option<(usize, usize)> {
        self.block
    }

    /// Returns the handle of rows `start..start + rows` of this buffer.
    ///
    /// Blocks compose: a block of a block is a block of the same storage.
    #[must_use]
    pub const fn block(self, start: usize, rows: usize) -> Self {
        let block = match self.block {
            Some((offset, _)) => (offset + start, rows),
            None => (start, rows),
        };
        Self {
            source: self.source,
            block: Some(block),
        }
    }
}

impl fmt::Display for MatrixId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Source::Parameters => write!(f, "p")?,
            Source::Constant(index) => write!(f, "c{index}")?,
            Source::Slot(index) => write!(f, "m{index}")?,
        }
        if let Some((start, rows)) = self.block {
            write!(f, "[{start}..{}]", start + rows)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_compose() {
        let id = MatrixId::parameters().block(1, 3).block(1, 2);
        assert_eq!(id.block_range(), Some((2, 2)));
        assert_eq!(id.source(), Source::Parameters);
        assert_eq!(id.to_string(), "p[2..4]");
    }

    #[test]
    fn test_identity_in_keys() {
        assert_eq!(MatrixId::result(), MatrixId::slot(0));
        assert_ne!(MatrixId::slot(1), MatrixId::slot(1).block(0, 1));
        assert_eq!(MatrixId::constant(3).to_string(), "c3");
    }
}
