use crate::moves::Move;

/// Opening book lookup. The engine only consumes this seam; book storage and
/// parsing live outside the search core.
pub trait OpeningBook: Send {
    /// A book move for the position, or None when out of book.
    fn probe(&mut self, fen: &str) -> Option<Move>;
}

/// A book that knows nothing, for configurations without one.
pub struct NoBook;

impl OpeningBook for NoBook {
    fn probe(&mut self, _fen: &str) -> Option<Move> {
        None
    }
}
