// The contents of these modules are written by build.rs.
mod lookup_tables;
mod zobrist;

pub use lookup_tables::*;
pub use zobrist::*;
