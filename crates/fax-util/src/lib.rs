//! Shared span, source-map and diagnostic plumbing used by the scanner,
//! compiler and driver.

mod diagnostic;
mod index_vec;
mod span;

pub use diagnostic::{Diagnostic, DiagnosticBuilder, Handler, Level, Location};
pub use index_vec::{Idx, IndexVec};
pub use span::{FileId, SourceFile, SourceMap, Span};
