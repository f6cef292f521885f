//! Reconstruction of per-line highlight ranges from highlighter markup.
//!
//! Syntax highlighting engines emit one HTML-ish string for a whole payload:
//! `<span class="...">`/`</span>` pairs around tokens, entity-escaped text,
//! possibly spanning multiple newline-delimited lines. Line-based renderers
//! want none of that. They want, per source line, the character ranges each
//! style class covers; [`ranges_from_markup`] performs that conversion.

mod range;
mod reconstruct;
mod unescape;

pub use range::{SyntaxLine, SyntaxRange};
pub use reconstruct::{MarkupError, ranges_from_markup};
pub use unescape::unescape;
