use serde::{Deserialize, Serialize};

/// One highlighted token occurrence on one line.
///
/// Offsets index the line's plain text (tags stripped, entity escapes
/// decoded) and are counted in Unicode scalar values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxRange {
	/// 0-based inclusive start offset into the line's plain text.
	pub start: usize,
	/// Number of characters covered.
	pub length: usize,
	/// Style class assigned by the highlighter (e.g. `"keyword"`). Free-form.
	pub class_name: String,
}

impl SyntaxRange {
	/// Creates a range covering `[start, start + length)`.
	pub fn new(start: usize, length: usize, class_name: impl Into<String>) -> Self {
		Self {
			start,
			length,
			class_name: class_name.into(),
		}
	}
}

/// Ordered highlight ranges for exactly one source line.
///
/// Ranges may nest (inner fully contained in outer) but never partially
/// overlap. Order is insertion order: outer before inner for nested spans,
/// left to right across siblings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxLine {
	pub ranges: Vec<SyntaxRange>,
}
