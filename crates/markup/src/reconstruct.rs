use memchr::memmem::Finder;
use thiserror::Error;

use crate::range::{SyntaxLine, SyntaxRange};
use crate::unescape::decoded_count;

/// Prefix of an opening tag emitted by the highlighting engine.
const OPEN_PREFIX: &str = "<span class=\"";
/// Terminator of an opening tag, directly after the class attribute value.
const OPEN_SUFFIX: &str = "\">";
/// Closing tag emitted by the highlighting engine.
const CLOSE_TAG: &str = "</span>";

/// Markup that violates the highlighter's balanced-tag contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
	/// A span was opened but never closed anywhere in the remaining input.
	#[error("span of class {class_name:?} opened on line {line} is never closed")]
	UnclosedSpan { line: usize, class_name: String },
	/// A closing tag appeared while no span was open.
	#[error("closing tag on line {line} with no open span")]
	UnmatchedClosingTag { line: usize },
}

/// The earliest tag in the unscanned remainder of a line.
enum Tag<'a> {
	Open { start: usize, end: usize, class: &'a str },
	Close { start: usize },
}

/// One span opened but not yet closed: where its range lives in the current
/// line's output, and the line it originally opened on.
struct OpenSpan {
	range: usize,
	opened_line: usize,
}

/// Reconstructs per-line highlight ranges from one highlighter markup string.
///
/// The input is split on `\n` exactly as the source text was split before
/// highlighting; each output [`SyntaxLine`] describes the corresponding
/// source line with all markup stripped and entity escapes decoded. A span
/// whose closing tag lies on a later line extends to the end of each line it
/// crosses and restarts at offset 0 on the next.
///
/// Offsets count Unicode scalar values of the decoded plain text. Tags are
/// located in the raw markup only, where literal `<` in content is always
/// entity-escaped, so decoded text that happens to look like a tag is never
/// reinterpreted.
pub fn ranges_from_markup(markup: &str) -> Result<Vec<SyntaxLine>, MarkupError> {
	let open_finder = Finder::new(OPEN_PREFIX);
	let close_finder = Finder::new(CLOSE_TAG);

	let mut lines = Vec::new();
	// Classes still open at the end of the previous line, outermost first,
	// with the line each originally opened on.
	let mut carried: Vec<(String, usize)> = Vec::new();

	for (line_no, raw) in markup.split('\n').enumerate() {
		let mut line = SyntaxLine::default();
		let mut open: Vec<OpenSpan> = Vec::new();
		for (class_name, opened_line) in carried.drain(..) {
			open.push(OpenSpan {
				range: line.ranges.len(),
				opened_line,
			});
			line.ranges.push(SyntaxRange::new(0, 0, class_name));
		}

		// Byte cursor into the raw markup line; char offset into its
		// decoded plain text. The cursor only moves forward, so stripped
		// tag text is never rescanned.
		let mut cursor = 0usize;
		let mut offset = 0usize;
		while let Some(tag) = next_tag(&open_finder, &close_finder, raw, cursor) {
			match tag {
				Tag::Open { start, end, class } => {
					offset += decoded_count(&raw[cursor..start]);
					open.push(OpenSpan {
						range: line.ranges.len(),
						opened_line: line_no,
					});
					line.ranges.push(SyntaxRange::new(offset, 0, class));
					cursor = end;
				}
				Tag::Close { start } => {
					offset += decoded_count(&raw[cursor..start]);
					let span = open.pop().ok_or(MarkupError::UnmatchedClosingTag { line: line_no })?;
					let range = &mut line.ranges[span.range];
					range.length = offset - range.start;
					cursor = start + CLOSE_TAG.len();
				}
			}
		}
		offset += decoded_count(&raw[cursor..]);

		// Spans still open extend to the end of this line and carry over.
		for span in &open {
			let range = &mut line.ranges[span.range];
			range.length = offset - range.start;
			carried.push((range.class_name.clone(), span.opened_line));
		}
		lines.push(line);
	}

	if let Some((class_name, line)) = carried.into_iter().next() {
		return Err(MarkupError::UnclosedSpan { line, class_name });
	}
	Ok(lines)
}

/// Locates the earliest tag at or after `from`: whichever pattern's match
/// starts at the lower offset wins (the two patterns cannot start at the
/// same offset).
fn next_tag<'a>(open_finder: &Finder<'_>, close_finder: &Finder<'_>, raw: &'a str, from: usize) -> Option<Tag<'a>> {
	let open = find_open(open_finder, raw, from);
	let close = close_finder.find(raw[from..].as_bytes()).map(|rel| from + rel);
	match (open, close) {
		(Some((start, _, _)), Some(close_start)) if close_start < start => Some(Tag::Close { start: close_start }),
		(Some((start, end, class)), _) => Some(Tag::Open { start, end, class }),
		(None, close) => close.map(|start| Tag::Close { start }),
	}
}

/// Finds the first well-formed opening tag at or after `from`, returning its
/// byte range and class name.
///
/// A candidate `<span class="` whose class attribute never terminates in
/// `">` is not a tag; the search resumes past it, matching the semantics of
/// an anchored `<span class="([^"]*)">` pattern.
fn find_open<'a>(finder: &Finder<'_>, raw: &'a str, from: usize) -> Option<(usize, usize, &'a str)> {
	let mut search = from;
	while let Some(rel) = finder.find(raw[search..].as_bytes()) {
		let start = search + rel;
		let class_start = start + OPEN_PREFIX.len();
		let quote = raw[class_start..].find('"')?;
		let class_end = class_start + quote;
		if raw[class_end..].starts_with(OPEN_SUFFIX) {
			return Some((start, class_end + OPEN_SUFFIX.len(), &raw[class_start..class_end]));
		}
		search = start + 1;
	}
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	fn range(start: usize, length: usize, class_name: &str) -> SyntaxRange {
		SyntaxRange::new(start, length, class_name)
	}

	#[test]
	fn single_line_single_span() {
		let lines = ranges_from_markup("asdf<span class=\"c\">qwer</span>asdf").unwrap();
		assert_eq!(lines.len(), 1);
		assert_eq!(lines[0].ranges, vec![range(4, 4, "c")]);
	}

	#[test]
	fn nested_spans_outer_before_inner() {
		let lines = ranges_from_markup("asdf<span class=\"c\">qwer<span class=\"d\">zxcv</span>qwer</span>asdf").unwrap();
		assert_eq!(lines[0].ranges, vec![range(4, 12, "c"), range(8, 4, "d")]);
	}

	#[test]
	fn span_crossing_a_line_boundary() {
		let lines = ranges_from_markup("asdf<span class=\"c\">qwer\nasdf</span>qwer").unwrap();
		assert_eq!(lines.len(), 2);
		assert_eq!(lines[0].ranges, vec![range(4, 4, "c")]);
		assert_eq!(lines[1].ranges, vec![range(0, 4, "c")]);
	}

	#[test]
	fn span_crossing_several_lines() {
		let lines = ranges_from_markup("a<span class=\"c\">b\nwhole line\ncd</span>").unwrap();
		assert_eq!(lines.len(), 3);
		assert_eq!(lines[0].ranges, vec![range(1, 1, "c")]);
		assert_eq!(lines[1].ranges, vec![range(0, 10, "c")]);
		assert_eq!(lines[2].ranges, vec![range(0, 2, "c")]);
	}

	#[test]
	fn unclosed_span_is_fatal() {
		let err = ranges_from_markup("asdf<span class=\"c\">qwer\nmore text").unwrap_err();
		assert_eq!(
			err,
			MarkupError::UnclosedSpan {
				line: 0,
				class_name: "c".to_string(),
			}
		);
	}

	#[test]
	fn unmatched_closing_tag_is_fatal() {
		let err = ranges_from_markup("line one\nqwer</span>").unwrap_err();
		assert_eq!(err, MarkupError::UnmatchedClosingTag { line: 1 });
	}

	#[test]
	fn empty_input_yields_one_empty_line() {
		let lines = ranges_from_markup("").unwrap();
		assert_eq!(lines.len(), 1);
		assert!(lines[0].ranges.is_empty());
	}

	#[test]
	fn line_without_tags_has_no_ranges() {
		let lines = ranges_from_markup("plain text\nmore plain text").unwrap();
		assert_eq!(lines.len(), 2);
		assert!(lines[0].ranges.is_empty());
		assert!(lines[1].ranges.is_empty());
	}

	#[test]
	fn nested_same_class_spans_stay_distinct() {
		let lines = ranges_from_markup("<span class=\"c\">ab<span class=\"c\">cd</span>ef</span>").unwrap();
		assert_eq!(lines[0].ranges, vec![range(0, 6, "c"), range(2, 2, "c")]);
	}

	#[test]
	fn sibling_spans_left_to_right() {
		let lines = ranges_from_markup("<span class=\"a\">xx</span>-<span class=\"b\">yy</span>").unwrap();
		assert_eq!(lines[0].ranges, vec![range(0, 2, "a"), range(3, 2, "b")]);
	}

	#[test]
	fn entity_decoding_shifts_offsets() {
		// Plain text is `a&b<c>` before the span opens.
		let lines = ranges_from_markup("a&amp;b&lt;c&gt;<span class=\"k\">&quot;s&#x27;</span>").unwrap();
		assert_eq!(lines[0].ranges, vec![range(6, 3, "k")]);
	}

	#[test]
	fn decoded_tag_text_is_not_reinterpreted() {
		// Content is the literal text `</span>` followed by `<span class="x">`,
		// entity-escaped by the engine. Neither may act as markup.
		let markup = "&lt;/span&gt;<span class=\"k\">&lt;span class=&quot;x&quot;&gt;</span>";
		let lines = ranges_from_markup(markup).unwrap();
		assert_eq!(lines[0].ranges, vec![range(7, 16, "k")]);
	}

	#[test]
	fn multibyte_content_counts_characters() {
		let lines = ranges_from_markup("na\u{1f4a2}ti<span class=\"c\">x</span>").unwrap();
		assert_eq!(lines[0].ranges, vec![range(5, 1, "c")]);
	}

	#[test]
	fn incomplete_opening_tag_is_content() {
		// `class=` without a quote never matches the opening pattern.
		let lines = ranges_from_markup("a <span class=b c").unwrap();
		assert!(lines[0].ranges.is_empty());
	}

	#[test]
	fn carried_span_closing_mid_line_nests_with_new_spans() {
		let markup = "<span class=\"outer\">a\nbc</span> <span class=\"next\">d</span>";
		let lines = ranges_from_markup(markup).unwrap();
		assert_eq!(lines[0].ranges, vec![range(0, 1, "outer")]);
		assert_eq!(lines[1].ranges, vec![range(0, 2, "outer"), range(3, 1, "next")]);
	}

	#[test]
	fn balanced_fragments_round_trip() {
		// Wrap known fragments, then check every range projects back onto
		// the plain text it was wrapped around.
		let markup = "fn <span class=\"kw\">main</span>() {\n\t<span class=\"call\">println!</span>(<span class=\"str\">&quot;hi&quot;</span>);\n}";
		let plain = ["fn main() {", "\tprintln!(\"hi\");", "}"];
		let lines = ranges_from_markup(markup).unwrap();
		assert_eq!(lines.len(), 3);
		let expected = [vec![range(3, 4, "kw")], vec![range(1, 8, "call"), range(10, 4, "str")], vec![]];
		for (line, expected) in lines.iter().zip(expected) {
			assert_eq!(line.ranges, expected);
		}
		for (line, text) in lines.iter().zip(plain) {
			for r in &line.ranges {
				assert!(r.start + r.length <= text.chars().count());
			}
		}
	}
}
