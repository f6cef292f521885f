use std::borrow::Cow;

/// Entity escapes produced by the highlighting engine.
const ENTITIES: [(&str, char); 5] = [
	("&amp;", '&'),
	("&lt;", '<'),
	("&gt;", '>'),
	("&quot;", '"'),
	("&#x27;", '\''),
];

/// Decodes highlighter entity escapes back into plain text.
///
/// One left-to-right pass; replacement text is never rescanned, so `&amp;lt;`
/// decodes to the literal text `&lt;` exactly once. Unknown `&...` sequences
/// pass through verbatim. Borrows the input when nothing needs decoding.
pub fn unescape(raw: &str) -> Cow<'_, str> {
	let Some(first) = raw.find('&') else {
		return Cow::Borrowed(raw);
	};
	let mut out = String::with_capacity(raw.len());
	out.push_str(&raw[..first]);
	let mut rest = &raw[first..];
	while let Some(pos) = rest.find('&') {
		out.push_str(&rest[..pos]);
		let tail = &rest[pos..];
		match ENTITIES.iter().find(|(entity, _)| tail.starts_with(entity)) {
			Some((entity, decoded)) => {
				out.push(*decoded);
				rest = &tail[entity.len()..];
			}
			None => {
				out.push('&');
				rest = &tail[1..];
			}
		}
	}
	out.push_str(rest);
	Cow::Owned(out)
}

/// Returns the character count of `raw` after entity decoding, without
/// building the decoded string.
pub(crate) fn decoded_count(raw: &str) -> usize {
	let mut count = 0usize;
	let mut rest = raw;
	while let Some(pos) = rest.find('&') {
		count += rest[..pos].chars().count();
		let tail = &rest[pos..];
		match ENTITIES.iter().find(|(entity, _)| tail.starts_with(entity)) {
			Some((entity, _)) => rest = &tail[entity.len()..],
			None => rest = &tail[1..],
		}
		count += 1;
	}
	count + rest.chars().count()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_all_five_entities() {
		assert_eq!(unescape("&amp;&lt;&gt;&quot;&#x27;"), "&<>\"'");
	}

	#[test]
	fn plain_text_is_borrowed() {
		assert!(matches!(unescape("no entities here"), Cow::Borrowed(_)));
	}

	#[test]
	fn never_double_decodes() {
		// `&amp;lt;` is the escaped form of the literal text `&lt;`.
		assert_eq!(unescape("&amp;lt;span&amp;gt;"), "&lt;span&gt;");
	}

	#[test]
	fn unknown_sequences_pass_through() {
		assert_eq!(unescape("&nbsp; & &x"), "&nbsp; & &x");
	}

	#[test]
	fn counts_match_decoded_text() {
		for raw in ["", "a&amp;b", "&lt;&lt;&gt;", "na\u{1f4a2}ti &quot;x&quot;", "&amp;lt;", "&broken"] {
			assert_eq!(decoded_count(raw), unescape(raw).chars().count(), "input {raw:?}");
		}
	}
}
