//! Plain-text alternative of rendered HTML mails

use regex::{Captures, Regex};

use crate::prelude::*;

const WRAP_WIDTH: usize = 75;

fn compile(pattern: &str) -> ClResult<Regex> {
	Regex::new(pattern).map_err(|e| Error::Internal(format!("regex compilation failed: {}", e)))
}

/// Converts HTML bodies to readable text
#[derive(Debug)]
pub struct HtmlToText {
	invisible: Regex,
	line_break: Regex,
	block_end: Regex,
	tag: Regex,
	numeric_entity: Regex,
	spaces: Regex,
	blank_lines: Regex,
}

impl HtmlToText {
	pub fn new() -> ClResult<Self> {
		Ok(Self {
			invisible: compile(r"(?is)<head\b.*?</head>|<style\b.*?</style>|<script\b.*?</script>")?,
			line_break: compile(r"(?i)<br\s*/?>\n?")?,
			block_end: compile(r"(?i)</(p|div|h[1-6]|tr|li|table)>")?,
			tag: compile(r"(?s)<[^>]*>")?,
			numeric_entity: compile(r"&#(x[0-9a-fA-F]+|[0-9]+);")?,
			spaces: compile(r"[ \t\x{a0}]+")?,
			blank_lines: compile(r"\n{3,}")?,
		})
	}

	pub fn convert(&self, html: &str) -> String {
		let text = self.invisible.replace_all(html, "");
		let text = self.line_break.replace_all(&text, "\n");
		let text = self.block_end.replace_all(&text, "$0\n");
		let text = self.tag.replace_all(&text, "");
		let text = self.decode_entities(&text);

		let lines: Vec<String> = text
			.lines()
			.map(|line| self.spaces.replace_all(line.trim(), " ").into_owned())
			.collect();
		let text = lines.join("\n");
		let text = self.blank_lines.replace_all(text.trim(), "\n\n");

		text.lines().map(wrap_line).collect::<Vec<_>>().join("\n")
	}

	fn decode_entities(&self, text: &str) -> String {
		let text = self.numeric_entity.replace_all(text, |caps: &Captures| {
			let code = &caps[1];
			let value = match code.strip_prefix('x') {
				Some(hex) => u32::from_str_radix(hex, 16).ok(),
				None => code.parse().ok(),
			};
			value.and_then(char::from_u32).map_or_else(|| caps[0].to_string(), String::from)
		});

		// &amp; last, so "&amp;lt;" stays "&lt;"
		text.replace("&nbsp;", " ")
			.replace("&lt;", "<")
			.replace("&gt;", ">")
			.replace("&quot;", "\"")
			.replace("&apos;", "'")
			.replace("&amp;", "&")
	}
}

/// Break a line at spaces so no line exceeds the wrap width, unless a single
/// word is longer
fn wrap_line(line: &str) -> String {
	let mut out = String::with_capacity(line.len());
	let mut width = 0;
	for word in line.split(' ') {
		let len = word.chars().count();
		if width > 0 && width + 1 + len > WRAP_WIDTH {
			out.push('\n');
			width = 0;
		} else if width > 0 {
			out.push(' ');
			width += 1;
		}
		out.push_str(word);
		width += len;
	}
	out
}


// vim: ts=4
