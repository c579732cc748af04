//! Mail template rendering with Handlebars
//!
//! Templates live under the template directory as `<name>.html.hbs`, where
//! the name is the slash-separated logical name stored in the queue
//! (`mail/en/default`). Supports:
//! - YAML frontmatter for metadata (subject, layout, parameter schema)
//! - Layout templates for a shared mail frame
//! - Language-specific layout variants

use crate::prelude::*;
use courier_types::params::{ParamKind, TemplateParams};
use handlebars::{Handlebars, handlebars_helper};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Metadata extracted from template frontmatter
#[derive(Debug, Default, Deserialize)]
pub struct TemplateMetadata {
	/// Layout template name (e.g., "default" -> layouts/default.html.hbs)
	#[serde(default)]
	pub layout: Option<String>,
	/// Mail subject line, itself a template
	#[serde(default)]
	pub subject: Option<String>,
	/// Expected parameters: `name: kind`, optional when the kind ends with `?`
	#[serde(default)]
	pub params: BTreeMap<String, String>,
}

/// Declared parameter of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
	pub kind: ParamKind,
	pub optional: bool,
}

impl std::str::FromStr for ParamSpec {
	type Err = Error;

	fn from_str(s: &str) -> ClResult<Self> {
		let s = s.trim();
		let (kind, optional) = match s.strip_suffix('?') {
			Some(kind) => (kind, true),
			None => (s, false),
		};
		Ok(Self { kind: kind.trim().parse()?, optional })
	}
}

/// Result of template rendering
#[derive(Debug)]
pub struct RenderResult {
	/// Subject rendered from the frontmatter
	pub subject: Option<String>,
	pub html_body: String,
}

handlebars_helper!(nl2br: |text: str| {
	handlebars::html_escape(text).replace("\r\n", "\n").replace('\n', "<br />\n")
});

/// Check a logical template name before it is used as a path
///
/// Names are `/`-separated segments of `[a-z0-9_-]`.
pub fn validate_template_name(name: &str) -> ClResult<()> {
	let valid = !name.is_empty()
		&& name.split('/').all(|seg| {
			!seg.is_empty()
				&& seg.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
		});
	if valid {
		Ok(())
	} else {
		Err(Error::Render(format!("invalid template name: {:?}", name)))
	}
}

/// Language segment of a template name (`mail/fr/newmail` -> `fr`)
pub fn template_lang(name: &str) -> Option<&str> {
	let mut segments = name.split('/');
	let _ = segments.next()?;
	let lang = segments.next()?;
	segments.next().map(|_| lang)
}

/// Template engine for mail rendering
pub struct TemplateEngine {
	handlebars: Handlebars<'static>,
	/// Renders subject lines, which are headers and not HTML
	plain: Handlebars<'static>,
	template_dir: PathBuf,
}

impl std::fmt::Debug for TemplateEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TemplateEngine").field("template_dir", &self.template_dir).finish()
	}
}

impl TemplateEngine {
	pub fn new(template_dir: impl AsRef<Path>) -> Self {
		let mut handlebars = Handlebars::new();

		// Enable strict mode to catch undefined variables
		handlebars.set_strict_mode(true);
		handlebars.register_helper("nl2br", Box::new(nl2br));

		let mut plain = Handlebars::new();
		plain.set_strict_mode(true);
		plain.register_escape_fn(handlebars::no_escape);

		Self { handlebars, plain, template_dir: template_dir.as_ref().to_path_buf() }
	}

	/// Whether templates for `lang` are installed (`mail/<lang>/`)
	pub fn has_lang(&self, lang: &str) -> bool {
		validate_template_name(lang).is_ok()
			&& !lang.contains('/')
			&& self.template_dir.join("mail").join(lang).is_dir()
	}

	/// Parse YAML frontmatter from template content
	///
	/// Frontmatter is delimited by `---` at the start of the file:
	/// ```text
	/// ---
	/// layout: default
	/// subject: Mail Subject
	/// params:
	///   token: text
	/// ---
	/// Template content here...
	/// ```
	///
	/// Returns (metadata, content_without_frontmatter)
	fn parse_frontmatter(content: &str) -> ClResult<(TemplateMetadata, &str)> {
		let content = content.trim_start();

		if !content.starts_with("---") {
			return Ok((TemplateMetadata::default(), content));
		}

		let after_first = &content[3..];
		let Some(end_pos) = after_first.find("\n---") else {
			return Ok((TemplateMetadata::default(), content));
		};
		let yaml_content = &after_first[..end_pos];
		let template_content = &after_first[end_pos + 4..]; // Skip "\n---"

		let metadata = serde_yaml::from_str(yaml_content)
			.map_err(|e| Error::Render(format!("invalid template frontmatter: {}", e)))?;
		Ok((metadata, template_content.trim_start_matches('\n')))
	}

	fn load(&self, relative: &str) -> Option<String> {
		std::fs::read_to_string(self.template_dir.join(relative)).ok()
	}

	fn load_template(&self, name: &str) -> ClResult<(TemplateMetadata, String)> {
		validate_template_name(name)?;
		let content = self
			.load(&format!("{}.html.hbs", name))
			.ok_or_else(|| Error::Render(format!("template not found: {}", name)))?;
		let (metadata, body) = Self::parse_frontmatter(&content)?;
		Ok((metadata, body.to_string()))
	}

	/// Check `params` against the declared schema and build the render context
	fn bind_params(
		name: &str,
		metadata: &TemplateMetadata,
		params: &TemplateParams,
	) -> ClResult<serde_json::Map<String, serde_json::Value>> {
		let mut vars = serde_json::Map::new();
		for (key, value) in params {
			vars.insert(key.clone(), serde_json::to_value(value)?);
		}

		for (key, spec) in &metadata.params {
			let spec: ParamSpec = spec.parse().map_err(|_| {
				Error::Render(format!("template {}: invalid kind {:?} for parameter {}", name, spec, key))
			})?;
			match params.get(key) {
				Some(value) if value.kind() != spec.kind => {
					return Err(Error::Render(format!(
						"template {}: parameter {} must be {}, got {}",
						name,
						key,
						spec.kind,
						value.kind()
					)));
				}
				Some(_) => {}
				None if spec.optional => {
					vars.insert(key.clone(), serde_json::Value::Null);
				}
				None => {
					return Err(Error::Render(format!(
						"template {}: missing parameter {}",
						name, key
					)));
				}
			}
		}

		Ok(vars)
	}

	fn render_layout(
		&self,
		layout: &str,
		lang: Option<&str>,
		body: &str,
		vars: &serde_json::Map<String, serde_json::Value>,
	) -> ClResult<String> {
		validate_template_name(layout)?;

		let content = lang
			.and_then(|lang| self.load(&format!("layouts/{}.{}.html.hbs", layout, lang)))
			.or_else(|| self.load(&format!("layouts/{}.html.hbs", layout)))
			.ok_or_else(|| {
				Error::Render(format!("layout not found: {} (lang: {:?})", layout, lang))
			})?;

		let mut layout_vars = vars.clone();
		layout_vars.insert("body".into(), serde_json::Value::String(body.into()));

		self.handlebars
			.render_template(&content, &layout_vars)
			.map_err(|e| Error::Render(format!("failed to render layout '{}': {}", layout, e)))
	}

	/// Render the subject line declared in the template frontmatter
	pub fn render_subject(&self, name: &str, params: &TemplateParams) -> ClResult<Option<String>> {
		let (metadata, _) = self.load_template(name)?;
		let vars = Self::bind_params(name, &metadata, params)?;
		metadata
			.subject
			.as_deref()
			.map(|subject| {
				self.plain.render_template(subject, &vars).map_err(|e| {
					Error::Render(format!("failed to render subject of '{}': {}", name, e))
				})
			})
			.transpose()
	}

	/// Render a mail template
	///
	/// `globals` are merged over the message parameters. A `title` global is
	/// replaced by the frontmatter subject when the template declares one.
	///
	/// Layout resolution for `mail/fr/newmail` with `layout: default`:
	/// 1. layouts/default.fr.html.hbs
	/// 2. layouts/default.html.hbs
	pub fn render(
		&self,
		name: &str,
		params: &TemplateParams,
		globals: &serde_json::Map<String, serde_json::Value>,
	) -> ClResult<RenderResult> {
		let (metadata, template) = self.load_template(name)?;
		let mut vars = Self::bind_params(name, &metadata, params)?;
		vars.extend(globals.iter().map(|(k, v)| (k.clone(), v.clone())));

		// Subject first, so the layout can use it as title
		let subject = match metadata.subject.as_deref() {
			Some(subject) => Some(self.plain.render_template(subject, &vars).map_err(|e| {
				Error::Render(format!("failed to render subject of '{}': {}", name, e))
			})?),
			None => None,
		};
		if let Some(subject) = &subject {
			vars.insert("title".into(), serde_json::Value::String(subject.clone()));
		}

		let html = self
			.handlebars
			.render_template(&template, &vars)
			.map_err(|e| Error::Render(format!("failed to render template '{}': {}", name, e)))?;

		let html_body = match metadata.layout.as_deref() {
			Some(layout) => self.render_layout(layout, template_lang(name), &html, &vars)?,
			None => html,
		};

		Ok(RenderResult { subject, html_body })
	}
}


// vim: ts=4
