//! Mailer HTTP handlers

use axum::{
	Json,
	body::Bytes,
	extract::{Path, Query, State},
	http::{HeaderMap, StatusCode},
	response::Html,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use courier_types::params::{ParamValue, TemplateParams};
use courier_types::types::ApiResponse;

use crate::EmailModule;
use crate::prelude::*;
use crate::queue::{EnqueueRequest, enqueue};

pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

#[derive(Debug, Deserialize)]
pub struct RenderQuery {
	render_key: Option<String>,
}

/// GET /api/mailer/{id}?render_key=...
///
/// Unknown ids, malformed ids and wrong keys all answer 404.
pub async fn get_rendered_mail(
	State(app): State<App>,
	Path(id): Path<String>,
	Query(query): Query<RenderQuery>,
) -> ClResult<Html<String>> {
	let id: MsgId = id.parse().map_err(|_| Error::NotFound)?;
	let key = query.render_key.ok_or(Error::NotFound)?;

	let rendered = crate::render::render(&app, id, &key).await?;
	Ok(Html(rendered.html))
}

#[derive(Debug, Deserialize)]
pub struct CallToAction {
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub link: String,
}

#[derive(Debug, Deserialize)]
pub struct PostMailReq {
	#[serde(default)]
	pub to: String,
	#[serde(default)]
	pub subject: String,
	#[serde(default)]
	pub body: String,
	pub from: Option<String>,
	#[serde(default)]
	pub bcc: Vec<String>,
	pub call_to_action: Option<CallToAction>,
}

#[derive(Debug, Serialize)]
pub struct QueuedMail {
	pub id: MsgId,
}

fn check_internal_key(app: &App, headers: &HeaderMap) -> ClResult<()> {
	let Some(expected) = app.opts.internal_key.as_deref() else {
		return Err(Error::Unauthorized);
	};
	match headers.get(INTERNAL_KEY_HEADER) {
		Some(given) if bool::from(given.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
		_ => Err(Error::Unauthorized),
	}
}

/// POST /api/mailer/{lang}/{template}
///
/// Internal API queueing a generic mail. Only the `default` template is
/// offered; an unknown language falls back to the default one.
pub async fn post_mail(
	State(app): State<App>,
	Path((lang, template)): Path<(String, String)>,
	headers: HeaderMap,
	body: Bytes,
) -> ClResult<(StatusCode, Json<ApiResponse<QueuedMail>>)> {
	check_internal_key(&app, &headers)?;

	let req: PostMailReq = serde_json::from_slice(&body)
		.map_err(|e| Error::ValidationError(format!("invalid request body: {}", e)))?;
	if req.to.trim().is_empty() || req.subject.trim().is_empty() || req.body.trim().is_empty() {
		return Err(Error::ValidationError("To, Subject or Body are missing".into()));
	}
	// A bare address only, no display name or list
	if req.to.parse::<lettre::Address>().is_err() {
		return Err(Error::ValidationError("The destination E-Mail address must be valid".into()));
	}

	let module = app.ext::<EmailModule>()?;
	let lang = if module.template_engine.has_lang(&lang) { lang.as_str() } else { &*app.opts.default_lang };

	let mut params = TemplateParams::new();
	params.insert("subject".into(), handlebars::html_escape(&req.subject).into());
	params.insert("body".into(), req.body.into());

	let template = match template.as_str() {
		"default" => {
			if let Some(cta) = req.call_to_action {
				if cta.title.is_empty() || cta.link.is_empty() {
					return Err(Error::ValidationError("Bad Call-to-action format".into()));
				}
				let mut map = std::collections::BTreeMap::new();
				map.insert("title".to_string(), ParamValue::Text(cta.title));
				map.insert("link".to_string(), ParamValue::Text(cta.link));
				params.insert("call_to_action".into(), ParamValue::Map(map));
			}
			format!("mail/{}/default", lang)
		}
		_ => return Err(Error::NotFound),
	};

	let mut mail = EnqueueRequest::new(req.to, req.subject)
		.template(template)
		.params(params)
		.bcc(req.bcc.into_iter().map(Into::into).collect());
	if let Some(from) = req.from {
		mail = mail.sender(from);
	}
	let id = enqueue(&app, mail).await?;

	Ok((StatusCode::CREATED, Json(ApiResponse::new(QueuedMail { id }))))
}

// vim: ts=4
