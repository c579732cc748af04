//! Queue writer

use courier_types::params::{ParamValue, TemplateParams};
use courier_types::queue_adapter::NewMessage;

use crate::prelude::*;
use crate::template::validate_template_name;

/// A message to be queued
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
	pub to: Box<str>,
	pub subject: Box<str>,
	/// Defaults to `mail/<default_lang>/default`
	pub template: Option<Box<str>>,
	pub params: TemplateParams,
	pub bcc: Vec<Box<str>>,
	/// Defaults to the system sender
	pub sender: Option<Box<str>>,
}

impl EnqueueRequest {
	pub fn new(to: impl Into<Box<str>>, subject: impl Into<Box<str>>) -> Self {
		Self {
			to: to.into(),
			subject: subject.into(),
			template: None,
			params: TemplateParams::new(),
			bcc: Vec::new(),
			sender: None,
		}
	}

	pub fn template(mut self, template: impl Into<Box<str>>) -> Self {
		self.template = Some(template.into());
		self
	}

	pub fn params(mut self, params: TemplateParams) -> Self {
		self.params = params;
		self
	}

	pub fn param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
		self.params.insert(name.to_string(), value.into());
		self
	}

	pub fn bcc(mut self, bcc: Vec<Box<str>>) -> Self {
		self.bcc = bcc;
		self
	}

	pub fn sender(mut self, sender: impl Into<Box<str>>) -> Self {
		self.sender = Some(sender.into());
		self
	}
}

fn check_address(address: &str) -> ClResult<()> {
	let address = address.trim();
	match address.rsplit_once('@') {
		Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
		_ => Err(Error::ValidationError(format!("invalid address: {:?}", address))),
	}
}

/// Insert a pending message, returning its id
///
/// Only touches the store: rendering and transmission happen in the worker.
pub async fn enqueue(app: &App, req: EnqueueRequest) -> ClResult<MsgId> {
	check_address(&req.to)?;
	for bcc in &req.bcc {
		check_address(bcc)?;
	}

	let template = req
		.template
		.unwrap_or_else(|| format!("mail/{}/default", app.opts.default_lang).into());
	validate_template_name(&template).map_err(|_| {
		Error::ValidationError(format!("invalid template name: {:?}", template))
	})?;

	let sender = req
		.sender
		.filter(|sender| !sender.trim().is_empty())
		.unwrap_or_else(|| app.opts.mail_from.clone());

	let msg = NewMessage {
		sender,
		recipient: req.to,
		subject: req.subject,
		template,
		params: req.params,
		bcc: req.bcc,
	};
	let id = app.queue_adapter.enqueue(&msg).await?;

	info!(msg_id = %id, "Mail to {} queued (template: {})", msg.recipient, msg.template);
	Ok(id)
}


// vim: ts=4
