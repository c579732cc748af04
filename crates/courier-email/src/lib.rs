//! Outbound mail for Courier
//!
//! This crate provides:
//! - The queue writer used by application flows
//! - The delivery worker claiming and transmitting queued mails
//! - The render gateway rebuilding mail bodies behind capability keys
//! - Template rendering (Handlebars) and SMTP transmission (lettre)
//! - Cooldown-gated flows for password reset, confirmation and address change

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod client;
pub mod delivery;
pub mod flows;
pub mod handler;
pub mod queue;
pub mod render;
pub mod sender;
pub mod template;
pub mod text;

mod prelude;

pub use client::{HttpRenderClient, LocalRenderClient, RenderClient};
pub use delivery::{CycleReport, run_bounded, run_cycle, run_forever};
pub use queue::{EnqueueRequest, enqueue};
pub use sender::{MailTransport, OutgoingMail, SmtpMailTransport};
pub use template::TemplateEngine;

use crate::prelude::*;
use courier_core::AppBuilderOpts;
use std::sync::Arc;

/// Mail state registered as an [`App`] extension
#[derive(Debug)]
pub struct EmailModule {
	pub template_engine: TemplateEngine,
	pub transport: Arc<dyn MailTransport>,
	pub render_client: Arc<dyn RenderClient>,
	pub html_to_text: text::HtmlToText,
}

impl EmailModule {
	pub fn new(
		opts: &AppBuilderOpts,
		transport: Arc<dyn MailTransport>,
		render_client: Arc<dyn RenderClient>,
	) -> ClResult<Self> {
		Ok(Self {
			template_engine: TemplateEngine::new(&opts.template_dir),
			transport,
			render_client,
			html_to_text: text::HtmlToText::new()?,
		})
	}
}

// vim: ts=4
