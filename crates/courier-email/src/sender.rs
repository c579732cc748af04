//! SMTP mail transport using lettre

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt::Debug;

use crate::prelude::*;
use courier_core::{SmtpOpts, TlsMode};

/// A fully rendered mail, ready for transmission
#[derive(Debug, Clone)]
pub struct OutgoingMail {
	pub from: Box<str>,
	pub to: Box<str>,
	pub bcc: Vec<Box<str>>,
	pub subject: Box<str>,
	pub html_body: String,
	pub text_body: String,
}

#[async_trait]
pub trait MailTransport: Debug + Send + Sync {
	/// Hand the mail over for delivery
	///
	/// Failures are [`Error::Transport`] carrying the server's reply.
	async fn send(&self, mail: &OutgoingMail) -> ClResult<()>;
}

/// Parse `"Display Name <addr>"` or a bare address
pub fn parse_mailbox(address: &str) -> ClResult<Mailbox> {
	address
		.trim()
		.parse()
		.map_err(|e| Error::ValidationError(format!("invalid address {:?}: {}", address, e)))
}

/// Build a multipart/alternative message with text and HTML bodies
pub fn build_message(mail: &OutgoingMail) -> ClResult<Message> {
	let mut builder =
		Message::builder().from(parse_mailbox(&mail.from)?).to(parse_mailbox(&mail.to)?);
	for bcc in &mail.bcc {
		builder = builder.bcc(parse_mailbox(bcc)?);
	}

	builder
		.subject(mail.subject.as_ref())
		.multipart(
			MultiPart::alternative()
				.singlepart(SinglePart::plain(mail.text_body.clone()))
				.singlepart(SinglePart::html(mail.html_body.clone())),
		)
		.map_err(|e| Error::ValidationError(format!("Failed to build email: {}", e)))
}

/// SMTP sender
pub struct SmtpMailTransport {
	mailer: AsyncSmtpTransport<Tokio1Executor>,
	enabled: bool,
}

impl Debug for SmtpMailTransport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SmtpMailTransport").field("enabled", &self.enabled).finish_non_exhaustive()
	}
}

impl SmtpMailTransport {
	pub fn new(opts: &SmtpOpts, enabled: bool) -> ClResult<Self> {
		let tls_params = || {
			TlsParameters::builder(opts.host.to_string())
				.build()
				.map_err(|e| Error::ConfigError(format!("TLS configuration error: {}", e)))
		};
		let tls = match opts.tls_mode {
			TlsMode::Tls => Tls::Wrapper(tls_params()?),
			TlsMode::StartTls => Tls::Opportunistic(tls_params()?),
			TlsMode::None => Tls::None,
		};

		let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(opts.host.as_ref())
			.port(opts.port)
			.timeout(Some(opts.timeout))
			.tls(tls);
		if let (Some(username), Some(password)) = (&opts.username, &opts.password) {
			builder = builder.credentials(Credentials::new(username.to_string(), password.to_string()));
		}

		debug!(
			"SMTP transport {}:{} with TLS mode {:?} (enabled: {})",
			opts.host, opts.port, opts.tls_mode, enabled
		);
		Ok(Self { mailer: builder.build(), enabled })
	}
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
	async fn send(&self, mail: &OutgoingMail) -> ClResult<()> {
		let message = build_message(mail)?;

		if !self.enabled {
			info!("Email sending disabled, skipping send to {}", mail.to);
			return Ok(());
		}

		match self.mailer.send(message).await {
			Ok(response) => {
				debug!("SMTP accepted mail to {} (response: {:?})", mail.to, response.code());
				Ok(())
			}
			Err(e) => Err(Error::Transport(e.to_string())),
		}
	}
}


// vim: ts=4
