//! App state type

use std::{path::Path, path::PathBuf, sync::Arc, time::Duration};

use crate::cooldown::CooldownGate;
use crate::extensions::Extensions;
use crate::prelude::*;

use courier_types::queue_adapter::MailQueueAdapter;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// SMTP connection security
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
	None,
	StartTls,
	Tls,
}

impl std::str::FromStr for TlsMode {
	type Err = Error;

	fn from_str(s: &str) -> ClResult<Self> {
		match s {
			"none" => Ok(TlsMode::None),
			"starttls" => Ok(TlsMode::StartTls),
			"tls" => Ok(TlsMode::Tls),
			_ => Err(Error::ConfigError(format!(
				"Invalid TLS mode: {}. Must be 'none', 'starttls', or 'tls'",
				s
			))),
		}
	}
}

#[derive(Debug, Clone)]
pub struct SmtpOpts {
	pub host: Box<str>,
	pub port: u16,
	pub username: Option<Box<str>>,
	pub password: Option<Box<str>>,
	pub tls_mode: TlsMode,
	pub timeout: Duration,
}

impl Default for SmtpOpts {
	fn default() -> Self {
		Self {
			host: "localhost".into(),
			port: 587,
			username: None,
			password: None,
			tls_mode: TlsMode::StartTls,
			timeout: Duration::from_secs(30),
		}
	}
}

#[derive(Debug, Clone)]
pub struct AppBuilderOpts {
	pub listen: Box<str>,
	pub app_name: Box<str>,
	/// Public base URL, always ending with `/`
	pub app_url: Box<str>,
	/// Base URL the worker uses to reach the render endpoint
	pub render_base_url: Option<Box<str>>,
	pub render_timeout: Duration,
	pub render_secret: Box<str>,
	pub unsubscribe_secret: Box<str>,
	/// Shared key of the internal enqueue API; the API is disabled when unset
	pub internal_key: Option<Box<str>>,
	pub template_dir: Box<Path>,
	pub default_lang: Box<str>,
	/// System sender used when a message has none
	pub mail_from: Box<str>,
	/// When false, transmission is logged and skipped
	pub mail_enabled: bool,
	pub smtp: SmtpOpts,
	pub poll_interval: Duration,
	pub cron_budget: Duration,
}

impl Default for AppBuilderOpts {
	fn default() -> Self {
		Self {
			listen: "127.0.0.1:8080".into(),
			app_name: "Courier".into(),
			app_url: "http://127.0.0.1:8080/".into(),
			render_base_url: None,
			render_timeout: Duration::from_secs(10),
			render_secret: "".into(),
			unsubscribe_secret: "".into(),
			internal_key: None,
			template_dir: PathBuf::from("./templates").into(),
			default_lang: "en".into(),
			mail_from: "Courier <noreply@localhost>".into(),
			mail_enabled: true,
			smtp: SmtpOpts::default(),
			poll_interval: Duration::from_secs(5),
			cron_budget: Duration::from_secs(55),
		}
	}
}

impl AppBuilderOpts {
	/// Check the options a running instance cannot do without
	pub fn validate(&self) -> ClResult<()> {
		if self.render_secret.is_empty() {
			return Err(Error::ConfigError("render secret is not configured".into()));
		}
		if self.unsubscribe_secret.is_empty() {
			return Err(Error::ConfigError("unsubscribe secret is not configured".into()));
		}
		if !self.app_url.ends_with('/') {
			return Err(Error::ConfigError(format!("app URL must end with '/': {}", self.app_url)));
		}
		if let Some(render_base_url) = self.render_base_url.as_deref()
			&& !render_base_url.ends_with('/')
		{
			return Err(Error::ConfigError(format!(
				"render URL must end with '/': {}",
				render_base_url
			)));
		}
		if !self.mail_from.contains('@') {
			return Err(Error::ConfigError(format!("invalid system sender: {}", self.mail_from)));
		}
		Ok(())
	}
}

pub struct AppState {
	pub opts: AppBuilderOpts,
	pub queue_adapter: Arc<dyn MailQueueAdapter>,
	pub cooldown: CooldownGate,

	// Type-erased extension map for feature-specific state
	pub extensions: Extensions,
}

impl AppState {
	/// Get a registered extension by type. Returns error if not found.
	pub fn ext<T: Send + Sync + 'static>(&self) -> ClResult<&T> {
		self.extensions.get::<T>().ok_or_else(|| {
			Error::Internal(format!("Extension {} not registered", std::any::type_name::<T>()))
		})
	}
}

pub type App = Arc<AppState>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tls_mode_parse() {
		assert_eq!("starttls".parse::<TlsMode>().unwrap(), TlsMode::StartTls);
		assert_eq!("tls".parse::<TlsMode>().unwrap(), TlsMode::Tls);
		assert!("ssl".parse::<TlsMode>().is_err());
	}

	#[test]
	fn test_validate_requires_secrets() {
		let opts = AppBuilderOpts::default();
		assert!(matches!(opts.validate(), Err(Error::ConfigError(_))));

		let opts = AppBuilderOpts {
			render_secret: "r".into(),
			unsubscribe_secret: "u".into(),
			..AppBuilderOpts::default()
		};
		assert!(opts.validate().is_ok());
	}

	#[test]
	fn test_validate_app_url() {
		let opts = AppBuilderOpts {
			render_secret: "r".into(),
			unsubscribe_secret: "u".into(),
			app_url: "https://example.com".into(),
			..AppBuilderOpts::default()
		};
		assert!(opts.validate().is_err());

		let opts = AppBuilderOpts {
			app_url: "https://example.com/".into(),
			render_base_url: Some("http://render:8080".into()),
			..opts
		};
		assert!(matches!(opts.validate(), Err(Error::ConfigError(_))));

		let opts = AppBuilderOpts { render_base_url: Some("http://render:8080/".into()), ..opts };
		assert!(opts.validate().is_ok());
	}
}

// vim: ts=4
