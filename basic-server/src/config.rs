//! Settings read from the command line and the environment

use clap::{ArgAction, Args};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use courier::AppBuilder;
use courier::app::{SmtpOpts, TlsMode};
use courier::cooldown_adapter::CooldownAdapter;
use courier::email::LocalRenderClient;
use courier::error::{ClResult, Error};
use courier::queue_adapter::MailQueueAdapter;
use courier_cooldown_adapter_redis::CooldownAdapterRedis;
use courier_queue_adapter_postgres::QueueAdapterPostgres;
use courier_queue_adapter_sqlite::QueueAdapterSqlite;

#[derive(Args, Debug)]
pub struct Config {
	/// Queue database: `sqlite://<path>` or `postgres://...`
	#[arg(long, env = "COURIER_DATABASE_URL", default_value = "sqlite://./data/queue.db", global = true)]
	pub database_url: String,

	/// Cooldown counters live in memory when unset
	#[arg(long, env = "COURIER_REDIS_URL", global = true)]
	pub redis_url: Option<String>,

	#[arg(long, env = "COURIER_APP_NAME", default_value = "Courier", global = true)]
	pub app_name: String,

	/// Public base URL used in links
	#[arg(long, env = "COURIER_APP_URL", default_value = "http://127.0.0.1:8080/", global = true)]
	pub app_url: String,

	/// Base URL the worker fetches rendered bodies from (defaults to the app URL)
	#[arg(long, env = "COURIER_RENDER_URL", global = true)]
	pub render_url: Option<String>,

	/// Render bodies in process instead of over HTTP
	#[arg(long, env = "COURIER_RENDER_LOCAL", global = true)]
	pub render_local: bool,

	#[arg(long, env = "COURIER_RENDER_TIMEOUT", default_value_t = 10, global = true)]
	pub render_timeout_secs: u64,

	#[arg(long, env = "COURIER_RENDER_SECRET", default_value = "", hide_env_values = true, global = true)]
	pub render_secret: String,

	#[arg(long, env = "COURIER_UNSUBSCRIBE_SECRET", default_value = "", hide_env_values = true, global = true)]
	pub unsubscribe_secret: String,

	/// Enables the internal enqueue API
	#[arg(long, env = "COURIER_INTERNAL_KEY", hide_env_values = true, global = true)]
	pub internal_key: Option<String>,

	#[arg(long, env = "COURIER_TEMPLATE_DIR", default_value = "./templates", global = true)]
	pub template_dir: PathBuf,

	#[arg(long, env = "COURIER_DEFAULT_LANG", default_value = "en", global = true)]
	pub default_lang: String,

	#[arg(long, env = "COURIER_MAIL_FROM", default_value = "Courier <noreply@localhost>", global = true)]
	pub mail_from: String,

	/// When false, mails are logged instead of transmitted
	#[arg(long, env = "COURIER_MAIL_ENABLED", default_value_t = true, action = ArgAction::Set, global = true)]
	pub mail_enabled: bool,

	#[arg(long, env = "COURIER_POLL_INTERVAL", default_value_t = 5, global = true)]
	pub poll_interval_secs: u64,

	#[arg(long, env = "COURIER_SMTP_HOST", default_value = "localhost", global = true)]
	pub smtp_host: String,

	#[arg(long, env = "COURIER_SMTP_PORT", default_value_t = 587, global = true)]
	pub smtp_port: u16,

	#[arg(long, env = "COURIER_SMTP_USER", global = true)]
	pub smtp_user: Option<String>,

	#[arg(long, env = "COURIER_SMTP_PASS", hide_env_values = true, global = true)]
	pub smtp_pass: Option<String>,

	/// none, starttls or tls
	#[arg(long, env = "COURIER_SMTP_TLS", default_value = "starttls", global = true)]
	pub smtp_tls: String,

	#[arg(long, env = "COURIER_SMTP_TIMEOUT", default_value_t = 30, global = true)]
	pub smtp_timeout_secs: u64,
}

impl Config {
	pub async fn queue_adapter(&self) -> ClResult<Arc<dyn MailQueueAdapter>> {
		let url = self.database_url.as_str();
		if let Some(path) = url.strip_prefix("sqlite://") {
			Ok(Arc::new(QueueAdapterSqlite::new(path).await?))
		} else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
			Ok(Arc::new(QueueAdapterPostgres::new(url).await?))
		} else {
			Err(Error::ConfigError(format!("unsupported database URL: {}", url)))
		}
	}

	/// Shared Redis counters, or `None` for in-memory ones
	///
	/// An unreachable Redis at start-up is not fatal: the process keeps
	/// counting in memory, which still limits attempts per instance.
	pub async fn cooldown_adapter(&self) -> ClResult<Option<Arc<dyn CooldownAdapter>>> {
		let Some(url) = &self.redis_url else {
			return Ok(None);
		};
		match CooldownAdapterRedis::new(url).await {
			Ok(adapter) => Ok(Some(Arc::new(adapter))),
			Err(Error::ServiceUnavailable(msg)) => {
				warn!("Redis unavailable, counting cooldown attempts in memory: {}", msg);
				Ok(None)
			}
			Err(err) => Err(err),
		}
	}

	pub fn smtp(&self) -> ClResult<SmtpOpts> {
		Ok(SmtpOpts {
			host: self.smtp_host.as_str().into(),
			port: self.smtp_port,
			username: self.smtp_user.as_deref().map(Into::into),
			password: self.smtp_pass.as_deref().map(Into::into),
			tls_mode: self.smtp_tls.parse::<TlsMode>()?,
			timeout: Duration::from_secs(self.smtp_timeout_secs),
		})
	}

	/// Application builder with every adapter and option applied
	pub async fn builder(&self, listen: Option<&str>) -> ClResult<AppBuilder> {
		let mut builder = AppBuilder::new();
		builder
			.app_name(self.app_name.as_str())
			.app_url(with_trailing_slash(&self.app_url))
			.render_timeout(Duration::from_secs(self.render_timeout_secs))
			.render_secret(self.render_secret.as_str())
			.unsubscribe_secret(self.unsubscribe_secret.as_str())
			.template_dir(self.template_dir.clone())
			.default_lang(self.default_lang.as_str())
			.mail_from(self.mail_from.as_str())
			.mail_enabled(self.mail_enabled)
			.smtp(self.smtp()?)
			.poll_interval(Duration::from_secs(self.poll_interval_secs))
			.queue_adapter(self.queue_adapter().await?);

		if let Some(listen) = listen {
			builder.listen(listen);
		}
		if let Some(render_url) = &self.render_url {
			builder.render_base_url(with_trailing_slash(render_url));
		}
		if self.render_local {
			builder.render_client(Arc::new(LocalRenderClient));
		}
		if let Some(internal_key) = &self.internal_key {
			builder.internal_key(internal_key.as_str());
		}
		if let Some(cooldown_adapter) = self.cooldown_adapter().await? {
			builder.cooldown_adapter(cooldown_adapter);
		}
		Ok(builder)
	}
}

fn with_trailing_slash(url: &str) -> String {
	if url.ends_with('/') { url.to_string() } else { format!("{}/", url) }
}


// vim: ts=4
