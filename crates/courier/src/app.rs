//! App builder - constructs and runs the Courier application

use std::{path::Path, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::prelude::*;
use crate::routes;
pub use courier_core::app::{App, AppBuilderOpts, AppState, SmtpOpts, TlsMode, VERSION};
use courier_core::cooldown::{CooldownGate, MemoryCooldownStore};
use courier_core::extensions::Extensions;
use courier_email::{
	CycleReport, EmailModule, HttpRenderClient, MailTransport, RenderClient, SmtpMailTransport,
};
use courier_types::cooldown_adapter::CooldownAdapter;
use courier_types::queue_adapter::MailQueueAdapter;

#[derive(Default)]
struct Adapters {
	queue_adapter: Option<Arc<dyn MailQueueAdapter>>,
	cooldown_adapter: Option<Arc<dyn CooldownAdapter>>,
}

pub struct AppBuilder {
	opts: AppBuilderOpts,
	adapters: Adapters,
	transport: Option<Arc<dyn MailTransport>>,
	render_client: Option<Arc<dyn RenderClient>>,
}

impl AppBuilder {
	pub fn new() -> Self {
		// A subscriber may already be installed by the embedding program
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_target(false)
			.try_init();
		AppBuilder {
			opts: AppBuilderOpts::default(),
			adapters: Adapters::default(),
			transport: None,
			render_client: None,
		}
	}

	// Opts
	pub fn listen(&mut self, listen: impl Into<Box<str>>) -> &mut Self {
		self.opts.listen = listen.into();
		self
	}
	pub fn app_name(&mut self, app_name: impl Into<Box<str>>) -> &mut Self {
		self.opts.app_name = app_name.into();
		self
	}
	pub fn app_url(&mut self, app_url: impl Into<Box<str>>) -> &mut Self {
		self.opts.app_url = app_url.into();
		self
	}
	pub fn render_base_url(&mut self, render_base_url: impl Into<Box<str>>) -> &mut Self {
		self.opts.render_base_url = Some(render_base_url.into());
		self
	}
	pub fn render_timeout(&mut self, render_timeout: Duration) -> &mut Self {
		self.opts.render_timeout = render_timeout;
		self
	}
	pub fn render_secret(&mut self, render_secret: impl Into<Box<str>>) -> &mut Self {
		self.opts.render_secret = render_secret.into();
		self
	}
	pub fn unsubscribe_secret(&mut self, unsubscribe_secret: impl Into<Box<str>>) -> &mut Self {
		self.opts.unsubscribe_secret = unsubscribe_secret.into();
		self
	}
	pub fn internal_key(&mut self, internal_key: impl Into<Box<str>>) -> &mut Self {
		self.opts.internal_key = Some(internal_key.into());
		self
	}
	pub fn template_dir(&mut self, template_dir: impl Into<Box<Path>>) -> &mut Self {
		self.opts.template_dir = template_dir.into();
		self
	}
	pub fn default_lang(&mut self, default_lang: impl Into<Box<str>>) -> &mut Self {
		self.opts.default_lang = default_lang.into();
		self
	}
	pub fn mail_from(&mut self, mail_from: impl Into<Box<str>>) -> &mut Self {
		self.opts.mail_from = mail_from.into();
		self
	}
	pub fn mail_enabled(&mut self, enabled: bool) -> &mut Self {
		self.opts.mail_enabled = enabled;
		self
	}
	pub fn smtp(&mut self, smtp: SmtpOpts) -> &mut Self {
		self.opts.smtp = smtp;
		self
	}
	pub fn poll_interval(&mut self, poll_interval: Duration) -> &mut Self {
		self.opts.poll_interval = poll_interval;
		self
	}
	pub fn cron_budget(&mut self, cron_budget: Duration) -> &mut Self {
		self.opts.cron_budget = cron_budget;
		self
	}

	// Adapters
	pub fn queue_adapter(&mut self, queue_adapter: Arc<dyn MailQueueAdapter>) -> &mut Self {
		self.adapters.queue_adapter = Some(queue_adapter);
		self
	}
	pub fn cooldown_adapter(&mut self, cooldown_adapter: Arc<dyn CooldownAdapter>) -> &mut Self {
		self.adapters.cooldown_adapter = Some(cooldown_adapter);
		self
	}

	/// Replace the SMTP transport
	pub fn transport(&mut self, transport: Arc<dyn MailTransport>) -> &mut Self {
		self.transport = Some(transport);
		self
	}

	/// Replace the HTTP render client, e.g. with the in-process one
	pub fn render_client(&mut self, render_client: Arc<dyn RenderClient>) -> &mut Self {
		self.render_client = Some(render_client);
		self
	}

	/// Validate the configuration and assemble the application state
	pub fn build(self) -> ClResult<App> {
		info!("Courier V{}", VERSION);

		if let Err(e) = self.opts.validate() {
			error!("FATAL: Invalid configuration: {}", e);
			return Err(e);
		}

		if rustls::crypto::CryptoProvider::get_default().is_none() {
			rustls::crypto::CryptoProvider::install_default(
				rustls::crypto::aws_lc_rs::default_provider(),
			)
			.map_err(|e| {
				error!("FATAL: Failed to install default crypto provider: {:?}", e);
				Error::Internal("Failed to install default crypto provider".to_string())
			})?;
		}

		let Some(queue_adapter) = self.adapters.queue_adapter else {
			error!("FATAL: No queue adapter configured");
			return Err(Error::Internal("No queue adapter configured".to_string()));
		};
		let cooldown_adapter = self.adapters.cooldown_adapter.unwrap_or_else(|| {
			info!("No cooldown adapter configured, counting attempts in memory");
			Arc::new(MemoryCooldownStore::default())
		});

		if !self.opts.template_dir.is_dir() {
			warn!("Template directory {} does not exist", self.opts.template_dir.display());
		}

		let transport: Arc<dyn MailTransport> = match self.transport {
			Some(transport) => transport,
			None => Arc::new(SmtpMailTransport::new(&self.opts.smtp, self.opts.mail_enabled)?),
		};
		let render_client: Arc<dyn RenderClient> = match self.render_client {
			Some(render_client) => render_client,
			None => {
				let base_url = self.opts.render_base_url.as_deref().unwrap_or(&self.opts.app_url);
				info!("Rendering mails through {}", base_url);
				Arc::new(HttpRenderClient::new(base_url, self.opts.render_timeout)?)
			}
		};
		if !self.opts.mail_enabled {
			warn!("Mail transmission is disabled, deliveries are only logged");
		}

		// Build extensions map for feature-specific state
		let mut extensions = Extensions::new();
		extensions.insert(EmailModule::new(&self.opts, transport, render_client)?);

		Ok(Arc::new(AppState {
			opts: self.opts,
			queue_adapter,
			cooldown: CooldownGate::new(cooldown_adapter),
			extensions,
		}))
	}

	/// Serve the HTTP endpoints, optionally with the delivery worker in process
	pub async fn serve(self, with_worker: bool) -> ClResult<()> {
		let app = self.build()?;
		let router = routes::init(app.clone());

		let listener = tokio::net::TcpListener::bind(app.opts.listen.as_ref()).await.map_err(|e| {
			error!("FATAL: Cannot listen on {}: {}", app.opts.listen, e);
			e
		})?;
		info!("Listening on HTTP {}", app.opts.listen);

		let cancel = CancellationToken::new();
		let worker = with_worker.then(|| {
			let app = app.clone();
			let cancel = cancel.clone();
			tokio::spawn(async move { courier_email::run_forever(&app, cancel).await })
		});

		axum::serve(listener, router).with_graceful_shutdown(shutdown_signal(cancel.clone())).await?;

		cancel.cancel();
		if let Some(worker) = worker {
			worker.await.map_err(|e| Error::Internal(format!("worker task failed: {}", e)))?;
		}
		Ok(())
	}

	/// Run the delivery worker until interrupted
	pub async fn run_worker(self) -> ClResult<CycleReport> {
		let app = self.build()?;
		let cancel = CancellationToken::new();
		tokio::spawn(shutdown_signal(cancel.clone()));

		Ok(courier_email::run_forever(&app, cancel).await)
	}

	/// Run the delivery worker for the configured cron budget
	pub async fn run_cron(self) -> ClResult<CycleReport> {
		let app = self.build()?;
		Ok(courier_email::run_bounded(&app, app.opts.cron_budget).await)
	}
}

impl Default for AppBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Resolve on Ctrl-C or when `cancel` fires, cancelling it in the first case
async fn shutdown_signal(cancel: CancellationToken) {
	tokio::select! {
		res = tokio::signal::ctrl_c() => {
			if let Err(e) = res {
				warn!("Cannot listen for shutdown signal: {}", e);
				// Keep running until cancelled some other way
				cancel.cancelled().await;
				return;
			}
			info!("Shutdown requested");
			cancel.cancel();
		}
		() = cancel.cancelled() => {}
	}
}

// vim: ts=4
