//! Shared fixtures for the mail integration tests

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use courier_core::cooldown::MemoryCooldownStore;
use courier_core::extensions::Extensions;
use courier_core::{App, AppBuilderOpts, AppState, CooldownGate};
use courier_email::{EmailModule, LocalRenderClient, MailTransport, OutgoingMail};
use courier_queue_adapter_sqlite::QueueAdapterSqlite;
use courier_types::prelude::*;
use courier_types::queue_adapter::MailQueueAdapter;

pub const INTERNAL_KEY: &str = "internal-test-key";

/// Transport recording every mail, or failing each one with a fixed reply
#[derive(Debug, Default)]
pub struct StubTransport {
	pub sent: Mutex<Vec<OutgoingMail>>,
	pub fail_with: Option<String>,
}

impl StubTransport {
	pub fn failing(reply: &str) -> Self {
		Self { sent: Mutex::new(Vec::new()), fail_with: Some(reply.to_string()) }
	}

	pub fn sent(&self) -> Vec<OutgoingMail> {
		self.sent.lock().unwrap().clone()
	}
}

#[async_trait]
impl MailTransport for StubTransport {
	async fn send(&self, mail: &OutgoingMail) -> ClResult<()> {
		if let Some(reply) = &self.fail_with {
			return Err(Error::Transport(reply.clone()));
		}
		self.sent.lock().unwrap().push(mail.clone());
		Ok(())
	}
}

pub struct TestApp {
	pub app: App,
	pub transport: Arc<StubTransport>,
	// Keeps the database and templates alive
	_dir: TempDir,
}

fn write(dir: &Path, name: &str, content: &str) {
	let path = dir.join(name);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap();
	}
	std::fs::write(path, content).unwrap();
}

fn write_templates(dir: &Path) {
	write(
		dir,
		"layouts/default.html.hbs",
		"<html><head><title>{{title}}</title><style>p { color: red; }</style></head>\
		 <body>{{{body}}}<p><a href=\"{{{unsubscribe_url}}}\">Unsubscribe</a></p></body></html>",
	);
	write(
		dir,
		"mail/en/default.html.hbs",
		"---\nlayout: default\nparams:\n  subject: text\n  body: text\n  call_to_action: map?\n---\n\
		 <h1>{{{subject}}}</h1><p>{{{nl2br body}}}</p>\
		 {{#if call_to_action}}<a href=\"{{call_to_action.link}}\">{{call_to_action.title}}</a>{{/if}}",
	);
	write(
		dir,
		"mail/en/passwd_reset.html.hbs",
		"---\nlayout: default\nsubject: Reset your password\nparams:\n  token: text\n---\n\
		 <p>Your reset code: {{token}}</p>",
	);
	write(
		dir,
		"mail/en/confirm.html.hbs",
		"---\nlayout: default\nsubject: Confirm your address\nparams:\n  link: text\n---\n<p>{{link}}</p>",
	);
	write(
		dir,
		"mail/en/newmail.html.hbs",
		"---\nlayout: default\nsubject: Confirm your new address\nparams:\n  link: text\n---\n<p>{{link}}</p>",
	);
	write(dir, "mail/en/broken.html.hbs", "---\nparams:\n  name: text\n---\n<p>{{name}}</p>");
}

pub async fn test_app_with(transport: StubTransport) -> TestApp {
	test_app_with_queue(transport, |queue| Arc::new(queue)).await
}

/// Build the test app with the SQLite queue wrapped by `wrap`
pub async fn test_app_with_queue(
	transport: StubTransport,
	wrap: impl FnOnce(QueueAdapterSqlite) -> Arc<dyn MailQueueAdapter>,
) -> TestApp {
	let dir = TempDir::new().unwrap();
	let template_dir = dir.path().join("templates");
	write_templates(&template_dir);

	let opts = AppBuilderOpts {
		app_name: "Courier Test".into(),
		app_url: "https://mail.example/".into(),
		render_secret: "render-secret".into(),
		unsubscribe_secret: "unsubscribe-secret".into(),
		internal_key: Some(INTERNAL_KEY.into()),
		template_dir: template_dir.into(),
		mail_from: "Courier <noreply@example.com>".into(),
		..AppBuilderOpts::default()
	};

	let queue = QueueAdapterSqlite::new(dir.path().join("queue.db")).await.unwrap();
	let transport = Arc::new(transport);
	let module =
		EmailModule::new(&opts, transport.clone(), Arc::new(LocalRenderClient)).unwrap();

	let mut extensions = Extensions::new();
	extensions.insert(module);

	let app = Arc::new(AppState {
		opts,
		queue_adapter: wrap(queue),
		cooldown: CooldownGate::new(Arc::new(MemoryCooldownStore::default())),
		extensions,
	});

	TestApp { app, transport, _dir: dir }
}

pub async fn test_app() -> TestApp {
	test_app_with(StubTransport::default()).await
}

// vim: ts=4
