//! Delivery worker
//!
//! Claims pending rows one at a time, renders and transmits each, and
//! records the outcome in the claim's transaction. A row is locked from the
//! claim until its outcome is committed, so concurrent workers never deliver
//! the same message twice. Failed rows are not retried.

use std::ops::AddAssign;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use courier_types::queue_adapter::QueuedMessage;

use crate::EmailModule;
use crate::prelude::*;
use crate::render::render_key;
use crate::sender::OutgoingMail;

/// Outcomes recorded by a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
	pub sent: u32,
	pub failed: u32,
}

impl CycleReport {
	pub fn is_empty(&self) -> bool {
		self.sent == 0 && self.failed == 0
	}
}

impl AddAssign for CycleReport {
	fn add_assign(&mut self, other: Self) {
		self.sent += other.sent;
		self.failed += other.failed;
	}
}

/// Render and transmit one message
async fn deliver(app: &App, module: &EmailModule, msg: &QueuedMessage) -> ClResult<()> {
	let key = render_key(&app.opts.render_secret, msg.id)?;
	let html_body = module.render_client.render(app, msg.id, &key).await?;
	let text_body = module.html_to_text.convert(&html_body);

	let from = if msg.sender.trim().is_empty() { app.opts.mail_from.clone() } else { msg.sender.clone() };
	let mail = OutgoingMail {
		from,
		to: msg.recipient.clone(),
		bcc: msg.bcc.clone(),
		subject: msg.subject.clone(),
		html_body,
		text_body,
	};
	module.transport.send(&mail).await
}

/// Process pending rows oldest first until none is left or `stop` says so
///
/// `stop` is checked between claims only. A storage error ends the cycle;
/// the row involved stays pending.
async fn cycle(app: &App, stop: impl Fn() -> bool) -> ClResult<CycleReport> {
	let module = app.ext::<EmailModule>()?;
	let mut report = CycleReport::default();
	let mut after = None;

	while !stop() {
		let Some(claim) = app.queue_adapter.claim_next(after).await? else {
			break;
		};
		let msg = claim.message().clone();
		after = Some(msg.id);

		match deliver(app, module, &msg).await {
			Ok(()) => {
				claim.mark_sent(Timestamp::now()).await?;
				info!(msg_id = %msg.id, "Mail sent to {}", msg.recipient);
				report.sent += 1;
			}
			Err(err @ (Error::DbError | Error::Io(_))) => {
				claim.release().await?;
				warn!(msg_id = %msg.id, "Mail to {} left pending: {}", msg.recipient, err);
				return Err(err);
			}
			Err(err) => {
				let text = err.failure_text();
				claim.mark_failed(&text).await?;
				warn!(msg_id = %msg.id, "Mail to {} failed: {}", msg.recipient, text);
				report.failed += 1;
			}
		}
	}

	Ok(report)
}

/// Run a single cycle over the pending rows
pub async fn run_cycle(app: &App) -> ClResult<CycleReport> {
	cycle(app, || false).await
}

/// Run cycles until `budget` has elapsed
///
/// Meant for a scheduler starting one run per minute. Storage errors are
/// logged and the next cycle starts after the poll interval.
pub async fn run_bounded(app: &App, budget: Duration) -> CycleReport {
	let deadline = Instant::now() + budget;
	let mut total = CycleReport::default();

	loop {
		match cycle(app, || Instant::now() >= deadline).await {
			Ok(report) => total += report,
			Err(err) => error!("Delivery cycle failed: {}", err),
		}
		let next = Instant::now() + app.opts.poll_interval;
		if next >= deadline {
			break;
		}
		tokio::time::sleep_until(next).await;
	}

	info!("Delivery run finished: {} sent, {} failed", total.sent, total.failed);
	total
}

/// Run cycles until `cancel` fires
pub async fn run_forever(app: &App, cancel: CancellationToken) -> CycleReport {
	let mut total = CycleReport::default();
	info!("Delivery worker started (poll interval {:?})", app.opts.poll_interval);

	while !cancel.is_cancelled() {
		match cycle(app, || cancel.is_cancelled()).await {
			Ok(report) => total += report,
			Err(err) => error!("Delivery cycle failed: {}", err),
		}
		tokio::select! {
			() = cancel.cancelled() => break,
			() = tokio::time::sleep(app.opts.poll_interval) => {}
		}
	}

	info!("Delivery worker stopped: {} sent, {} failed", total.sent, total.failed);
	total
}

// vim: ts=4
