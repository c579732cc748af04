//! Mail-triggering user flows
//!
//! Entry points for the application's controllers: each one passes the
//! cooldown gates of its action and queues the matching mail. Failing to
//! queue never fails the calling action; it only reports the mail as not
//! sent.

use std::net::IpAddr;
use std::time::Duration;

use courier_core::{CooldownPolicy, CooldownSubject};
use courier_types::params::TemplateParams;

use crate::EmailModule;
use crate::prelude::*;
use crate::queue::{EnqueueRequest, enqueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
	Queued(MsgId),
	/// A cooldown gate denied the action
	Throttled { retry_after: Duration },
	/// The mail could not be queued
	NotSent,
}

/// `mail/<lang>/<name>`, with the default language when `lang` has no templates
fn localized(app: &App, module: &EmailModule, lang: &str, name: &str) -> String {
	let lang = if module.template_engine.has_lang(lang) { lang } else { &*app.opts.default_lang };
	format!("mail/{}/{}", lang, name)
}

async fn gate(app: &App, gates: &[(&CooldownPolicy, CooldownSubject<'_>)]) -> Option<FlowOutcome> {
	match app.cooldown.check_all(gates).await {
		Ok(()) => None,
		Err(err) => {
			info!("{}", err);
			Some(FlowOutcome::Throttled { retry_after: err.retry_after() })
		}
	}
}

/// Queue a template mail whose subject comes from the template itself
async fn try_queue_template_mail(
	app: &App,
	to: &str,
	lang: &str,
	name: &str,
	params: TemplateParams,
) -> ClResult<MsgId> {
	let module = app.ext::<EmailModule>()?;
	let template = localized(app, module, lang, name);
	let subject = module
		.template_engine
		.render_subject(&template, &params)?
		.unwrap_or_else(|| app.opts.app_name.to_string());

	enqueue(app, EnqueueRequest::new(to, subject).template(template).params(params)).await
}

async fn queue_template_mail(
	app: &App,
	to: &str,
	lang: &str,
	name: &str,
	params: TemplateParams,
) -> FlowOutcome {
	match try_queue_template_mail(app, to, lang, name, params).await {
		Ok(id) => FlowOutcome::Queued(id),
		Err(err) => {
			error!("Could not queue {} mail to {}: {}", name, to, err);
			FlowOutcome::NotSent
		}
	}
}

/// Password reset link for `email`, requested from `ip`
pub async fn password_reset(app: &App, ip: IpAddr, email: &str, lang: &str, token: &str) -> FlowOutcome {
	let gates = [
		(&CooldownPolicy::FORGOT_PASSWD_IP, CooldownSubject::Ip(ip)),
		(&CooldownPolicy::FORGOT_PASSWD_EMAIL, CooldownSubject::Email(email)),
	];
	if let Some(throttled) = gate(app, &gates).await {
		return throttled;
	}

	let mut params = TemplateParams::new();
	params.insert("token".into(), token.into());
	queue_template_mail(app, email, lang, "passwd_reset", params).await
}

/// New copy of the address confirmation mail of account `user_id`
pub async fn resend_confirmation(
	app: &App,
	ip: IpAddr,
	user_id: i64,
	email: &str,
	lang: &str,
	link: &str,
) -> FlowOutcome {
	let gates = [
		(&CooldownPolicy::RESEND_IP, CooldownSubject::Ip(ip)),
		(&CooldownPolicy::RESEND_UID, CooldownSubject::User(user_id)),
	];
	if let Some(throttled) = gate(app, &gates).await {
		return throttled;
	}

	let mut params = TemplateParams::new();
	params.insert("link".into(), link.into());
	queue_template_mail(app, email, lang, "confirm", params).await
}

/// Confirmation mail sent to the new address of account `user_id`
pub async fn email_change(app: &App, user_id: i64, new_email: &str, lang: &str, link: &str) -> FlowOutcome {
	let gates = [(&CooldownPolicy::UPDATE_EMAIL, CooldownSubject::User(user_id))];
	if let Some(throttled) = gate(app, &gates).await {
		return throttled;
	}

	let mut params = TemplateParams::new();
	params.insert("link".into(), link.into());
	queue_template_mail(app, new_email, lang, "newmail", params).await
}

// vim: ts=4
