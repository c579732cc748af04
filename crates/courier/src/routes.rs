//! HTTP routes

use axum::{
	Router,
	routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::prelude::*;
use courier_email::handler;

/// Build the router of the mail endpoints
///
/// The internal enqueue API is only mounted when an internal key is
/// configured.
pub fn init(app: App) -> Router {
	let mut router = Router::new().route("/api/mailer/{id}", get(handler::get_rendered_mail));

	if app.opts.internal_key.is_some() {
		router = router.route("/api/mailer/{lang}/{template}", post(handler::post_mail));
	} else {
		info!("No internal key configured, internal mail API disabled");
	}

	router.layer(TraceLayer::new_for_http()).with_state(app)
}

// vim: ts=4
