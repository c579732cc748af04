//! Mailer HTTP endpoints

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use http_body_util::BodyExt;
use tower::ServiceExt;

use common::{INTERNAL_KEY, test_app};
use courier_core::App;
use courier_email::handler::{INTERNAL_KEY_HEADER, get_rendered_mail, post_mail};
use courier_email::render::render_key;
use courier_types::prelude::*;

fn router(app: App) -> Router {
	Router::new()
		.route("/api/mailer/{id}", get(get_rendered_mail))
		.route("/api/mailer/{lang}/{template}", post(post_mail))
		.with_state(app)
}

fn post_req(path: &str, key: Option<&str>, body: &str) -> Request<Body> {
	let mut req = Request::builder().method("POST").uri(path).header("content-type", "application/json");
	if let Some(key) = key {
		req = req.header(INTERNAL_KEY_HEADER, key);
	}
	req.body(Body::from(body.to_string())).unwrap()
}

async fn body_string(res: axum::response::Response) -> String {
	let bytes = res.into_body().collect().await.unwrap().to_bytes();
	String::from_utf8(bytes.to_vec()).unwrap()
}

const MAIL: &str = r#"{"to":"bob@example.com","subject":"Tom & Jerry","body":"Hello"}"#;

#[tokio::test]
async fn test_post_mail_requires_internal_key() {
	let t = test_app().await;

	let res = router(t.app.clone()).oneshot(post_req("/api/mailer/en/default", None, MAIL)).await.unwrap();
	assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

	let truncated = &INTERNAL_KEY[..INTERNAL_KEY.len() - 1];
	let extended = format!("{}x", INTERNAL_KEY);
	for key in ["wrong", "", truncated, extended.as_str()] {
		let res = router(t.app.clone())
			.oneshot(post_req("/api/mailer/en/default", Some(key), MAIL))
			.await
			.unwrap();
		assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "key: {:?}", key);
	}

	let res = router(t.app.clone())
		.oneshot(post_req("/api/mailer/en/default", Some(INTERNAL_KEY), MAIL))
		.await
		.unwrap();
	assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_post_mail_validation() {
	let t = test_app().await;
	let cases = [
		"not json",
		r#"{"to":"bob@example.com","subject":"","body":"Hello"}"#,
		r#"{"to":"bob","subject":"Hi","body":"Hello"}"#,
		r#"{"to":"Bob <bob@example.com>","subject":"Hi","body":"Hello"}"#,
		r#"{"to":"bob@example.com, eve@example.com","subject":"Hi","body":"Hello"}"#,
		r#"{"to":"bob@example.com","subject":"Hi","body":"Hello","call_to_action":{"title":"Go"}}"#,
	];
	for body in cases {
		let res = router(t.app.clone())
			.oneshot(post_req("/api/mailer/en/default", Some(INTERNAL_KEY), body))
			.await
			.unwrap();
		assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body: {}", body);
	}

	let res = router(t.app.clone())
		.oneshot(post_req("/api/mailer/en/newsletter", Some(INTERNAL_KEY), MAIL))
		.await
		.unwrap();
	assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_mail_then_view_in_browser() {
	let t = test_app().await;
	let body = r#"{"to":"bob@example.com","subject":"Tom & Jerry","body":"Hello",
		"call_to_action":{"title":"Open","link":"https://app.example/open"}}"#;

	// Unknown language falls back to the default one
	let res = router(t.app.clone())
		.oneshot(post_req("/api/mailer/xx/default", Some(INTERNAL_KEY), body))
		.await
		.unwrap();
	assert_eq!(res.status(), StatusCode::CREATED);
	let json: serde_json::Value = serde_json::from_str(&body_string(res).await).unwrap();
	let id = MsgId(json["data"]["id"].as_i64().unwrap());

	let row = t.app.queue_adapter.read(id).await.unwrap();
	assert_eq!(&*row.template, "mail/en/default");
	assert_eq!(&*row.subject, "Tom & Jerry");

	let key = render_key("render-secret", id).unwrap();
	let res = router(t.app.clone())
		.oneshot(Request::get(format!("/api/mailer/{}?render_key={}", id, key)).body(Body::empty()).unwrap())
		.await
		.unwrap();
	assert_eq!(res.status(), StatusCode::OK);
	let html = body_string(res).await;
	assert!(html.contains("<h1>Tom &amp; Jerry</h1>"));
	assert!(html.contains("href=\"https://app.example/open\""));

	for uri in [
		format!("/api/mailer/{}?render_key=wrong", id),
		format!("/api/mailer/{}", id),
		"/api/mailer/abc?render_key=x".to_string(),
	] {
		let res = router(t.app.clone()).oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
		assert_eq!(res.status(), StatusCode::NOT_FOUND);
	}
}

// vim: ts=4
