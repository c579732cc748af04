//! Render clients used by the delivery worker

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::fmt::Debug;
use std::time::Duration;

use crate::prelude::*;

/// Longest error body quoted in a render failure
const MAX_ERROR_BODY: usize = 200;

#[async_trait]
pub trait RenderClient: Debug + Send + Sync {
	/// Fetch the HTML body of message `id`, authorized by its capability key
	async fn render(&self, app: &App, id: MsgId, key: &str) -> ClResult<String>;
}

/// Calls the render gateway in process
#[derive(Debug, Default)]
pub struct LocalRenderClient;

#[async_trait]
impl RenderClient for LocalRenderClient {
	async fn render(&self, app: &App, id: MsgId, key: &str) -> ClResult<String> {
		match crate::render::render(app, id, key).await {
			Ok(rendered) => Ok(rendered.html),
			Err(Error::NotFound) => Err(Error::Render(format!("message {} not found", id))),
			Err(err) => Err(err),
		}
	}
}

/// Calls the render endpoint over HTTP
pub struct HttpRenderClient {
	base_url: Box<str>,
	timeout: Duration,
	client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
}

impl Debug for HttpRenderClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HttpRenderClient")
			.field("base_url", &self.base_url)
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

impl HttpRenderClient {
	/// `base_url` must end with `/`
	pub fn new(base_url: &str, timeout: Duration) -> ClResult<Self> {
		let connector = HttpsConnectorBuilder::new()
			.with_native_roots()
			.map_err(|e| Error::ConfigError(format!("TLS error: {}", e)))?
			.https_or_http()
			.enable_http1()
			.build();
		let client = Client::builder(TokioExecutor::new()).build(connector);

		Ok(Self { base_url: base_url.into(), timeout, client })
	}

	async fn fetch(&self, uri: &str) -> ClResult<String> {
		let request = hyper::Request::builder()
			.method(hyper::Method::GET)
			.uri(uri)
			.header("Accept", "text/html")
			.body(Empty::new())
			.map_err(|e| Error::Render(format!("Request build error: {}", e)))?;

		let response = self
			.client
			.request(request)
			.await
			.map_err(|e| Error::Render(format!("render request failed: {}", e)))?;
		let status = response.status();
		let body = response
			.into_body()
			.collect()
			.await
			.map_err(|e| Error::Render(format!("render response failed: {}", e)))?
			.to_bytes();
		let body = String::from_utf8_lossy(&body);

		if status.is_success() {
			Ok(body.into_owned())
		} else {
			let detail: String = body.chars().take(MAX_ERROR_BODY).collect();
			Err(Error::Render(format!("render endpoint returned {}: {}", status, detail)))
		}
	}
}

#[async_trait]
impl RenderClient for HttpRenderClient {
	async fn render(&self, _app: &App, id: MsgId, key: &str) -> ClResult<String> {
		let uri = crate::render::browser_url(&self.base_url, id, key);
		match tokio::time::timeout(self.timeout, self.fetch(&uri)).await {
			Ok(res) => res,
			Err(_) => Err(Error::Render(format!("render request timed out after {:?}", self.timeout))),
		}
	}
}

// vim: ts=4
