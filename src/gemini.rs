use std::future::Future;

use reqwest::{
	Client, StatusCode,
	header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde::{Deserialize, Serialize};

use crate::{
	Message, Role,
	error::{Error, Result},
	remote::Generate,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// wire types {{{
/// Content container used in both requests and responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
	#[serde(default)]
	pub parts: Vec<Part>,
}

/// Variant order matters for `#[serde(untagged)]` decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
	Text {
		text: String,
	},
	InlineData {
		#[serde(rename = "inlineData")]
		inline_data: InlineData,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
	pub mime_type: String,
	pub data: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
	pub contents: Vec<Content>,
}
impl TryFrom<&[Message]> for GenerateContentRequest {
	type Error = Error;

	fn try_from(messages: &[Message]) -> Result<Self> {
		let mut contents = Vec::with_capacity(messages.len());
		for message in messages {
			let role = match message.role {
				Role::User => "user",
				Role::Model => "model",
			};

			let mut parts = Vec::with_capacity(message.parts.len());
			for unit in &message.parts {
				parts.push(match unit.inline_data()? {
					Some((mime_type, data)) => Part::InlineData {
						inline_data: InlineData { mime_type, data },
					},
					None => Part::Text {
						text: unit.as_text().unwrap_or_default().to_owned(),
					},
				});
			}

			contents.push(Content {
				role: Some(role.to_owned()),
				parts,
			});
		}
		Ok(Self { contents })
	}
}

impl GenerateContentRequest {
	/// `role: part, part` per content, with attachments reduced to their MIME type. Safe to log.
	pub fn shape(&self) -> Vec<String> {
		self.contents
			.iter()
			.map(|c| {
				let parts = c
					.parts
					.iter()
					.map(|p| match p {
						Part::Text { text } => format!("text({} chars)", text.chars().count()),
						Part::InlineData { inline_data } => format!("inline({}, {} b64 chars)", inline_data.mime_type, inline_data.data.len()),
					})
					.collect::<Vec<_>>()
					.join(", ");
				format!("{}: {parts}", c.role.as_deref().unwrap_or("?"))
			})
			.collect()
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
	#[serde(default)]
	pub candidates: Vec<Candidate>,
	pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
	pub content: Option<Content>,
	pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
	pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
	error: ApiError,
}
#[derive(Debug, Deserialize)]
struct ApiError {
	message: String,
	status: Option<String>,
}
//,}}}

impl GenerateContentResponse {
	/// Text parts of the first candidate, joined. Anything short of that is a [Error::Remote].
	pub fn text(&self) -> Result<String> {
		if let Some(reason) = self.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
			return Err(Error::Remote(format!("prompt was blocked: {reason}")));
		}
		let candidate = self.candidates.first().ok_or_else(|| Error::Remote("response has no candidates".to_owned()))?;
		let texts = candidate
			.content
			.iter()
			.flat_map(|c| &c.parts)
			.filter_map(|p| match p {
				Part::Text { text } => Some(text.as_str()),
				_ => None,
			})
			.collect::<Vec<&str>>();
		if texts.is_empty() {
			let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
			return Err(Error::Remote(format!("response carries no text (finish reason: {reason})")));
		}
		Ok(texts.join(""))
	}
}

#[derive(Clone, Debug)]
pub struct GeminiClient {
	http: Client,
	api_key: String,
	base_url: String,
}
impl GeminiClient {
	pub fn new(api_key: impl Into<String>) -> Self {
		Self {
			http: Client::new(),
			api_key: api_key.into(),
			base_url: DEFAULT_BASE_URL.to_owned(),
		}
	}

	pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = base_url.into();
		self
	}

	pub fn with_http_client(mut self, http: Client) -> Self {
		self.http = http;
		self
	}

	fn headers(&self) -> Result<HeaderMap> {
		let mut headers = HeaderMap::new();
		let key = HeaderValue::from_str(&self.api_key).map_err(|_| Error::Config("api key is not a valid header value".to_owned()))?;
		headers.insert(HeaderName::from_static("x-goog-api-key"), key);
		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		Ok(headers)
	}
}

impl Generate for GeminiClient {
	///docs: https://ai.google.dev/api/generate-content
	fn generate(&self, model: &str, contents: &[Message]) -> impl Future<Output = Result<String>> + Send {
		let prepared = GenerateContentRequest::try_from(contents).and_then(|payload| Ok((payload, self.headers()?)));
		let url = format!("{}/models/{model}:generateContent", self.base_url);
		let http = self.http.clone();

		async move {
			let (payload, headers) = prepared?;
			tracing::info!(%url, turns = payload.contents.len(), "sending generateContent");
			tracing::debug!(shape = ?payload.shape());

			let response = http.post(&url).headers(headers).json(&payload).send().await.map_err(transport_error)?;
			let status = response.status();
			let body = response.text().await.map_err(transport_error)?;

			if !status.is_success() {
				return Err(status_error(status, &body));
			}

			let parsed = serde_json::from_str::<GenerateContentResponse>(&body).map_err(|e| {
				tracing::error!(%body, "failed to parse generateContent response");
				Error::Remote(format!("unreadable response: {e}"))
			})?;
			parsed.text()
		}
	}
}

fn transport_error(e: reqwest::Error) -> Error {
	match e.is_timeout() || e.is_connect() {
		true => Error::Transient(e.to_string()),
		false => Error::Remote(e.to_string()),
	}
}

fn status_error(status: StatusCode, body: &str) -> Error {
	let message = match serde_json::from_str::<ApiErrorEnvelope>(body) {
		Ok(env) => format!("{status} {}: {}", env.error.status.unwrap_or_default(), env.error.message),
		Err(_) => format!("{status}: {body}"),
	};
	tracing::error!(%message, "generateContent failed");
	match status {
		StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => Error::Transient(message),
		_ => Error::Remote(message),
	}
}
