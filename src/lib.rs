use std::time::Duration;

pub mod artifact;
pub mod blocking;
pub mod config;
pub mod error;
pub mod gemini;
pub mod remote;
pub mod session;
pub mod staging;
pub mod transcript;

pub use artifact::{Artifact, Category, ContentUnit};
pub use error::{Error, Result};
pub use gemini::GeminiClient;
pub use remote::{Generate, StubBackend};
pub use session::{Session, SessionState};
pub use transcript::{Transcript, Turn};

/// Ask a single question, no history.
pub async fn oneshot<B: Generate, T: AsRef<str>>(backend: &B, message: T, model: Model) -> Result<Response> {
	let started = std::time::Instant::now();
	let text = backend.generate(model.id(), &[Message::text(Role::User, message.as_ref())]).await?;
	Ok(Response::new(text, started.elapsed()))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, derive_more::FromStr)]
pub enum Model {
	Fast,
	#[default]
	Medium,
	Slow,
}
impl Model {
	/// ref: https://ai.google.dev/gemini-api/docs/models
	pub fn id(&self) -> &'static str {
		match self {
			Self::Fast => "gemini-2.0-flash-lite",
			Self::Medium => "gemini-2.0-flash",
			Self::Slow => "gemini-2.5-pro",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
	User,
	Model,
}
impl Role {
	/// Label used when printing a transcript.
	pub fn label(&self) -> &'static str {
		match self {
			Self::User => "user",
			Self::Model => "bot",
		}
	}
}

/// One role-tagged entry of a request's `contents`.
#[derive(Clone, Debug)]
pub struct Message {
	pub role: Role,
	pub parts: Vec<ContentUnit>,
}
impl Message {
	pub fn new(role: Role, parts: Vec<ContentUnit>) -> Self {
		Self { role, parts }
	}

	pub fn text<T: Into<String>>(role: Role, text: T) -> Self {
		Self::new(role, vec![ContentUnit::text(text)])
	}

	/// Concatenation of the text spans, ignoring attachments.
	pub fn joined_text(&self) -> String {
		self.parts.iter().filter_map(ContentUnit::as_text).collect::<Vec<_>>().join("\n")
	}
}

#[derive(Debug, derive_new::new)]
pub struct Response {
	pub text: String,
	pub elapsed: Duration,
}
impl std::fmt::Display for Response {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Output:\n{}\nTime taken: {} seconds", self.text, self.elapsed.as_secs_f64())
	}
}
