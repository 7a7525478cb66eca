use std::{
	path::PathBuf,
	time::{Duration, Instant},
};

use crate::{
	Message, Model, Response, Role,
	artifact::{self, Artifact, ContentUnit},
	config::AppConfig,
	error::{Error, Result},
	remote::Generate,
	staging::StagingArea,
	transcript::Transcript,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
	/// No round-trip has completed yet. A failed first question still leaves us here.
	Empty,
	Active,
}

/// Everything one user accumulates between startup and teardown. Handlers get it by `&mut`; dropping it ends the session.
#[derive(Debug)]
pub struct Session {
	transcript: Transcript,
	staging: StagingArea,
	artifact: Option<Artifact>,
	model: Model,
	timeout: Duration,
}

impl Session {
	pub fn new(staging_dir: impl Into<PathBuf>, model: Model, timeout: Duration) -> Self {
		Self {
			transcript: Transcript::new(),
			staging: StagingArea::new(staging_dir),
			artifact: None,
			model,
			timeout,
		}
	}

	pub fn from_config(config: &AppConfig) -> Self {
		Self::new(&config.staging_dir, config.model, config.timeout)
	}

	pub fn transcript(&self) -> &Transcript {
		&self.transcript
	}

	pub fn model(&self) -> Model {
		self.model
	}

	pub fn artifact(&self) -> Option<&Artifact> {
		self.artifact.as_ref()
	}

	pub fn state(&self) -> SessionState {
		match self.transcript.display_log().iter().any(|t| t.role == Role::Model) {
			true => SessionState::Active,
			false => SessionState::Empty,
		}
	}

	pub fn render_transcript(&self) -> String {
		self.transcript.render()
	}

	/// One chat round. The user turn is recorded before the call and stays recorded if the call fails.
	pub async fn submit_turn<B: Generate>(&mut self, backend: &B, user_text: &str) -> Result<Response> {
		self.transcript.append_turn(Role::User, user_text);
		let started = Instant::now();

		let text = self.call(backend, self.transcript.current_history()).await.inspect_err(|e| {
			tracing::error!("Error generating response: {e}");
		})?;

		self.transcript.append_turn(Role::Model, text.clone());
		Ok(Response::new(text, started.elapsed()))
	}

	/// Plain prompt, outside of the transcript.
	pub async fn ask_text<B: Generate>(&self, backend: &B, prompt: &str) -> Result<Response> {
		let started = Instant::now();
		let text = self.call(backend, &[Message::text(Role::User, prompt)]).await?;
		Ok(Response::new(text, started.elapsed()))
	}

	/// Replaces whatever was staged with this upload and classifies it.
	///
	/// An unsupported type still gets staged and returned; it is [ask_about](Self::ask_about) that refuses it.
	pub fn upload(&mut self, bytes: &[u8], filename: &str) -> Result<Artifact> {
		self.artifact = None;
		let path = self.staging.replace(bytes, filename)?;
		let artifact = artifact::classify(&path);
		tracing::info!(path = %path.display(), mime_type = artifact.mime_label(), category = %artifact.category, "classified upload");
		self.artifact = Some(artifact.clone());
		Ok(artifact)
	}

	/// Asks `question` about the staged upload. Not recorded in the transcript.
	pub async fn ask_about<B: Generate>(&self, backend: &B, question: &str) -> Result<Response> {
		let artifact = self.artifact.as_ref().ok_or_else(|| {
			Error::io(
				self.staging.dir(),
				std::io::Error::new(std::io::ErrorKind::NotFound, "no file has been uploaded"),
			)
		})?;
		let unit = artifact::build_content_unit(artifact)?;

		let started = Instant::now();
		let message = Message::new(Role::User, vec![ContentUnit::text(question), unit]);
		let text = self.call(backend, std::slice::from_ref(&message)).await?;
		Ok(Response::new(text, started.elapsed()))
	}

	async fn call<B: Generate>(&self, backend: &B, contents: &[Message]) -> Result<String> {
		match tokio::time::timeout(self.timeout, backend.generate(self.model.id(), contents)).await {
			Ok(result) => result,
			Err(_) => Err(Error::Transient(format!("no response within {:?}", self.timeout))),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::{collections::VecDeque, future::Future, sync::Mutex};

	use super::*;

	/// Replays canned results and records what it was asked.
	#[derive(Default)]
	struct Scripted {
		replies: Mutex<VecDeque<Result<String>>>,
		calls: Mutex<Vec<Vec<Message>>>,
	}
	impl Scripted {
		fn with(replies: Vec<Result<String>>) -> Self {
			Self {
				replies: Mutex::new(replies.into()),
				calls: Mutex::default(),
			}
		}

		fn calls(&self) -> Vec<Vec<Message>> {
			self.calls.lock().unwrap().clone()
		}
	}
	impl Generate for Scripted {
		fn generate(&self, _model: &str, contents: &[Message]) -> impl Future<Output = Result<String>> + Send {
			self.calls.lock().unwrap().push(contents.to_vec());
			let reply = self.replies.lock().unwrap().pop_front().unwrap_or_else(|| Err(Error::Remote("script exhausted".to_owned())));
			async move { reply }
		}
	}

	struct Slow;
	impl Generate for Slow {
		fn generate(&self, _model: &str, _contents: &[Message]) -> impl Future<Output = Result<String>> + Send {
			async {
				tokio::time::sleep(Duration::from_secs(30)).await;
				Ok("too late".to_owned())
			}
		}
	}

	fn session(dir: &std::path::Path) -> Session {
		Session::new(dir.join("files"), Model::Medium, Duration::from_secs(5))
	}

	fn roles_and_texts(session: &Session) -> Vec<(Role, String)> {
		session.transcript().display_log().iter().map(|t| (t.role, t.text.clone())).collect()
	}

	#[tokio::test]
	async fn successful_round_trip_records_both_turns() {
		let tmp = tempfile::tempdir().unwrap();
		let mut s = session(tmp.path());
		assert_eq!(s.state(), SessionState::Empty);

		let backend = Scripted::with(vec![Ok("4".to_owned()), Ok("8".to_owned())]);
		let r = s.submit_turn(&backend, "What is 2+2?").await.unwrap();
		assert_eq!(r.text, "4");
		assert_eq!(s.state(), SessionState::Active);
		assert_eq!(roles_and_texts(&s), vec![(Role::User, "What is 2+2?".to_owned()), (Role::Model, "4".to_owned())]);

		s.submit_turn(&backend, "And doubled?").await.unwrap();
		let calls = backend.calls();
		assert_eq!(calls.len(), 2);
		// the second call replays the first exchange, then the new question
		let second: Vec<(Role, String)> = calls[1].iter().map(|m| (m.role, m.joined_text())).collect();
		assert_eq!(second, vec![
			(Role::User, "What is 2+2?".to_owned()),
			(Role::Model, "4".to_owned()),
			(Role::User, "And doubled?".to_owned()),
		]);
		assert_eq!(s.transcript().len(), 4);
		assert_eq!(s.transcript().current_history().len(), 4);
	}

	#[tokio::test]
	async fn remote_failure_leaves_dangling_user_turn() {
		let tmp = tempfile::tempdir().unwrap();
		let mut s = session(tmp.path());
		let backend = Scripted::with(vec![Ok("hi".to_owned()), Err(Error::Remote("upstream exploded".to_owned()))]);

		s.submit_turn(&backend, "hello").await.unwrap();
		let err = s.submit_turn(&backend, "still there?").await.unwrap_err();

		assert!(matches!(err, Error::Remote(_)));
		assert_eq!(s.transcript().len(), 3);
		assert_eq!(s.transcript().current_history().len(), 3);
		assert_eq!(s.transcript().last().unwrap(), &crate::Turn {
			role: Role::User,
			text: "still there?".to_owned()
		});
		assert_eq!(s.state(), SessionState::Active);
	}

	#[tokio::test]
	async fn failed_first_turn_stays_empty() {
		let tmp = tempfile::tempdir().unwrap();
		let mut s = session(tmp.path());
		let backend = Scripted::with(vec![Err(Error::Remote("nope".to_owned()))]);

		assert!(s.submit_turn(&backend, "anyone?").await.is_err());
		assert_eq!(s.state(), SessionState::Empty);
		assert_eq!(s.transcript().len(), 1);
	}

	#[tokio::test]
	async fn timeout_is_transient() {
		let tmp = tempfile::tempdir().unwrap();
		let mut s = Session::new(tmp.path().join("files"), Model::Fast, Duration::from_millis(20));

		let err = s.submit_turn(&Slow, "hurry").await.unwrap_err();
		assert!(err.is_retryable());
		assert_eq!(s.transcript().len(), 1);
	}

	#[tokio::test]
	async fn unsupported_upload_never_reaches_backend() {
		let tmp = tempfile::tempdir().unwrap();
		let mut s = session(tmp.path());
		let backend = Scripted::with(vec![Ok("should not be used".to_owned())]);

		let artifact = s.upload(b"MZ\x90\x00", "setup.exe").unwrap();
		assert_eq!(artifact.category, crate::Category::Unsupported);

		let err = s.ask_about(&backend, "what does this do?").await.unwrap_err();
		assert!(err.to_string().contains("application/x-msdownload"));
		assert!(backend.calls().is_empty());
	}

	#[tokio::test]
	async fn document_question_sends_question_then_blob() {
		let tmp = tempfile::tempdir().unwrap();
		let mut s = session(tmp.path());
		let backend = Scripted::with(vec![Ok("three lines".to_owned())]);

		s.upload(b"one\ntwo\nthree\n", "lines.txt").unwrap();
		let r = s.ask_about(&backend, "How many lines?").await.unwrap();
		assert_eq!(r.text, "three lines");

		let calls = backend.calls();
		assert_eq!(calls.len(), 1);
		let parts = &calls[0][0].parts;
		assert_eq!(parts[0].as_text(), Some("How many lines?"));
		assert!(matches!(&parts[1], ContentUnit::Blob { mime_type, data } if mime_type == "text/plain" && data == b"one\ntwo\nthree\n"));
		assert!(s.transcript().is_empty());
	}

	#[tokio::test]
	async fn ask_about_without_upload_is_io_error() {
		let tmp = tempfile::tempdir().unwrap();
		let s = session(tmp.path());
		let backend = Scripted::default();
		assert!(matches!(s.ask_about(&backend, "?").await, Err(Error::Io { .. })));
		assert!(backend.calls().is_empty());
	}

	#[tokio::test]
	async fn new_upload_replaces_previous_artifact() {
		let tmp = tempfile::tempdir().unwrap();
		let mut s = session(tmp.path());

		let first = s.upload(b"a", "a.md").unwrap();
		let second = s.upload(b"b", "b.pdf").unwrap();
		assert!(!first.path.exists());
		assert_eq!(s.artifact(), Some(&second));
		assert_eq!(std::fs::read_dir(tmp.path().join("files")).unwrap().count(), 1);
	}
}
