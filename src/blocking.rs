//! Synchronous wrappers, for callers without a runtime of their own.

use crate::{Error, Generate, Model, Response, Result, Session};

fn runtime() -> Result<tokio::runtime::Runtime> {
	tokio::runtime::Runtime::new().map_err(|e| Error::Transient(format!("cannot start runtime: {e}")))
}

pub fn oneshot<B: Generate, T: AsRef<str>>(backend: &B, message: T, model: Model) -> Result<Response> {
	runtime()?.block_on(crate::oneshot(backend, message, model))
}

pub fn submit_turn<B: Generate>(session: &mut Session, backend: &B, user_text: &str) -> Result<Response> {
	runtime()?.block_on(session.submit_turn(backend, user_text))
}

pub fn ask_about<B: Generate>(session: &Session, backend: &B, question: &str) -> Result<Response> {
	runtime()?.block_on(session.ask_about(backend, question))
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::{SessionState, StubBackend};

	#[test]
	fn chat_without_async_caller() {
		let tmp = tempfile::tempdir().unwrap();
		let mut session = Session::new(tmp.path().join("files"), Model::Fast, Duration::from_secs(5));

		let r = submit_turn(&mut session, &StubBackend, "ping").unwrap();
		assert!(r.text.contains("ping"));
		assert_eq!(session.state(), SessionState::Active);

		session.upload(b"hello", "hello.txt").unwrap();
		let r = ask_about(&session, &StubBackend, "what is it?").unwrap();
		assert!(r.text.contains("1 attachment(s)"));
	}
}
