use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;

use spectro_markup::ranges_from_markup;

use crate::engine::{EngineLoader, HighlightEngine};
use crate::proto::{WorkerRequest, WorkerResponse};

/// Index of one worker slot in the pool arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub(crate) usize);

impl WorkerId {
	/// Returns the slot index.
	pub const fn index(self) -> usize {
		self.0
	}
}

/// Runs one worker's request loop until its channel closes.
///
/// The worker owns at most one engine instance and shares no state with the
/// coordinator; requests arrive FIFO and every one produces exactly one
/// response. Failures of any kind (engine load, highlighting, markup
/// reconstruction, panics) travel back as response data, never as unwound
/// panics, so the loop survives every request.
pub(crate) fn run_worker(
	id: WorkerId,
	loader: Arc<dyn EngineLoader>,
	mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
	responses: mpsc::UnboundedSender<(WorkerId, WorkerResponse)>,
) {
	let mut engine: Option<Box<dyn HighlightEngine>> = None;
	while let Some(request) = requests.blocking_recv() {
		let response = match request {
			WorkerRequest::Init { url } => match loader.load(&url) {
				Ok(loaded) => {
					engine = Some(loaded);
					WorkerResponse::success(Vec::new())
				}
				Err(err) => WorkerResponse::failure(err.to_string()),
			},
			WorkerRequest::Highlight { language, code } => run_request(engine.as_deref(), &language, &code),
		};
		if responses.send((id, response)).is_err() {
			break;
		}
	}
	tracing::trace!(worker = id.index(), "highlight.worker_exit");
}

/// Executes one highlight request against the loaded engine.
fn run_request(engine: Option<&dyn HighlightEngine>, language: &str, code: &str) -> WorkerResponse {
	let Some(engine) = engine else {
		return WorkerResponse::failure("highlight request before engine init");
	};
	let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<_, String> {
		let markup = engine.highlight(language, code).map_err(|err| err.to_string())?;
		ranges_from_markup(&markup).map_err(|err| err.to_string())
	}));
	match outcome {
		Ok(Ok(ranges)) => WorkerResponse::success(ranges),
		Ok(Err(message)) => WorkerResponse::failure(message),
		Err(_) => WorkerResponse::failure("panic while highlighting"),
	}
}

#[cfg(test)]
mod tests {
	use spectro_markup::SyntaxRange;

	use crate::engine::EngineError;

	use super::*;

	struct FixedLoader(&'static str);

	impl EngineLoader for FixedLoader {
		fn load(&self, _url: &str) -> Result<Box<dyn HighlightEngine>, EngineError> {
			Ok(Box::new(FixedEngine(self.0)))
		}
	}

	/// Engine that answers every request with the same markup.
	struct FixedEngine(&'static str);

	impl HighlightEngine for FixedEngine {
		fn highlight(&self, _language: &str, _code: &str) -> Result<String, EngineError> {
			Ok(self.0.to_string())
		}
	}

	struct PanickingLoader;

	impl EngineLoader for PanickingLoader {
		fn load(&self, _url: &str) -> Result<Box<dyn HighlightEngine>, EngineError> {
			Ok(Box::new(PanickingEngine))
		}
	}

	struct PanickingEngine;

	impl HighlightEngine for PanickingEngine {
		fn highlight(&self, _language: &str, _code: &str) -> Result<String, EngineError> {
			panic!("engine blew up");
		}
	}

	fn run(loader: Arc<dyn EngineLoader>, requests: Vec<WorkerRequest>) -> Vec<WorkerResponse> {
		let (request_tx, request_rx) = mpsc::unbounded_channel();
		let (response_tx, mut response_rx) = mpsc::unbounded_channel();
		for request in requests {
			request_tx.send(request).unwrap();
		}
		drop(request_tx);
		run_worker(WorkerId(0), loader, request_rx, response_tx);
		let mut responses = Vec::new();
		while let Ok((_, response)) = response_rx.try_recv() {
			responses.push(response);
		}
		responses
	}

	fn init() -> WorkerRequest {
		WorkerRequest::Init { url: "engine.js".into() }
	}

	fn highlight(code: &str) -> WorkerRequest {
		WorkerRequest::Highlight {
			language: "rust".into(),
			code: code.into(),
		}
	}

	#[test]
	fn init_acknowledges_with_empty_success() {
		let responses = run(Arc::new(FixedLoader("")), vec![init()]);
		assert_eq!(responses, vec![WorkerResponse::success(Vec::new())]);
	}

	#[test]
	fn highlight_reconstructs_engine_markup() {
		let responses = run(Arc::new(FixedLoader("ab<span class=\"kw\">cd</span>")), vec![init(), highlight("abcd")]);
		assert_eq!(responses.len(), 2);
		assert_eq!(
			responses[1],
			WorkerResponse::success(vec![spectro_markup::SyntaxLine {
				ranges: vec![SyntaxRange::new(2, 2, "kw")],
			}])
		);
	}

	#[test]
	fn request_before_init_fails_as_data() {
		let responses = run(Arc::new(FixedLoader("")), vec![highlight("abcd")]);
		assert_eq!(responses[0].error.as_deref(), Some("highlight request before engine init"));
	}

	#[test]
	fn malformed_engine_markup_fails_as_data() {
		let responses = run(Arc::new(FixedLoader("<span class=\"kw\">never closed")), vec![init(), highlight("x")]);
		assert!(responses[1].error.as_deref().unwrap().contains("never closed"));
		assert!(responses[1].ranges.is_empty());
	}

	#[test]
	fn engine_panic_fails_as_data_and_loop_survives() {
		let responses = run(Arc::new(PanickingLoader), vec![init(), highlight("x"), highlight("y")]);
		assert_eq!(responses.len(), 3);
		assert_eq!(responses[1].error.as_deref(), Some("panic while highlighting"));
		assert_eq!(responses[2].error.as_deref(), Some("panic while highlighting"));
	}
}
