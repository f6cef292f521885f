use thiserror::Error;

/// Errors surfaced by the external highlighting engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
	/// The engine could not be loaded or did not expose its entry point.
	#[error("engine failed to load: {0}")]
	Load(String),
	/// The engine failed to process one request.
	#[error("highlighting failed: {0}")]
	Highlight(String),
}

/// Synchronous highlighting engine hosted inside a worker after init.
///
/// The returned markup obeys the contract consumed by
/// [`spectro_markup::ranges_from_markup`]: `<span class="...">`/`</span>`
/// tags only, properly nested, text entity-escaped. Beyond that the engine
/// is an opaque black box.
pub trait HighlightEngine: Send {
	fn highlight(&self, language: &str, code: &str) -> Result<String, EngineError>;
}

/// Resolves a [`HighlightEngine`] from the URL carried by an init request.
///
/// Injected at service construction; each worker loads its own engine
/// instance so no engine state is ever shared across threads.
pub trait EngineLoader: Send + Sync + 'static {
	fn load(&self, url: &str) -> Result<Box<dyn HighlightEngine>, EngineError>;
}
