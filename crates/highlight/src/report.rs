/// Fire-and-forget sink for worker-reported errors.
///
/// The pool never depends on the sink's return value or availability: a
/// failed highlight is reported here and the caller still resolves with an
/// empty result.
pub trait ReportSink: Send + Sync + 'static {
	fn report_error(&self, context: &str, message: &str);
}

/// Default sink that forwards reports to the tracing backbone.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
	fn report_error(&self, context: &str, message: &str) {
		tracing::error!(context, error = message, "highlight.worker_error");
	}
}
