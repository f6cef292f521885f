use std::future::Future;
use std::sync::OnceLock;

use tokio::task::JoinHandle;

fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("spectro-coordinator")
			.build()
			.expect("failed to build spectro global tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns a coordinator task on the ambient runtime, falling back to a
/// process-wide runtime when called outside of one.
pub(crate) fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!("highlight.spawn");
	runtime_handle().spawn(fut)
}

/// Spawns a dedicated named OS thread for CPU-bound highlight work.
pub(crate) fn spawn_worker_thread<F>(name: impl Into<String>, f: F) -> std::io::Result<std::thread::JoinHandle<()>>
where
	F: FnOnce() + Send + 'static,
{
	let name = name.into();
	tracing::trace!(thread = %name, "highlight.spawn_worker_thread");
	std::thread::Builder::new().name(name).spawn(f)
}
