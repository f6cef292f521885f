use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};

use spectro_markup::SyntaxLine;

use crate::engine::EngineLoader;
use crate::proto::{WorkerRequest, WorkerResponse};
use crate::report::ReportSink;
use crate::spawn::{spawn, spawn_worker_thread};
use crate::worker::{WorkerId, run_worker};

/// Default number of pooled workers.
const DEFAULT_POOL_SIZE: usize = 3;
/// Payloads above this many characters are not highlighted.
const DEFAULT_MAX_CODE_CHARS: usize = 500_000;
/// Payloads above this many lines are not highlighted.
const DEFAULT_MAX_CODE_LINES: usize = 20_000;
/// Default deadline for joining worker threads during finalize.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for one [`HighlightService`] instance.
#[derive(Debug, Clone)]
pub struct HighlightServiceCfg {
	/// Fixed worker count, clamped to at least 1.
	pub pool_size: usize,
	/// URL each worker loads its engine from.
	pub engine_url: String,
	/// Hard upper bound on highlighted payload size, in characters.
	pub max_code_chars: usize,
	/// Hard upper bound on highlighted payload size, in lines.
	pub max_code_lines: usize,
	/// Deadline for joining worker threads in [`HighlightService::finalize`].
	pub shutdown_timeout: Duration,
}

impl Default for HighlightServiceCfg {
	fn default() -> Self {
		Self {
			pool_size: DEFAULT_POOL_SIZE,
			engine_url: String::new(),
			max_code_chars: DEFAULT_MAX_CODE_CHARS,
			max_code_lines: DEFAULT_MAX_CODE_LINES,
			shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
		}
	}
}

impl HighlightServiceCfg {
	fn clamped(mut self) -> Self {
		self.pool_size = self.pool_size.max(1);
		self
	}
}

/// Point-in-time availability snapshot of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
	/// Workers ready for a request.
	pub idle: usize,
	/// Workers processing a request (or still initializing).
	pub busy: usize,
	/// Callers queued for a free worker.
	pub queued: usize,
	/// Workers permanently retired after a failed init.
	pub retired: usize,
}

/// One worker slot in the fixed arena.
struct WorkerSlot {
	requests: Option<mpsc::UnboundedSender<WorkerRequest>>,
	thread: Option<std::thread::JoinHandle<()>>,
	retired: bool,
}

/// Pool bookkeeping. Mutated only under the service mutex, in direct
/// response to a caller await or a worker response.
struct PoolState {
	slots: Vec<WorkerSlot>,
	idle: VecDeque<WorkerId>,
	busy: HashSet<WorkerId>,
	wait_queue: VecDeque<oneshot::Sender<()>>,
	result_waiters: HashMap<WorkerId, oneshot::Sender<Vec<SyntaxLine>>>,
	finalized: bool,
}

impl PoolState {
	/// Returns true while at least one worker can still serve requests.
	fn has_live_workers(&self) -> bool {
		self.slots.iter().any(|slot| !slot.retired)
	}

	/// Moves a worker from busy back to idle and wakes one queued caller.
	fn release(&mut self, id: WorkerId) {
		self.busy.remove(&id);
		self.idle.push_back(id);
		if let Some(waiter) = self.wait_queue.pop_front() {
			let _ = waiter.send(());
		}
	}

	/// Permanently removes a worker from rotation after a failed init.
	///
	/// Dropping its request sender lets the thread exit; if no live worker
	/// remains, queued callers are woken into the unavailable path.
	fn retire(&mut self, id: WorkerId) {
		self.busy.remove(&id);
		let slot = &mut self.slots[id.index()];
		slot.retired = true;
		slot.requests = None;
		if !self.has_live_workers() {
			self.wait_queue.clear();
		}
	}
}

/// Bounded pool of background highlight workers with FIFO backpressure.
///
/// Construction spawns every worker and sends each an init request loading
/// the engine; a worker first becomes available once its init
/// acknowledgment arrives. At most one request is ever in flight per
/// worker; callers beyond the pool size queue FIFO. Completion order across
/// workers follows whichever finishes first, not submission order.
///
/// The pool is torn down exactly once with [`Self::finalize`]; the service
/// never recreates workers.
pub struct HighlightService {
	cfg: HighlightServiceCfg,
	state: Arc<Mutex<PoolState>>,
}

impl HighlightService {
	/// Creates the pool, spawning `cfg.pool_size` workers and initializing
	/// each with `cfg.engine_url`.
	pub fn new(cfg: HighlightServiceCfg, loader: Arc<dyn EngineLoader>, sink: Arc<dyn ReportSink>) -> Self {
		let cfg = cfg.clamped();
		let (response_tx, response_rx) = mpsc::unbounded_channel();
		let mut slots = Vec::with_capacity(cfg.pool_size);
		let mut busy = HashSet::new();
		for index in 0..cfg.pool_size {
			let id = WorkerId(index);
			let (request_tx, request_rx) = mpsc::unbounded_channel();
			let loader = Arc::clone(&loader);
			let responses = response_tx.clone();
			match spawn_worker_thread(format!("spectro-highlight-{index}"), move || {
				run_worker(id, loader, request_rx, responses);
			}) {
				Ok(handle) => {
					// Workers start busy; the init acknowledgment is their
					// first trip to idle.
					let _ = request_tx.send(WorkerRequest::Init {
						url: cfg.engine_url.clone(),
					});
					busy.insert(id);
					slots.push(WorkerSlot {
						requests: Some(request_tx),
						thread: Some(handle),
						retired: false,
					});
				}
				Err(err) => {
					tracing::warn!(worker = index, error = %err, "highlight.worker_spawn_failed");
					sink.report_error("highlight worker spawn", &err.to_string());
					slots.push(WorkerSlot {
						requests: None,
						thread: None,
						retired: true,
					});
				}
			}
		}
		drop(response_tx);

		let state = Arc::new(Mutex::new(PoolState {
			slots,
			idle: VecDeque::new(),
			busy,
			wait_queue: VecDeque::new(),
			result_waiters: HashMap::new(),
			finalized: false,
		}));
		spawn(dispatch(Arc::downgrade(&state), sink, response_rx));
		Self { cfg, state }
	}

	/// Highlights `code` as `language`, resolving to per-line ranges.
	///
	/// Resolves to an empty result without consuming a worker slot when the
	/// code is empty or oversized, and degrades to empty (after reporting)
	/// when the worker signals a failure. Never errors: a broken highlight
	/// only loses highlighting for that one payload.
	pub async fn highlight(&self, language: &str, code: &str) -> Vec<SyntaxLine> {
		if !self.within_limits(code) {
			return Vec::new();
		}
		let Some(id) = self.acquire().await else {
			return Vec::new();
		};
		let receiver = {
			let mut state = self.state.lock().await;
			let sender = match state.slots[id.index()].requests.clone() {
				Some(sender) if !state.finalized => sender,
				// Torn down between acquisition and send.
				_ => return Vec::new(),
			};
			let (tx, rx) = oneshot::channel();
			state.result_waiters.insert(id, tx);
			let request = WorkerRequest::Highlight {
				language: language.to_string(),
				code: code.to_string(),
			};
			if sender.send(request).is_err() {
				// The worker thread is gone; nothing will ever answer.
				state.result_waiters.remove(&id);
				state.retire(id);
				return Vec::new();
			}
			rx
		};
		receiver.await.unwrap_or_default()
	}

	/// Tears the pool down: terminates every worker and drains all queues.
	///
	/// Safe to call more than once; only the first call does any work.
	/// Callers suspended waiting for a worker resolve empty, as do callers
	/// whose request was in flight. Afterwards [`Self::highlight`] resolves
	/// empty immediately.
	pub async fn finalize(&self) {
		let (threads, waiters) = {
			let mut state = self.state.lock().await;
			if state.finalized {
				return;
			}
			state.finalized = true;
			let mut threads = Vec::new();
			for slot in &mut state.slots {
				slot.requests = None;
				if let Some(handle) = slot.thread.take() {
					threads.push(handle);
				}
			}
			state.idle.clear();
			state.busy.clear();
			state.result_waiters.clear();
			(threads, std::mem::take(&mut state.wait_queue))
		};
		// Dropping the queued resolvers wakes every suspended caller into
		// the unavailable path; the cleared result waiters resolve pending
		// calls empty.
		drop(waiters);

		let joiner = tokio::task::spawn_blocking(move || {
			for thread in threads {
				let _ = thread.join();
			}
		});
		if tokio::time::timeout(self.cfg.shutdown_timeout, joiner).await.is_err() {
			tracing::warn!(timeout = ?self.cfg.shutdown_timeout, "highlight.finalize_join_timeout");
		}
	}

	/// Returns a point-in-time availability snapshot.
	pub async fn status(&self) -> PoolStatus {
		let state = self.state.lock().await;
		PoolStatus {
			idle: state.idle.len(),
			busy: state.busy.len(),
			queued: state.wait_queue.len(),
			retired: state.slots.iter().filter(|slot| slot.retired).count(),
		}
	}

	/// Acquires an idle worker, waiting FIFO when none is free.
	///
	/// Returns `None` once the pool is finalized (including while waiting)
	/// or when no live worker remains.
	async fn acquire(&self) -> Option<WorkerId> {
		loop {
			let waiter = {
				let mut state = self.state.lock().await;
				if state.finalized || !state.has_live_workers() {
					return None;
				}
				if let Some(id) = state.idle.pop_front() {
					state.busy.insert(id);
					return Some(id);
				}
				let (tx, rx) = oneshot::channel();
				state.wait_queue.push_back(tx);
				rx
			};
			// Woken by a release or a teardown; re-check rather than assume
			// a worker is available, since another caller may have won it.
			let _ = waiter.await;
		}
	}

	/// Applies the empty/oversize admission guards.
	fn within_limits(&self, code: &str) -> bool {
		if code.is_empty() {
			return false;
		}
		if code.chars().take(self.cfg.max_code_chars + 1).count() > self.cfg.max_code_chars {
			tracing::debug!(limit = self.cfg.max_code_chars, "highlight.skip_oversize_chars");
			return false;
		}
		let lines = code.as_bytes().iter().filter(|&&byte| byte == b'\n').count() + 1;
		if lines > self.cfg.max_code_lines {
			tracing::debug!(limit = self.cfg.max_code_lines, "highlight.skip_oversize_lines");
			return false;
		}
		true
	}
}

/// Pool-level response handler: resolves result waiters, recycles workers,
/// and wakes queued callers.
///
/// Holds only a weak reference to the pool state so a dropped service tears
/// itself down: state drops, request channels close, workers exit, the
/// response channel closes, and this task ends.
async fn dispatch(state: Weak<Mutex<PoolState>>, sink: Arc<dyn ReportSink>, mut responses: mpsc::UnboundedReceiver<(WorkerId, WorkerResponse)>) {
	while let Some((id, response)) = responses.recv().await {
		let Some(state) = state.upgrade() else {
			break;
		};
		let mut state = state.lock().await;
		if state.finalized {
			continue;
		}
		match state.result_waiters.remove(&id) {
			Some(waiter) => {
				let ranges = match response.error {
					Some(message) => {
						tracing::warn!(worker = id.index(), error = %message, "highlight.request_failed");
						sink.report_error("syntax highlighting", &message);
						Vec::new()
					}
					None => response.ranges,
				};
				let _ = waiter.send(ranges);
				state.release(id);
			}
			// No waiter registered: the worker's init acknowledgment.
			None => match response.error {
				Some(message) => {
					tracing::warn!(worker = id.index(), error = %message, "highlight.init_failed");
					sink.report_error("highlight engine init", &message);
					state.retire(id);
				}
				None => state.release(id),
			},
		}
	}
	tracing::trace!("highlight.dispatch_exit");
}
