//! Deferred work.
//!
//! Instances schedule their `initialize` step here instead of running it during construction.
//! On `wasm32`, the queue drains itself from a microtask. Headless hosts call [`flush`] whenever
//! the equivalent of "the current tick ended" happens.

use core::cell::RefCell;
use std::collections::VecDeque;
use tracing::trace;

type Task = Box<dyn FnOnce()>;

thread_local! {
	static QUEUE: RefCell<VecDeque<Task>> = RefCell::new(VecDeque::new());
}

#[cfg(target_arch = "wasm32")]
thread_local! {
	static FLUSH_SCHEDULED: core::cell::Cell<bool> = core::cell::Cell::new(false);
}

/// Runs `task` after the current synchronous work, in FIFO order with other deferred tasks.
pub fn defer(task: impl 'static + FnOnce()) {
	QUEUE.with(|queue| queue.borrow_mut().push_back(Box::new(task)));
	#[cfg(target_arch = "wasm32")]
	schedule_flush();
}

/// Runs deferred tasks until none are left, including ones queued by the tasks themselves.
///
/// Returns how many tasks ran.
pub fn flush() -> usize {
	let mut count = 0;
	loop {
		// The borrow must end before the task runs, since tasks may defer more work.
		let task = QUEUE.with(|queue| queue.borrow_mut().pop_front());
		match task {
			Some(task) => {
				task();
				count += 1;
			}
			None => break,
		}
	}
	if count > 0 {
		trace!("Flushed {} deferred task(s).", count);
	}
	count
}

#[must_use]
pub fn pending() -> usize {
	QUEUE.with(|queue| queue.borrow().len())
}

#[cfg(target_arch = "wasm32")]
fn schedule_flush() {
	if FLUSH_SCHEDULED.with(|scheduled| scheduled.replace(true)) {
		return;
	}
	wasm_bindgen_futures::spawn_local(async {
		FLUSH_SCHEDULED.with(|scheduled| scheduled.set(false));
		flush();
	});
}
