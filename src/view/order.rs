//! Attach ordering across views.
//!
//! Every view takes a [`Ticket`] when it's constructed. Its attach job may become ready at any later
//! point, for example once a template was fetched, but jobs only ever run in ticket order.

use core::cell::RefCell;
use std::collections::VecDeque;
use tracing::{error, trace};

type Job = Box<dyn FnOnce()>;

/// A place in the attach queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

#[derive(Default)]
struct AttachQueue {
	/// Ticket number of the front slot.
	front: u64,
	slots: VecDeque<Option<Job>>,
	/// Set while jobs run, so that jobs readying other tickets don't recurse.
	draining: bool,
}

thread_local! {
	static QUEUE: RefCell<AttachQueue> = RefCell::new(AttachQueue::default());
}

/// Takes the next ticket.
pub fn enqueue() -> Ticket {
	QUEUE.with(|queue| {
		let mut queue = queue.borrow_mut();
		let ticket = Ticket(queue.front + queue.slots.len() as u64);
		queue.slots.push_back(None);
		trace!(ticket = ticket.0, "Enqueued attach ticket.");
		ticket
	})
}

/// Hands in `ticket`'s job and runs every job that is now at the front.
pub fn ready(ticket: Ticket, job: impl 'static + FnOnce()) {
	let drain = QUEUE.with(|queue| {
		let mut queue = queue.borrow_mut();
		let index = ticket.0.checked_sub(queue.front).and_then(|index| usize::try_from(index).ok());
		match index.and_then(|index| queue.slots.get_mut(index)) {
			Some(slot) if slot.is_none() => *slot = Some(Box::new(job)),
			_ => {
				error!(ticket = ticket.0, "Attach ticket was already used.");
				return false;
			}
		}
		!queue.draining
	});
	if drain {
		run_ready();
	}
}

fn run_ready() {
	QUEUE.with(|queue| queue.borrow_mut().draining = true);
	loop {
		// The borrow must end before the job runs.
		let job = QUEUE.with(|queue| {
			let mut queue = queue.borrow_mut();
			match queue.slots.front() {
				Some(Some(_)) => {
					queue.front += 1;
					queue.slots.pop_front().flatten()
				}
				_ => None,
			}
		});
		match job {
			Some(job) => job(),
			None => break,
		}
	}
	QUEUE.with(|queue| queue.borrow_mut().draining = false);
}

/// Tickets whose jobs haven't run yet.
#[must_use]
pub fn pending() -> usize {
	QUEUE.with(|queue| queue.borrow().slots.len())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::rc::Rc;

	#[test]
	fn jobs_run_in_ticket_order() {
		let log = Rc::new(RefCell::new(Vec::new()));
		let first = enqueue();
		let second = enqueue();
		let third = enqueue();

		let push = |n: u32| {
			let log = Rc::clone(&log);
			move || log.borrow_mut().push(n)
		};
		ready(third, push(3));
		ready(second, push(2));
		assert!(log.borrow().is_empty());
		ready(first, push(1));
		assert_eq!(*log.borrow(), vec![1, 2, 3]);
		assert_eq!(pending(), 0);
	}

	#[test]
	fn jobs_may_ready_later_tickets() {
		let log = Rc::new(RefCell::new(Vec::new()));
		let first = enqueue();
		let second = enqueue();
		{
			let log = Rc::clone(&log);
			ready(first, move || {
				log.borrow_mut().push(1);
				let log = Rc::clone(&log);
				ready(second, move || log.borrow_mut().push(2));
			});
		}
		assert_eq!(*log.borrow(), vec![1, 2]);
	}
}
