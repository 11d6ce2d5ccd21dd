use std::time::{Duration, Instant};

use rand::Rng;

const MAX_JITTER_MS: u64 = 1000;

/// A one-shot timer that rearms itself with up to 1s of random jitter added
/// on top of its base period every time it fires, so that workers in a
/// multi-process fleet don't all emit in lock-step.
pub struct Ticker {
	base: Duration,
	deadline: Instant,
}

impl Ticker {
	pub fn new(base: Duration) -> Self {
		let mut this = Self { base, deadline: Instant::now() };
		this.rearm();
		this
	}

	fn rearm(&mut self) {
		let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..MAX_JITTER_MS));
		self.deadline = Instant::now() + self.base + jitter;
	}

	/// True if the deadline has passed. Rearms for the next period as a
	/// side effect, same as the callback re-arming its own timer.
	pub fn poll(&mut self) -> bool {
		if Instant::now() >= self.deadline {
			self.rearm();
			true
		} else {
			false
		}
	}

	/// A ticker whose deadline has already passed, for deterministic tests
	/// that need a `poll()` to fire without waiting out a real period.
	#[cfg(test)]
	pub(crate) fn already_due() -> Self {
		Self {
			base: Duration::ZERO,
			deadline: Instant::now() - Duration::from_secs(1),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn does_not_fire_before_base_period() {
		let mut ticker = Ticker::new(Duration::from_secs(60));
		assert!(!ticker.poll());
	}
}
