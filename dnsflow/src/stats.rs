use std::time::Duration;

use crate::batch::{Batcher, StatsSet};
use crate::timer::Ticker;

const STATS_PERIOD: Duration = Duration::from_secs(10);
/// Every sixth tick, the same counters are also written to the log.
const LOG_EVERY: u32 = 6;

/// Packet counters as reported by the capture adapter. `captured` is the
/// adapter's own accepted-by-filter count — every packet the filter handed
/// back, independent of whether decapsulation or DNS decoding later accepted
/// it too.
#[derive(Clone, Copy, Default)]
pub struct Counters {
	pub captured: u32,
	pub received: u32,
	pub dropped: u32,
	pub if_dropped: u32,
}

/// Periodically builds a `StatsSet` from the capture adapter's counters and
/// pushes it through the batcher, sharing the data sequence-number series.
pub struct StatsTicker {
	timer: Ticker,
	sample_rate: u32,
	ticks: u32,
}

impl StatsTicker {
	pub fn new(sample_rate: u32) -> Self {
		Self {
			timer: Ticker::new(STATS_PERIOD),
			sample_rate,
			ticks: 0,
		}
	}

	#[cfg(test)]
	fn already_due(sample_rate: u32) -> Self {
		Self {
			timer: Ticker::already_due(),
			sample_rate,
			ticks: 0,
		}
	}

	/// Called on every worker-loop iteration. Counters are read lazily via
	/// `read_counters` so a capture-stats call isn't made unless the timer
	/// actually fired this iteration.
	pub fn poll(&mut self, read_counters: impl FnOnce() -> Counters, batcher: &mut Batcher, emit: impl FnOnce(&[u8])) {
		if !self.timer.poll() {
			return;
		}

		self.emit_now(read_counters(), batcher, emit);
	}

	/// Builds one `StatsSet` from `counters`, logs it every `LOG_EVERY`th
	/// call, and pushes it through `batcher`. Split out from `poll` so tests
	/// can exercise the emission itself without waiting on the real timer.
	fn emit_now(&mut self, counters: Counters, batcher: &mut Batcher, emit: impl FnOnce(&[u8])) {
		let set = StatsSet {
			pkts_captured: counters.captured.into(),
			pkts_received: counters.received.into(),
			pkts_dropped: counters.dropped.into(),
			pkts_ifdropped: counters.if_dropped.into(),
			sample_rate: self.sample_rate.into(),
		};

		self.ticks += 1;
		if self.ticks % LOG_EVERY == 0 {
			log_counters(&counters, self.sample_rate);
		}

		batcher.emit_stats(set, emit);
	}
}

/// Shared with `worker::run`'s final-stats line on shutdown, so the
/// periodic and the closing log line read identically.
pub fn log_counters(counters: &Counters, sample_rate: u32) {
	log::info!(
		"stats: captured={} received={} dropped={} ifdropped={} sample_rate={}",
		counters.captured,
		counters.received,
		counters.dropped,
		counters.if_dropped,
		sample_rate
	);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::batch::DNSFLOW_FLAG_STATS;

	#[test]
	fn poll_emits_stats_set_matching_wire_layout() {
		let mut ticker = StatsTicker::already_due(4);
		let mut batcher = Batcher::new();

		let counters = Counters {
			captured: 100,
			received: 120,
			dropped: 5,
			if_dropped: 0,
		};

		let mut out = None;
		ticker.poll(|| counters, &mut batcher, |buf| out = Some(buf.to_vec()));

		let buf = out.expect("a due timer must emit on its first poll");

		assert_eq!(buf[0], 2); // version
		assert_eq!(buf[1], 1); // sets_count
		let flags = u16::from_be_bytes(buf[2..4].try_into().unwrap());
		assert_eq!(flags & DNSFLOW_FLAG_STATS, DNSFLOW_FLAG_STATS);

		let body = &buf[8..];
		assert_eq!(u32::from_be_bytes(body[0..4].try_into().unwrap()), 100);
		assert_eq!(u32::from_be_bytes(body[4..8].try_into().unwrap()), 120);
		assert_eq!(u32::from_be_bytes(body[8..12].try_into().unwrap()), 5);
		assert_eq!(u32::from_be_bytes(body[12..16].try_into().unwrap()), 0);
		assert_eq!(u32::from_be_bytes(body[16..20].try_into().unwrap()), 4);
	}

	#[test]
	fn poll_does_not_emit_before_the_timer_is_due() {
		let mut ticker = StatsTicker::new(4);
		let mut batcher = Batcher::new();

		let mut fired = false;
		ticker.poll(|| Counters::default(), &mut batcher, |_| fired = true);

		assert!(!fired);
	}

	#[test]
	fn ticks_counter_reaches_a_log_every_multiple_on_the_sixth_call() {
		let mut ticker = StatsTicker::new(1);
		let mut batcher = Batcher::new();

		for tick in 1..=6u32 {
			ticker.emit_now(Counters::default(), &mut batcher, |_| {});
			assert_eq!(ticker.ticks, tick);
		}

		assert_eq!(ticker.ticks % LOG_EVERY, 0);
	}
}
