use std::mem::size_of;
use std::net::Ipv4Addr;
use std::time::Duration;

use utils::bytes::{self, Cast};
use utils::endian::{u16be, u32be};

use crate::dns::DnsResponse;
use crate::timer::Ticker;

const DNSFLOW_VERSION: u8 = 2;
const DNSFLOW_PKT_MAX_SIZE: usize = 65535;
const DNSFLOW_PKT_TARGET_SIZE: usize = 1200;
const DNSFLOW_SETS_COUNT_MAX: u8 = 255;
pub(crate) const DNSFLOW_FLAG_STATS: u16 = 0x0001;
/// Names and IPs are each capped at this many entries per set; extra items
/// are discarded by the DNS decoder before they ever reach the batcher.
const DNSFLOW_MAX_PARSE: usize = 255;

#[derive(Cast)]
#[repr(C)]
struct WireHeader {
	version: u8,
	sets_count: u8,
	flags: u16be,
	sequence_number: u32be,
}

#[derive(Cast)]
#[repr(C)]
struct SetHeader {
	client_ip: Ipv4Addr,
	names_count: u8,
	ips_count: u8,
	names_len: u16be,
}

/// The five 32-bit capture counters, in wire form.
#[derive(Cast, Clone, Copy)]
#[repr(C)]
pub struct StatsSet {
	pub pkts_captured: u32be,
	pub pkts_received: u32be,
	pub pkts_dropped: u32be,
	pub pkts_ifdropped: u32be,
	pub sample_rate: u32be,
}

/// Packs `DnsResponse`s into versioned wire buffers and flushes them on
/// size, count, or time triggers. One per worker; workers never share a
/// `Batcher`, so none of this needs locking.
pub struct Batcher {
	buf: Vec<u8>,
	sequence_number: u32,
	push_timer: Ticker,
}

impl Batcher {
	pub fn new() -> Self {
		Self {
			buf: Vec::with_capacity(DNSFLOW_PKT_MAX_SIZE),
			sequence_number: 1,
			push_timer: Ticker::new(Duration::from_secs(1)),
		}
	}

	/// Append one accepted response as a new `Set`, flushing immediately if
	/// the size or count trigger fires.
	pub fn append(&mut self, client_ip: Ipv4Addr, response: &DnsResponse, mut emit: impl FnMut(&[u8])) {
		if self.buf.is_empty() {
			self.buf.extend_from_slice(bytes::as_slice(&WireHeader {
				version: DNSFLOW_VERSION,
				sets_count: 0,
				flags: 0u16.into(),
				sequence_number: 0u32.into(),
			}));
		}

		let set_off = self.buf.len();

		self.buf.extend_from_slice(bytes::as_slice(&SetHeader {
			client_ip,
			names_count: response.names.len().min(DNSFLOW_MAX_PARSE) as u8,
			ips_count: response.ips.len().min(DNSFLOW_MAX_PARSE) as u8,
			names_len: 0u16.into(),
		}));

		let names_off = self.buf.len();

		for name in response.names.iter().take(DNSFLOW_MAX_PARSE) {
			self.buf.extend_from_slice(name);
		}

		let written = self.buf.len() - names_off;
		let pad = (4 - written % 4) % 4;
		self.buf.resize(self.buf.len() + pad, 0);

		let names_len = (self.buf.len() - names_off) as u16;

		for ip in response.ips.iter().take(DNSFLOW_MAX_PARSE) {
			self.buf.extend_from_slice(&ip.octets());
		}

		if self.buf.len() > DNSFLOW_PKT_MAX_SIZE {
			log::warn!("Flow buffer overflowed the {DNSFLOW_PKT_MAX_SIZE}-byte cap, discarding");
			self.buf.clear();
			return;
		}

		bytes::cast_mut::<SetHeader, _>(&mut self.buf[set_off..][..size_of::<SetHeader>()]).names_len = names_len.into();

		let header: &mut WireHeader = bytes::cast_mut(&mut self.buf[..size_of::<WireHeader>()]);
		header.sets_count += 1;
		let sets_count = header.sets_count;

		if self.buf.len() >= DNSFLOW_PKT_TARGET_SIZE || sets_count >= DNSFLOW_SETS_COUNT_MAX {
			self.flush(&mut emit);
		}
	}

	/// Called on every worker-loop iteration; the push timer fires and
	/// rearms itself (with fresh jitter) independently of any size/count
	/// triggered flush.
	pub fn tick(&mut self, mut emit: impl FnMut(&[u8])) {
		if self.push_timer.poll() {
			self.flush(&mut emit);
		}
	}

	pub fn flush(&mut self, emit: &mut dyn FnMut(&[u8])) {
		if self.buf.is_empty() {
			return;
		}

		let header: &mut WireHeader = bytes::cast_mut(&mut self.buf[..size_of::<WireHeader>()]);
		header.sequence_number = self.sequence_number.into();
		self.sequence_number = self.sequence_number.wrapping_add(1);

		emit(&self.buf);

		self.buf.clear();
	}

	/// Build and emit a one-set stats buffer. Shares this batcher's
	/// sequence-number counter with data buffers, per the strict
	/// monotonicity invariant.
	pub fn emit_stats(&mut self, stats: StatsSet, emit: impl FnOnce(&[u8])) {
		let mut buf = Vec::with_capacity(size_of::<WireHeader>() + size_of::<StatsSet>());

		buf.extend_from_slice(bytes::as_slice(&WireHeader {
			version: DNSFLOW_VERSION,
			sets_count: 1,
			flags: DNSFLOW_FLAG_STATS.into(),
			sequence_number: self.sequence_number.into(),
		}));
		self.sequence_number = self.sequence_number.wrapping_add(1);

		buf.extend_from_slice(bytes::as_slice(&stats));

		emit(&buf);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn response(names: &[&[u8]], ips: &[Ipv4Addr]) -> DnsResponse {
		DnsResponse {
			names: names.iter().map(|n| n.to_vec()).collect(),
			ips: ips.to_vec(),
		}
	}

	#[test]
	fn single_response_produces_one_set() {
		let mut batcher = Batcher::new();
		let client = Ipv4Addr::new(10, 0, 0, 7);
		let resp = response(&[b"\x07example\x03com\x00"], &[Ipv4Addr::new(93, 184, 216, 34)]);

		let mut flushed = Vec::new();
		batcher.append(client, &resp, |buf| flushed.push(buf.to_vec()));

		// Below the target size, so no flush fires yet.
		assert!(flushed.is_empty());

		let mut out = None;
		batcher.flush(&mut |buf| out = Some(buf.to_vec()));
		let buf = out.unwrap();

		assert_eq!(buf[0], 2); // version
		assert_eq!(buf[1], 1); // sets_count
		let seq = u32::from_be_bytes(buf[4..8].try_into().unwrap());
		assert_eq!(seq, 1);

		let set = &buf[8..];
		assert_eq!(&set[0..4], &client.octets());
		assert_eq!(set[4], 1); // names_count
		assert_eq!(set[5], 1); // ips_count
		let names_len = u16::from_be_bytes(set[6..8].try_into().unwrap()) as usize;
		assert_eq!(names_len % 4, 0);
		assert!(names_len >= 13);
		let names = &set[8..][..names_len];
		assert_eq!(&names[..13], b"\x07example\x03com\x00");
		assert!(names[13..].iter().all(|&b| b == 0));

		let ips = &set[8 + names_len..][..4];
		assert_eq!(ips, &[93, 184, 216, 34]);
	}

	#[test]
	fn sequence_number_increments_across_flushes() {
		let mut batcher = Batcher::new();
		let resp = response(&[b"\x03foo\x00"], &[Ipv4Addr::new(1, 2, 3, 4)]);

		let mut seqs = Vec::new();
		for _ in 0..3 {
			batcher.append(Ipv4Addr::new(1, 1, 1, 1), &resp, |_| {});
			batcher.flush(&mut |buf| seqs.push(u32::from_be_bytes(buf[4..8].try_into().unwrap())));
		}

		assert_eq!(seqs, vec![1, 2, 3]);
	}

	#[test]
	fn size_trigger_starts_next_buffer_with_sequence_incremented_by_one() {
		let mut batcher = Batcher::new();
		// A name long enough that a handful of sets crosses the 1200-byte target.
		let big_name: Vec<u8> = {
			let mut n = vec![60u8];
			n.extend(std::iter::repeat(b'a').take(60));
			n.push(0);
			n
		};
		let resp = response(&[&big_name], &[Ipv4Addr::new(1, 2, 3, 4)]);

		let mut flushed_seqs = Vec::new();
		for _ in 0..40 {
			batcher.append(Ipv4Addr::new(1, 1, 1, 1), &resp, |buf| {
				flushed_seqs.push(u32::from_be_bytes(buf[4..8].try_into().unwrap()));
			});
		}

		assert!(flushed_seqs.len() >= 2, "expected at least two size-triggered flushes to cross the boundary, got {flushed_seqs:?}");
		assert_eq!(flushed_seqs[1], flushed_seqs[0] + 1);
	}

	#[test]
	fn stats_set_shares_sequence_counter_with_data() {
		let mut batcher = Batcher::new();
		let resp = response(&[b"\x03foo\x00"], &[Ipv4Addr::new(1, 2, 3, 4)]);

		batcher.append(Ipv4Addr::new(1, 1, 1, 1), &resp, |_| {});
		let mut data_seq = 0;
		batcher.flush(&mut |buf| data_seq = u32::from_be_bytes(buf[4..8].try_into().unwrap()));

		let stats = StatsSet {
			pkts_captured: 100u32.into(),
			pkts_received: 120u32.into(),
			pkts_dropped: 5u32.into(),
			pkts_ifdropped: 0u32.into(),
			sample_rate: 4u32.into(),
		};

		let mut stats_seq = 0;
		let mut flags = 0u16;
		batcher.emit_stats(stats, |buf| {
			stats_seq = u32::from_be_bytes(buf[4..8].try_into().unwrap());
			flags = u16::from_be_bytes(buf[2..4].try_into().unwrap());
		});

		assert_eq!(stats_seq, data_seq + 1);
		assert_eq!(flags & DNSFLOW_FLAG_STATS, DNSFLOW_FLAG_STATS);
	}
}
