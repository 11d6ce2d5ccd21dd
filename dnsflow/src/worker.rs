use pcap::{Active, Capture, Device, Offline};

use crate::batch::Batcher;
use crate::bpf;
use crate::config::{Config, Source};
use crate::emit::Emitter;
use crate::error::InitError;
use crate::stats::{Counters, StatsTicker};
use crate::{decap, dns};

const SNAPLEN: i32 = 65535;
const CAPTURE_TIMEOUT_MS: i32 = 1000;

/// Either a live interface or a stored capture file, behind one interface so
/// the event loop below doesn't need to care which it's reading from.
enum Adapter {
	Live(Capture<Active>),
	File(Capture<Offline>),
}

impl Adapter {
	fn filter(&mut self, expr: &str) -> Result<(), pcap::Error> {
		match self {
			Adapter::Live(cap) => cap.filter(expr, true),
			Adapter::File(cap) => cap.filter(expr, true),
		}
	}

	fn next_packet(&mut self) -> Result<pcap::Packet<'_>, pcap::Error> {
		match self {
			Adapter::Live(cap) => cap.next_packet(),
			Adapter::File(cap) => cap.next_packet(),
		}
	}

	fn stats(&mut self) -> pcap::Stat {
		let stat = match self {
			Adapter::Live(cap) => cap.stats(),
			Adapter::File(cap) => cap.stats(),
		};

		stat.unwrap_or(pcap::Stat {
			received: 0,
			dropped: 0,
			if_dropped: 0,
		})
	}
}

fn open(config: &Config) -> Result<Adapter, InitError> {
	match &config.source {
		Source::Live { iface, promisc } => {
			let device = match iface {
				Some(name) => name.clone(),
				None => Device::lookup()
					.map_err(|err| InitError(format!("Unable to look up a capture device: {err}")))?
					.ok_or_else(|| InitError("No default capture device available".into()))?
					.name,
			};

			let cap = Capture::from_device(device.as_str())
				.map_err(|err| InitError(format!("Unable to open interface {device}: {err}")))?
				.promisc(*promisc)
				.snaplen(SNAPLEN)
				.timeout(CAPTURE_TIMEOUT_MS)
				.open()
				.map_err(|err| InitError(format!("Unable to activate capture on {device}: {err}")))?;

			Ok(Adapter::Live(cap))
		}
		Source::File(path) => {
			let cap = Capture::from_file(path).map_err(|err| InitError(format!("Unable to open capture file {path}: {err}")))?;

			Ok(Adapter::File(cap))
		}
	}
}

/// The filter actually installed: `-f` always wins over the built-in
/// builder, matching `dnsflow.c`'s `if (filter == NULL) filter =
/// build_pcap_filter(...)`.
fn filter_expr(config: &Config) -> String {
	match &config.filter_override {
		Some(expr) => expr.clone(),
		None => bpf::build(&config.encap, config.shard, config.mdns),
	}
}

/// Run one worker's capture/decode/batch/emit loop until a shutdown signal
/// arrives or, for offline captures, until EOF. Blocking: each iteration
/// waits on the capture adapter (bounded by its read timeout), then checks
/// the push and stats timers.
pub fn run(config: &Config, flags: &runtime::signal::Flags) -> Result<(), InitError> {
	let mut adapter = open(config)?;

	adapter
		.filter(&filter_expr(config))
		.map_err(|err| InitError(format!("Unable to install capture filter: {err}")))?;

	let mut batcher = Batcher::new();
	let mut emitter = Emitter::new(&config.udp_dsts, config.dump_file.as_deref()).map_err(|_| InitError("Unable to set up emitter".into()))?;
	let mut stats = StatsTicker::new(config.sample_rate);

	// `-r FILE` signals a one-shot run: no stats ticker, flush once at EOF.
	let one_shot = matches!(config.source, Source::File(_));

	let mut sample_counter: u32 = 0;
	let mut captured: u32 = 0;

	loop {
		// `child_exited` only ever fires for the supervisor's own proc_i=1
		// worker loop, once a sibling it forked has died; the supervisor
		// handles reaping and group shutdown once this returns.
		if flags.should_exit() || flags.child_exited() {
			break;
		}

		// On platforms without PR_SET_PDEATHSIG, fall back to polling for
		// reparenting to init once per loop iteration.
		#[cfg(not(target_os = "linux"))]
		if runtime::process::parent_exited() {
			break;
		}

		match adapter.next_packet() {
			Ok(packet) => {
				// Counts every packet the filter handed us, independent of
				// whatever decap/DNS decoding does with it afterward.
				captured = captured.wrapping_add(1);

				if config.sample_rate > 1 {
					sample_counter = sample_counter.wrapping_add(1);
					if sample_counter % config.sample_rate != 0 {
						continue;
					}
				}

				if let Ok(decapsulated) = decap::decapsulate(packet.data, &config.encap) {
					if let Ok(response) = dns::decode(decapsulated.payload) {
						batcher.append(decapsulated.client_ip, &response, |buf| emitter.send(buf));
					}
				}
			}
			Err(pcap::Error::TimeoutExpired) => {}
			Err(pcap::Error::NoMorePackets) => {
				if one_shot {
					break;
				}
			}
			Err(err) => log::warn!("Capture error: {err}"),
		}

		if !one_shot {
			batcher.tick(|buf| emitter.send(buf));

			stats.poll(
				|| {
					let stat = adapter.stats();
					Counters {
						captured,
						received: stat.received,
						dropped: stat.dropped,
						if_dropped: stat.if_dropped,
					}
				},
				&mut batcher,
				|buf| emitter.send(buf),
			);
		}
	}

	batcher.flush(&mut |buf| emitter.send(buf));

	// Mirrors dnsflow.c's clean_exit()/post-capture-loop calls to
	// dnsflow_print_stats(): the final counters are always logged once,
	// whether the loop ended on a signal or (for -r FILE) on EOF.
	let final_stat = adapter.stats();
	crate::stats::log_counters(
		&Counters {
			captured,
			received: final_stat.received,
			dropped: final_stat.dropped,
			if_dropped: final_stat.if_dropped,
		},
		config.sample_rate,
	);

	Ok(())
}
