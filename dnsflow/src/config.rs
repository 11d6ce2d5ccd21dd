use std::net::Ipv4Addr;

use clap::Parser;

use crate::error::ConfigError;

const DNSFLOW_UDP_MAX_DSTS: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "dnsflow", about = "Passive DNS-traffic observer", disable_help_flag = false)]
struct Cli {
	/// Live capture interface
	#[arg(short = 'i')]
	iface: Option<String>,

	/// Offline capture file; mutually exclusive with -M
	#[arg(short = 'r')]
	read_file: Option<String>,

	/// Override the built-in BPF expression
	#[arg(short = 'f')]
	filter: Option<String>,

	/// Manual shard assignment, "i/n" (1-based i, total n)
	#[arg(short = 'm')]
	manual_shard: Option<String>,

	/// Auto-fork n workers and derive shards; forbidden with -w
	#[arg(short = 'M')]
	auto_fork: Option<u32>,

	/// Disable promiscuous mode
	#[arg(short = 'p')]
	no_promisc: bool,

	/// Write and exclusively lock a PID file
	#[arg(short = 'P')]
	pid_file: Option<String>,

	/// Sampling rate (1/N)
	#[arg(short = 's')]
	sample_rate: Option<u32>,

	/// Add a UDP destination; up to 10
	#[arg(short = 'u')]
	udp_dsts: Vec<Ipv4Addr>,

	/// Write capture dump
	#[arg(short = 'w')]
	dump_file: Option<String>,

	/// pcap-record encapsulation outer port
	#[arg(short = 'X')]
	pcap_record_port: Option<u16>,

	/// J-Mirror outer port (commonly 30030)
	#[arg(short = 'J')]
	jmirror_port: Option<u16>,

	/// Include mDNS (5353) in the port match
	#[arg(short = 'Y')]
	mdns: bool,
}

/// Shard assignment for this worker: 1-based index and total worker count.
#[derive(Clone, Copy, Debug)]
pub struct Shard {
	pub proc_i: u32,
	pub n_procs: u32,
}

/// The pcap-record / J-Mirror encapsulation ports, and the resulting fixed
/// byte offset from the outer UDP payload to the inner IPv4 header. Only
/// one level of encapsulation is supported, so at most one of these two
/// ports is meaningful on a given packet.
#[derive(Clone, Copy, Debug, Default)]
pub struct Encap {
	pub pcap_record_port: Option<u16>,
	pub jmirror_port: Option<u16>,
}

impl Encap {
	/// `sizeof(pcap_sf_pkthdr) + sizeof(ether_header)`: 16-byte pcap record
	/// timestamp+caplen+len header, plus a 14-byte Ethernet header.
	pub const PCAP_RECORD_OFFSET: usize = 16 + 14;
	/// `sizeof(jmirror_hdr)`: two 32-bit fields (intercept_id, session_id).
	pub const JMIRROR_OFFSET: usize = 8;

	/// Byte offset into the outer UDP payload of the inner IPv4 header, if
	/// `dst_port` names a configured encapsulation.
	pub fn offset_for(&self, dst_port: u16) -> Option<usize> {
		if Some(dst_port) == self.pcap_record_port {
			Some(Self::PCAP_RECORD_OFFSET)
		} else if Some(dst_port) == self.jmirror_port {
			Some(Self::JMIRROR_OFFSET)
		} else {
			None
		}
	}

	/// The offset fed to the BPF filter builder, computed the same way
	/// regardless of whether `-f` overrides the built filter: whichever
	/// encapsulation port was configured decides the inner IP/UDP offset.
	pub fn filter_offset(&self) -> usize {
		if self.pcap_record_port.is_some() {
			Self::PCAP_RECORD_OFFSET
		} else if self.jmirror_port.is_some() {
			Self::JMIRROR_OFFSET
		} else {
			0
		}
	}
}

/// Capture source: either a live interface or a stored capture file. `-r`
/// signals a one-shot run that flushes and exits at EOF.
#[derive(Clone, Debug)]
pub enum Source {
	Live { iface: Option<String>, promisc: bool },
	File(String),
}

/// Immutable, assembled once from CLI flags and read thereafter: the
/// per-worker view of how this process should capture, decapsulate, batch,
/// and emit.
#[derive(Clone, Debug)]
pub struct Config {
	pub source: Source,
	pub filter_override: Option<String>,
	pub shard: Shard,
	pub pid_file: Option<String>,
	pub sample_rate: u32,
	pub udp_dsts: Vec<Ipv4Addr>,
	pub dump_file: Option<String>,
	pub encap: Encap,
	pub mdns: bool,
	pub fork_workers: Option<u32>,
}

impl Config {
	pub fn parse() -> Result<Self, ConfigError> {
		Self::from_cli(Cli::parse())
	}

	fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
		if cli.udp_dsts.is_empty() && cli.dump_file.is_none() {
			return Err(ConfigError("output dst missing: give -u or -w".into()));
		}

		if cli.udp_dsts.len() > DNSFLOW_UDP_MAX_DSTS {
			return Err(ConfigError("too many udp dsts".into()));
		}

		if cli.auto_fork.is_some() && cli.dump_file.is_some() {
			return Err(ConfigError("can't use -w and -M together".into()));
		}

		if cli.read_file.is_some() && cli.auto_fork.is_some() {
			return Err(ConfigError("can't use -r and -M together".into()));
		}

		let shard = match &cli.manual_shard {
			Some(spec) => parse_shard(spec)?,
			None => Shard { proc_i: 1, n_procs: 1 },
		};

		if let Some(n) = cli.auto_fork {
			if n == 0 {
				return Err(ConfigError("invalid multiproc option".into()));
			}
		}

		let source = match cli.read_file {
			Some(path) => Source::File(path),
			None => Source::Live {
				iface: cli.iface,
				promisc: !cli.no_promisc,
			},
		};

		Ok(Config {
			source,
			filter_override: cli.filter,
			shard,
			pid_file: cli.pid_file,
			sample_rate: cli.sample_rate.unwrap_or(0),
			udp_dsts: cli.udp_dsts,
			dump_file: cli.dump_file,
			encap: Encap {
				pcap_record_port: cli.pcap_record_port,
				jmirror_port: cli.jmirror_port,
			},
			mdns: cli.mdns,
			fork_workers: cli.auto_fork,
		})
	}

	/// A copy of this config for one shard of an auto-forked fleet.
	pub fn with_shard(&self, shard: Shard) -> Self {
		Self { shard, ..self.clone() }
	}
}

fn parse_shard(spec: &str) -> Result<Shard, ConfigError> {
	let (i, n) = spec.split_once('/').ok_or_else(|| ConfigError(format!("invalid multiproc option -- {spec}")))?;

	let proc_i: u32 = i.parse().map_err(|_| ConfigError(format!("invalid multiproc option -- {spec}")))?;
	let n_procs: u32 = n.parse().map_err(|_| ConfigError(format!("invalid multiproc option -- {spec}")))?;

	if n_procs == 0 || proc_i == 0 || proc_i > n_procs {
		return Err(ConfigError(format!("invalid multiproc option -- {spec}")));
	}

	Ok(Shard { proc_i, n_procs })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn shard_parses_i_of_n() {
		let shard = parse_shard("2/4").unwrap();
		assert_eq!(shard.proc_i, 2);
		assert_eq!(shard.n_procs, 4);
	}

	#[test]
	fn shard_rejects_out_of_range_index() {
		assert!(parse_shard("5/4").is_err());
	}

	#[test]
	fn shard_rejects_zero_n() {
		assert!(parse_shard("1/0").is_err());
	}

	#[test]
	fn encap_offset_for_pcap_record_port() {
		let encap = Encap { pcap_record_port: Some(4321), jmirror_port: None };
		assert_eq!(encap.offset_for(4321), Some(Encap::PCAP_RECORD_OFFSET));
		assert_eq!(encap.offset_for(1), None);
	}

	#[test]
	fn encap_offset_for_jmirror_port() {
		let encap = Encap { pcap_record_port: None, jmirror_port: Some(30030) };
		assert_eq!(encap.offset_for(30030), Some(Encap::JMIRROR_OFFSET));
	}
}
