use crate::config::{Encap, Shard};

const UDP_HEADER_LEN: usize = 8;
const IP_HEADER_LEN: usize = 20;
const SRC_PORT_OFFSET: usize = 0;
const DNS_FLAGS_OFFSET: usize = 10;
const DST_IP_OFFSET: usize = 16;

/// Build the BPF expression that admits only inbound DNS responses
/// relevant to this worker. Composes a port match, a response-flags match,
/// and (when sharded) a client-IP modulo predicate, then wraps the whole
/// thing to also match one level of VLAN tagging.
pub fn build(encap: &Encap, shard: Shard, mdns: bool) -> String {
	let encap_offset = encap.filter_offset();

	let (udp_off, ip_off) = if encap_offset != 0 {
		(UDP_HEADER_LEN + encap_offset + IP_HEADER_LEN, IP_HEADER_LEN + UDP_HEADER_LEN + encap_offset)
	} else {
		(0, 0)
	};

	let port_filter = if mdns {
		format!(
			"(udp[{off}:2] = 53 or udp[{off}:2] = 5353)",
			off = SRC_PORT_OFFSET + udp_off
		)
	} else {
		format!("udp[{}:2] = 53", SRC_PORT_OFFSET + udp_off)
	};

	let dns_resp_filter = format!(
		"udp and {port_filter} and udp[{off}:2] & 0x8187 = 0x8180",
		off = DNS_FLAGS_OFFSET + udp_off
	);

	let sharded_filter = if shard.n_procs > 1 {
		let off = DST_IP_OFFSET + ip_off;
		format!(
			"{dns_resp_filter} and ip[{off}:4] - ip[{off}:4] / {n} * {n} = {residue}",
			n = shard.n_procs,
			residue = shard.proc_i - 1
		)
	} else {
		dns_resp_filter
	};

	format!("({sharded_filter}) or (vlan and ({sharded_filter}))")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn single_worker_no_encap() {
		let filter = build(&Encap::default(), Shard { proc_i: 1, n_procs: 1 }, false);
		assert_eq!(filter, "(udp and udp[0:2] = 53 and udp[10:2] & 0x8187 = 0x8180) or (vlan and (udp and udp[0:2] = 53 and udp[10:2] & 0x8187 = 0x8180))");
	}

	#[test]
	fn mdns_widens_port_match() {
		let filter = build(&Encap::default(), Shard { proc_i: 1, n_procs: 1 }, true);
		assert!(filter.contains("udp[0:2] = 53 or udp[0:2] = 5353"));
	}

	#[test]
	fn sharded_filter_uses_residue() {
		let filter = build(&Encap::default(), Shard { proc_i: 3, n_procs: 4 }, false);
		assert!(filter.contains("ip[16:4] - ip[16:4] / 4 * 4 = 2"));
	}

	#[test]
	fn pcap_record_encap_shifts_offsets() {
		let encap = Encap { pcap_record_port: Some(4321), jmirror_port: None };
		let filter = build(&encap, Shard { proc_i: 1, n_procs: 1 }, false);
		// udp_off = 8 + 30 + 20 = 58, ip_off = 20 + 8 + 30 = 58
		assert!(filter.contains("udp[58:2] = 53"));
		assert!(filter.contains("udp[68:2] & 0x8187 = 0x8180"));
	}
}
