use std::net::Ipv4Addr;

use net::ip::Protocol;
use utils::error::*;

use crate::config::Encap;

/// The client IP and DNS payload bytes of the innermost frame.
pub struct Decapsulated<'a> {
	pub client_ip: Ipv4Addr,
	pub payload: &'a [u8],
}

/// Walk outer IPv4/UDP and, if the outer destination port names a
/// configured encapsulation, skip a fixed header to reach an inner
/// IPv4/UDP frame. Only one level of encapsulation is supported; VLAN
/// tagging is handled at the BPF filter layer, not here.
///
/// Any validation failure aborts silently: a passive observer drops what
/// it can't cleanly parse rather than log on the hot path.
pub fn decapsulate<'a>(buf: &'a [u8], encap: &Encap) -> Result<Decapsulated<'a>> {
	let outer = parse_ip_udp(buf)?;

	if let Some(offset) = encap.offset_for(outer.dst_port) {
		let inner_buf = outer.payload.get(offset..).ok_or(())?;
		let inner = parse_ip_udp(inner_buf)?;

		return Ok(Decapsulated { client_ip: inner.dst, payload: inner.payload });
	}

	Ok(Decapsulated { client_ip: outer.dst, payload: outer.payload })
}

struct IpUdp<'a> {
	dst: Ipv4Addr,
	dst_port: u16,
	payload: &'a [u8],
}

fn parse_ip_udp(buf: &[u8]) -> Result<IpUdp<'_>> {
	let ip = net::ip::v4::parse(buf)?;

	if ip.protocol != Protocol::Udp {
		return Err(());
	}

	let udp = net::udp::parse(ip.payload)?;

	Ok(IpUdp {
		dst: ip.dst,
		dst_port: udp.dst_port,
		payload: udp.payload,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ipv4_udp_packet(src: Ipv4Addr, dst: Ipv4Addr, src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
		let mut buf = vec![0u8; 20 + 8 + payload.len()];

		buf[0] = 0x45; // version 4, ihl 5
		let total_len = buf.len() as u16;
		buf[2..4].copy_from_slice(&total_len.to_be_bytes());
		buf[9] = 17; // UDP
		buf[12..16].copy_from_slice(&src.octets());
		buf[16..20].copy_from_slice(&dst.octets());

		let udp = &mut buf[20..];
		udp[0..2].copy_from_slice(&src_port.to_be_bytes());
		udp[2..4].copy_from_slice(&dst_port.to_be_bytes());
		let udp_len = (8 + payload.len()) as u16;
		udp[4..6].copy_from_slice(&udp_len.to_be_bytes());
		udp[8..].copy_from_slice(payload);

		buf
	}

	#[test]
	fn decapsulates_plain_udp() {
		let client = Ipv4Addr::new(10, 0, 0, 7);
		let server = Ipv4Addr::new(8, 8, 8, 8);
		let buf = ipv4_udp_packet(server, client, 53, 5353, b"dns-bytes");

		let decap = decapsulate(&buf, &Encap::default()).unwrap();

		assert_eq!(decap.client_ip, client);
		assert_eq!(decap.payload, b"dns-bytes");
	}

	#[test]
	fn one_level_of_jmirror_encapsulation_is_unwrapped() {
		let client = Ipv4Addr::new(10, 0, 0, 7);
		let server = Ipv4Addr::new(8, 8, 8, 8);
		let inner = ipv4_udp_packet(server, client, 53, 53, b"dns-bytes");

		let mut jmirror_header = vec![0u8; Encap::JMIRROR_OFFSET];
		jmirror_header.extend_from_slice(&inner);

		let outer = ipv4_udp_packet(Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2), 1, 30030, &jmirror_header);

		let encap = Encap { pcap_record_port: None, jmirror_port: Some(30030) };

		let decap = decapsulate(&outer, &encap).unwrap();

		assert_eq!(decap.client_ip, client);
		assert_eq!(decap.payload, b"dns-bytes");
	}

	#[test]
	fn rejects_tcp() {
		let mut buf = ipv4_udp_packet(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2), 1, 2, b"x");
		buf[9] = 6; // TCP

		assert!(decapsulate(&buf, &Encap::default()).is_err());
	}
}
