use core::mem::size_of;
use core::net::Ipv4Addr;

use bilge::prelude::*;
use utils::bytes::{self, Cast};
use utils::endian::{b, u16be};
use utils::error::*;

use crate::ip::{Protocol, Version};

/// A parsed IPv4 header together with the protocol payload it encapsulates.
pub struct Parsed<'a> {
	pub src: Ipv4Addr,
	pub dst: Ipv4Addr,
	pub protocol: Protocol,
	pub payload: &'a [u8],
}

/// Validate and strip an IPv4 header from a captured packet.
///
/// No checksum is verified and no fragment reassembly is attempted: a
/// passive observer that only cares about complete, well-formed UDP/DNS
/// traffic can afford to drop anything that doesn't parse cleanly on the
/// first pass.
pub fn parse(buf: &[u8]) -> Result<Parsed<'_>> {
	if buf.len() < size_of::<Header>() {
		return Err(log::debug!("IPv4 packet too short for header ({} bytes)", buf.len()));
	}

	let header: &Header = bytes::cast(&buf[..size_of::<Header>()]);

	if header.ver.ver() != Version::V4 {
		return Err(log::debug!("Not an IPv4 packet"));
	}

	let header_len = 4 * header.ver.ihl().value() as usize;

	if header_len < size_of::<Header>() || header_len > buf.len() {
		return Err(log::debug!("Invalid IPv4 header length ({header_len})"));
	}

	let total_len = header.len.get() as usize;

	if total_len < header_len || total_len > buf.len() {
		return Err(log::debug!("Invalid IPv4 total length ({total_len})"));
	}

	Ok(Parsed {
		src: header.src,
		dst: header.dst,
		protocol: header.proto.get(),
		payload: &buf[header_len..total_len],
	})
}

#[bitsize(8)]
#[derive(FromBits, Cast)]
#[repr(C)]
struct Meta {
	ihl: u4,
	ver: Version,
}

#[derive(Cast)]
#[repr(C)]
struct Header {
	ver: Meta,
	tos: u8,
	len: u16be,
	id_frag: [u8; 4],
	ttl: u8,
	proto: b<Protocol>,
	csm: [u8; 2],
	src: Ipv4Addr,
	dst: Ipv4Addr,
}
