use core::mem::size_of;

use utils::bytes::{self, Cast};
use utils::endian::u16be;
use utils::error::*;

#[derive(Cast)]
#[repr(C)]
struct Header {
	src: u16be,
	dst: u16be,
	len: u16be,
	csum: [u8; 2],
}

/// A parsed UDP header together with its payload.
pub struct Parsed<'a> {
	pub src_port: u16,
	pub dst_port: u16,
	pub payload: &'a [u8],
}

/// Validate and strip a UDP header. No checksum is verified.
pub fn parse(buf: &[u8]) -> Result<Parsed<'_>> {
	if buf.len() < size_of::<Header>() {
		return Err(log::debug!("UDP header too short (got {} bytes)", buf.len()));
	}

	let header: &Header = bytes::cast(&buf[..size_of::<Header>()]);

	let len = header.len.get() as usize;

	if len < size_of::<Header>() || len > buf.len() {
		return Err(log::debug!("Invalid UDP length ({len})"));
	}

	Ok(Parsed {
		src_port: header.src.get(),
		dst_port: header.dst.get(),
		payload: &buf[size_of::<Header>()..len],
	})
}
