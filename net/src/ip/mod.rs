use bilge::prelude::*;

pub mod v4;

#[bitsize(4)]
#[derive(FromBits, PartialEq, Eq)]
pub enum Version {
	V4 = 4,
	V6 = 6,
	#[fallback]
	Unknown,
}

#[repr(u8)]
#[bitsize(8)]
#[derive(Clone, Copy, FromBits, PartialEq, Eq)]
pub enum Protocol {
	Tcp = 6,
	Udp = 17,
	#[fallback]
	Unknown(u8),
}
