//! Wire-format primitives for the capture pipeline: IPv4/UDP header parsing
//! and the pcap dump-file format. Plain functions over borrowed byte slices,
//! no connection state — captured bytes are validated and walked, never
//! answered.
#![feature(write_all_vectored)]

pub mod ip;
pub mod pcap;
pub mod udp;
