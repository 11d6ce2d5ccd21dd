use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use net::pcap;
use utils::error::*;

const DNSFLOW_PORT: u16 = 5300;

/// Writes a completed wire buffer to zero or more UDP collectors and,
/// optionally, mirrors it into a DLT_NULL capture dump. A send failure to
/// one destination is logged and doesn't stop the rest.
pub struct Emitter {
	socket: Option<UdpSocket>,
	dsts: Vec<SocketAddrV4>,
	dump: Option<pcap::Writer>,
}

impl Emitter {
	pub fn new(dsts: &[Ipv4Addr], dump_path: Option<&str>) -> Result<Self> {
		let dump = dump_path.map(pcap::Writer::new).transpose()?;

		Ok(Self {
			socket: None,
			dsts: dsts.iter().map(|&addr| SocketAddrV4::new(addr, DNSFLOW_PORT)).collect(),
			dump,
		})
	}

	pub fn send(&mut self, record: &[u8]) {
		if !self.dsts.is_empty() {
			let socket = self.socket.get_or_insert_with(|| {
				UdpSocket::bind("0.0.0.0:0").unwrap_or_else(|err| panic!("Unable to create UDP socket: {err}"))
			});

			for &dst in &self.dsts {
				if let Err(err) = socket.send_to(record, dst) {
					log::warn!("Failed to send wire buffer to {dst}: {err}");
				}
			}
		}

		if let Some(dump) = &mut self.dump {
			let _ = dump.log(record);
		}
	}
}
