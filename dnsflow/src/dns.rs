use std::net::Ipv4Addr;

use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use utils::error::*;

const MAX_NAME_BYTES: usize = 255;
const MAX_PARSE: usize = 255;

/// A decoded, accepted recursive DNS A-record response, owning copies of
/// everything the decoder borrowed so the caller can hold it past the
/// lifetime of the parsed packet.
pub struct DnsResponse {
	/// `names[0]` is the question's owner name; the rest are CNAME targets
	/// in answer order. Each entry is wire-form: length-prefixed labels
	/// terminated by a zero-length label.
	pub names: Vec<Vec<u8>>,
	/// A-record addresses, in answer order, as captured (network byte
	/// order is preserved by `Ipv4Addr`'s octet representation).
	pub ips: Vec<Ipv4Addr>,
}

/// Parse and gate a DNS response. Returns `Err` for anything that doesn't
/// parse, or parses but isn't an accepted recursive A-record answer;
/// malformed packets log one line identifying the parse failure, while
/// non-accepting flags/rcode/qdcount are dropped silently.
pub fn decode(payload: &[u8]) -> Result<DnsResponse> {
	let message = Message::from_vec(payload).map_err(|err| log::debug!("Malformed DNS packet: {err}"))?;

	let header = message.header();

	if header.message_type() != MessageType::Response
		|| !header.recursion_desired()
		|| !header.recursion_available()
		|| message.response_code() != ResponseCode::NoError
	{
		return Err(());
	}

	let queries = message.queries();

	if queries.len() != 1 {
		return Err(());
	}

	let question = &queries[0];

	if question.query_type() != RecordType::A {
		return Err(());
	}

	let mut names = Vec::new();
	let mut ips = Vec::new();

	let owner = wire_name(question.name()).ok_or(())?;
	names.push(owner);

	for answer in message.answers() {
		match answer.data() {
			Some(RData::CNAME(target)) => {
				if names.len() >= MAX_PARSE {
					log::debug!("Dropping CNAME target past the {MAX_PARSE}-name cap");
					continue;
				}

				let Some(name) = wire_name(target) else {
					log::debug!("CNAME target exceeds {MAX_NAME_BYTES} wire bytes");
					continue;
				};

				names.push(name);
			}
			Some(RData::A(addr)) => {
				if ips.len() >= MAX_PARSE {
					log::debug!("Dropping A record past the {MAX_PARSE}-address cap");
					continue;
				}

				ips.push(addr.0);
			}
			_ => {}
		}
	}

	if names.is_empty() || ips.is_empty() {
		return Err(());
	}

	Ok(DnsResponse { names, ips })
}

/// Re-assemble a name's wire form directly from the decoder's own label
/// bytes (`Name::iter()`), not its presentation-format `Display` text —
/// that text form escapes a literal `.` inside a label as `\.` and
/// non-printable bytes as `\DDD`, which a naive split-on-`.` re-encoding
/// would corrupt. Reading the labels back out as raw bytes reproduces the
/// original wire encoding unchanged, embedded dots and all.
fn wire_name(name: &Name) -> Option<Vec<u8>> {
	let mut wire = Vec::new();

	for label in name.iter() {
		if label.is_empty() || label.len() > 63 {
			return None;
		}

		wire.push(label.len() as u8);
		wire.extend_from_slice(label);
	}

	wire.push(0);

	(wire.len() <= MAX_NAME_BYTES).then_some(wire)
}
