use std::net::Ipv4Addr;

use dnsflow::batch::Batcher;
use dnsflow::dns::DnsResponse;

#[test]
fn single_a_response_round_trips_through_the_public_batcher_api() {
	let mut batcher = Batcher::new();
	let client = Ipv4Addr::new(10, 0, 0, 7);
	let response = DnsResponse {
		names: vec![b"\x07example\x03com\x00".to_vec()],
		ips: vec![Ipv4Addr::new(93, 184, 216, 34)],
	};

	batcher.append(client, &response, |_| {});

	let mut out = None;
	batcher.flush(&mut |buf| out = Some(buf.to_vec()));
	let buf = out.unwrap();

	assert_eq!(buf[0], 2); // version
	assert_eq!(buf[1], 1); // sets_count
	assert_eq!(&buf[8..12], &client.octets());
	assert_eq!(buf[12], 1); // names_count
	assert_eq!(buf[13], 1); // ips_count
}

#[test]
fn a_cname_chain_contributes_one_set_with_every_name_appended() {
	let mut batcher = Batcher::new();
	let response = DnsResponse {
		names: vec![b"\x03www\x07example\x03com\x00".to_vec(), b"\x07example\x03com\x00".to_vec()],
		ips: vec![Ipv4Addr::new(93, 184, 216, 34)],
	};

	batcher.append(Ipv4Addr::new(10, 0, 0, 7), &response, |_| {});

	let mut out = None;
	batcher.flush(&mut |buf| out = Some(buf.to_vec()));
	let buf = out.unwrap();

	assert_eq!(buf[1], 1); // still a single set
	assert_eq!(buf[12], 2); // names_count covers both the owner and the CNAME target
}
