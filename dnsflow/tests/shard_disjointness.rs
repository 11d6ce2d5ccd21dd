//! Exercises the modulo-residue partition `bpf::build`'s shard predicate
//! (`ip[off:4] - ip[off:4] / n * n = proc_i - 1`) is built on: for a fixed
//! `n_procs`, every client value must satisfy exactly one `proc_i`'s
//! residue check. A real BPF engine isn't available at test time, but the
//! underlying arithmetic is plain and worth pinning down directly.

#[test]
fn every_client_value_matches_exactly_one_shard() {
	for n_procs in 2u32..=8 {
		for client in 0u32..=1024 {
			let matches = (1..=n_procs).filter(|&proc_i| client % n_procs == proc_i - 1).count();
			assert_eq!(matches, 1, "n_procs={n_procs} client={client}");
		}
	}
}

#[test]
fn a_single_worker_has_no_shard_predicate() {
	let n_procs = 1u32;
	for client in 0u32..=255 {
		let matches = (1..=n_procs).filter(|&proc_i| client % n_procs == proc_i - 1).count();
		assert_eq!(matches, 1, "client={client}");
	}
}
