use crate::config::{Config, Shard};
use crate::error::InitError;
use crate::worker;

/// Forks `n - 1` children, each running its own shard of the fleet, then
/// runs this process's own shard (`proc_i = 1`) inline. If any child dies,
/// or a shutdown signal arrives, the remaining children are sent SIGTERM
/// before this function returns.
pub fn run_forked(base: &Config, n: u32, flags: &runtime::signal::Flags) -> Result<(), InitError> {
	let mut children = Vec::new();

	for proc_i in 2..=n {
		match runtime::process::fork().map_err(|_| InitError("fork() failed".into()))? {
			Some(pid) => children.push(pid),
			None => run_child(base, Shard { proc_i, n_procs: n }, flags),
		}
	}

	let result = worker::run(&base.with_shard(Shard { proc_i: 1, n_procs: n }), flags);

	clean_exit(&children);

	result
}

/// A forked child never returns: it arranges to die with its parent, runs
/// its shard's worker loop, and exits with the loop's result.
fn run_child(base: &Config, shard: Shard, flags: &runtime::signal::Flags) -> ! {
	// set_parent_death_signal logs its own warning on failure.
	let _ = runtime::process::set_parent_death_signal();

	let result = worker::run(&base.with_shard(shard), flags);

	std::process::exit(match result {
		Ok(()) => 0,
		Err(err) => {
			eprintln!("{err}");
			1
		}
	});
}

/// Reap whatever children have already exited and send the rest SIGTERM,
/// per the group-shutdown rule: one dead worker brings down the fleet.
fn clean_exit(children: &[libc::pid_t]) {
	while let Ok(Some(_)) = runtime::process::reap_child() {}

	for &pid in children {
		// kill logs its own warning on failure (e.g. the child already died).
		let _ = runtime::process::kill(pid, libc::SIGTERM);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clean_exit_with_no_children_is_a_no_op() {
		clean_exit(&[]);
	}

	#[test]
	fn clean_exit_reaps_an_already_exited_child() {
		match runtime::process::fork().unwrap() {
			Some(pid) => {
				std::thread::sleep(std::time::Duration::from_millis(50));
				clean_exit(&[pid]);
			}
			None => std::process::exit(0),
		}
	}
}
