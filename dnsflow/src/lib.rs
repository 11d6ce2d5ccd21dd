pub mod batch;
pub mod bpf;
pub mod config;
pub mod decap;
pub mod dns;
pub mod emit;
pub mod error;
pub mod stats;
pub mod supervisor;
pub mod timer;
pub mod worker;

use config::Config;
use runtime::logger::{Logger, WithPid};
use runtime::process::PidFile;

/// The whole process: install logging, parse flags, take the PID-file lock,
/// install signal handling, then run either the single-worker loop or the
/// multi-process supervisor depending on `-M`.
pub fn main() {
	log::set_boxed_logger(Box::new(WithPid::new(Logger)))
		.map(|()| log::set_max_level(log::LevelFilter::Info))
		.expect("logger installed exactly once");

	let config = Config::parse().unwrap_or_else(|err| fatal(&err));

	// Held for the lifetime of the process; dropping releases the flock.
	let _pid_file = config.pid_file.as_deref().map(|path| PidFile::create(path).unwrap_or_else(|()| std::process::exit(1)));

	let flags = runtime::signal::install().unwrap_or_else(|()| std::process::exit(1));

	let result = match config.fork_workers {
		Some(n) => supervisor::run_forked(&config, n, &flags),
		None => worker::run(&config, &flags),
	};

	if let Err(err) = result {
		fatal(&err);
	}
}

fn fatal(err: &impl std::fmt::Display) -> ! {
	eprintln!("{err}");
	std::process::exit(1);
}
