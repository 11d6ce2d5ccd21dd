use std::time::SystemTime;

use log::Level;
use nu_ansi_term::ansi::RESET;
use nu_ansi_term::{Color, Style};

/// Formats log lines with a colored level, timestamp, and target.
pub struct Logger;

impl log::Log for Logger {
	fn enabled(&self, _: &log::Metadata) -> bool {
		true
	}

	fn log(&self, record: &log::Record) {
		let time = humantime::format_rfc3339_nanos(SystemTime::now());

		let dim = Style::new().dimmed().prefix();

		eprintln!(
			"{dim}{time}{RESET} {}{:5}{RESET} {}{}{RESET}{dim}:{RESET} {}",
			match record.level() {
				Level::Trace => Color::Purple,
				Level::Debug => Color::Blue,
				Level::Info => Color::Green,
				Level::Warn => Color::Yellow,
				Level::Error => Color::Red,
			}
			.bold()
			.prefix(),
			record.level(),
			Style::new().bold().prefix(),
			record.target(),
			record.args()
		);
	}

	fn flush(&self) {}
}

/// Wraps a logger to prefix every line with the worker's OS PID, so that
/// log output from several forked workers can be told apart once
/// interleaved on a shared stderr.
///
/// The PID is read fresh on every line rather than cached at construction:
/// `log::set_boxed_logger` can only succeed once per process, and `fork()`
/// duplicates the "a logger is already installed" flag along with
/// everything else, so a forked child can't re-install a logger with its
/// own PID baked in — it inherits the parent's already-installed instance.
/// Reading `std::process::id()` at log time sidesteps that entirely: it's
/// always correct in whichever process ends up calling `log()`.
pub struct WithPid<L> {
	inner: L,
}

impl<L> WithPid<L> {
	pub fn new(inner: L) -> Self {
		Self { inner }
	}
}

impl<L: log::Log> log::Log for WithPid<L> {
	fn enabled(&self, metadata: &log::Metadata) -> bool {
		self.inner.enabled(metadata)
	}

	fn log(&self, record: &log::Record) {
		if !self.enabled(record.metadata()) {
			return;
		}

		eprint!("[{}] ", std::process::id());

		self.inner.log(record);
	}

	fn flush(&self) {
		self.inner.flush();
	}
}
