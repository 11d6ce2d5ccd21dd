//! Signal-driven shutdown. SIGINT and SIGTERM both request a clean exit;
//! SIGCHLD only needs to wake the supervisor loop so it can reap whichever
//! worker exited — the actual reaping happens in [`crate::process`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use utils::error::*;

pub struct Flags {
	pub exit: Arc<AtomicBool>,
	pub child: Arc<AtomicBool>,
}

impl Flags {
	pub fn should_exit(&self) -> bool {
		self.exit.load(Ordering::Relaxed)
	}

	pub fn child_exited(&self) -> bool {
		self.child.swap(false, Ordering::Relaxed)
	}
}

/// Register handlers for SIGINT, SIGTERM and SIGCHLD and return the flags
/// they set. Safe to call once per process.
pub fn install() -> Result<Flags> {
	let exit = Arc::new(AtomicBool::new(false));
	let child = Arc::new(AtomicBool::new(false));

	signal_hook::flag::register(signal_hook::consts::SIGINT, exit.clone()).map_err(|err| log::error!("Unable to install SIGINT handler: {err}"))?;

	signal_hook::flag::register(signal_hook::consts::SIGTERM, exit.clone()).map_err(|err| log::error!("Unable to install SIGTERM handler: {err}"))?;

	signal_hook::flag::register(signal_hook::consts::SIGCHLD, child.clone()).map_err(|err| log::error!("Unable to install SIGCHLD handler: {err}"))?;

	Ok(Flags { exit, child })
}
