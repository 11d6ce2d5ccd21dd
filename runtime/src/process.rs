//! Process lifecycle plumbing: forking worker processes, detecting a dead
//! parent, and holding an exclusive lock on a PID file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;

use log::warn;
use utils::error::*;

/// Ask the kernel to deliver SIGTERM to this process if its parent dies.
/// Linux-only; on other platforms the caller should fall back to polling
/// [`parent_exited`].
#[cfg(target_os = "linux")]
pub fn set_parent_death_signal() -> Result {
	let ret = unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) };

	if ret != 0 {
		return Err(warn!("prctl(PR_SET_PDEATHSIG) failed"));
	}

	Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn set_parent_death_signal() -> Result {
	Ok(())
}

/// True once the process has been reparented to init, i.e. its original
/// parent has exited. Used as a fallback where `PR_SET_PDEATHSIG` isn't
/// available.
pub fn parent_exited() -> bool {
	unsafe { libc::getppid() == 1 }
}

/// Fork the current process. Returns `Some(pid)` of the child in the
/// parent, `None` in the child.
pub fn fork() -> Result<Option<libc::pid_t>> {
	let pid = unsafe { libc::fork() };

	match pid {
		-1 => Err(warn!("fork() failed")),
		0 => Ok(None),
		pid => Ok(Some(pid)),
	}
}

pub fn kill(pid: libc::pid_t, signal: i32) -> Result {
	if unsafe { libc::kill(pid, signal) } != 0 {
		return Err(warn!("kill({pid}) failed"));
	}

	Ok(())
}

/// Reap one exited child without blocking. Returns the PID that exited, if
/// any were waiting.
pub fn reap_child() -> Result<Option<libc::pid_t>> {
	let pid = unsafe { libc::waitpid(-1, std::ptr::null_mut(), libc::WNOHANG) };

	match pid {
		0 => Ok(None),
		-1 => Ok(None),
		pid => Ok(Some(pid)),
	}
}

/// An exclusively-locked PID file, held open for the lifetime of the
/// process. The lock is released automatically when the file descriptor is
/// closed, i.e. on process exit or drop.
pub struct PidFile {
	file: File,
}

impl PidFile {
	pub fn create(path: &str) -> Result<Self> {
		let file = OpenOptions::new()
			.create(true)
			.write(true)
			.open(path)
			.map_err(|err| warn!("Unable to open PID file {path}: {err}"))?;

		if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } != 0 {
			return Err(warn!("PID file {path} is already locked by another process"));
		}

		let mut this = Self { file };
		this.write_pid()?;

		Ok(this)
	}

	fn write_pid(&mut self) -> Result {
		let pid = std::process::id();

		self.file.set_len(0).map_err(|err| warn!("Unable to truncate PID file: {err}"))?;
		self.file
			.write_all(format!("{pid}\n").as_bytes())
			.map_err(|err| warn!("Unable to write PID file: {err}"))?;
		self.file.sync_all().map_err(|err| warn!("Unable to fsync PID file: {err}"))?;

		Ok(())
	}
}
