// ytvm-aio/src/process.rs
use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, error};
use ytvm_common::error::{Result, YtvmError};

/// How the delegated binary terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    Code(i32),
    /// Terminated by the given signal (Unix only).
    Signal(i32),
}

impl ChildExit {
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ChildExit::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ChildExit::Signal(signal);
            }
        }
        ChildExit::Code(0)
    }

    /// Status the launcher should exit with; signals follow the shell's
    /// `128 + n` convention.
    pub fn exit_code(self) -> i32 {
        match self {
            ChildExit::Code(code) => code,
            ChildExit::Signal(signal) => 128 + signal,
        }
    }
}

/// Runs `binary` with `args`, sharing the launcher's stdin, stdout and stderr,
/// and waits for it to exit.
///
/// Ctrl-C is left to the child while it runs: the terminal delivers it to the
/// whole foreground process group, and the launcher keeps waiting so it can
/// report the child's status. A SIGTERM sent to the launcher kills the child
/// and is reported as `ChildExit::Signal(15)`. Both handlers are in place
/// before the child is spawned.
pub async fn run_delegate(binary: &Path, args: &[OsString]) -> Result<ChildExit> {
    debug!("Delegating to {} with {} argument(s)", binary.display(), args.len());

    let mut interrupts = listen(SignalKind::Interrupt);
    let mut terminations = listen(SignalKind::Terminate);

    let mut cmd = Command::new(binary);
    cmd.args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let mut child = cmd.spawn().map_err(|e| {
        error!("Failed to spawn {}: {}", binary.display(), e);
        YtvmError::LaunchError(format!("{}: {}", binary.display(), e))
    })?;

    // `Child::wait` is cancel safe, so it can be re-polled after each interrupt.
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(()) = next_signal(&mut interrupts) => {
                debug!("Interrupt received; waiting for the delegated process to exit");
            }
            Some(()) = next_signal(&mut terminations) => {
                debug!("Launcher received SIGTERM; stopping {}", binary.display());
                if let Err(e) = child.kill().await {
                    error!("Failed to stop {}: {}", binary.display(), e);
                }
                return Ok(ChildExit::Signal(SIGTERM));
            }
        }
    };

    let status = status.map_err(|e| {
        YtvmError::LaunchError(format!(
            "{}: failed waiting for process: {}",
            binary.display(),
            e
        ))
    })?;
    let exit = ChildExit::from_status(status);
    debug!("{} exited with {:?}", binary.display(), exit);
    Ok(exit)
}

const SIGTERM: i32 = 15;

#[derive(Debug, Clone, Copy)]
enum SignalKind {
    Interrupt,
    Terminate,
}

#[cfg(unix)]
type SignalListener = tokio::signal::unix::Signal;
#[cfg(windows)]
type SignalListener = tokio::signal::windows::CtrlC;

/// Registers a listener immediately, replacing the default action for the
/// signal. Returns `None` if the platform has no such signal or registration
/// fails.
#[cfg(unix)]
fn listen(kind: SignalKind) -> Option<SignalListener> {
    use tokio::signal::unix::{signal, SignalKind as UnixSignal};

    let unix_kind = match kind {
        SignalKind::Interrupt => UnixSignal::interrupt(),
        SignalKind::Terminate => UnixSignal::terminate(),
    };
    signal(unix_kind)
        .map_err(|e| debug!("Could not register {:?} handler: {}", kind, e))
        .ok()
}

#[cfg(windows)]
fn listen(kind: SignalKind) -> Option<SignalListener> {
    match kind {
        SignalKind::Interrupt => tokio::signal::windows::ctrl_c()
            .map_err(|e| debug!("Could not register {:?} handler: {}", kind, e))
            .ok(),
        SignalKind::Terminate => None,
    }
}

async fn next_signal(listener: &mut Option<SignalListener>) -> Option<()> {
    match listener {
        Some(listener) => listener.recv().await,
        None => std::future::pending().await,
    }
}
