//! `runguard exec`: a child process as a guarded work unit.
//!
//! The child is spawned inside the work unit and killed as soon as the run
//! scope is cancelled, so a timed-out command does not outlive the run by more
//! than the time it takes to deliver the kill.

use std::io;
use std::process::{ExitCode, ExitStatus};

use tokio::process::Command;

use runguard_core::{CancelScope, ExecutionGuard, Outcome, TimeoutCause};

/// Same code `timeout(1)` uses.
pub const EXIT_TIMED_OUT: u8 = 124;
pub const EXIT_FAULTED: u8 = 125;
pub const EXIT_NOT_STARTED: u8 = 127;
pub const EXIT_CANCELLED: u8 = 130;

#[derive(Debug)]
pub enum ChildExit {
    Exited(ExitStatus),
    /// Killed because the run scope was cancelled.
    Killed,
}

pub async fn run(guard: ExecutionGuard, ambient: &CancelScope, argv: Vec<String>) -> ExitCode {
    let mut argv = argv.into_iter();
    let Some(program) = argv.next() else {
        tracing::error!("No program given");
        return ExitCode::from(EXIT_NOT_STARTED);
    };
    let args: Vec<String> = argv.collect();

    tracing::debug!(
        program = %program,
        timeout_ms = guard.deadline().as_millis(),
        "Starting guarded command"
    );

    let label = program.clone();
    let outcome = guard
        .run(ambient, move |scope| run_child(program, args, scope))
        .await;

    exit_code(&label, outcome)
}

async fn run_child(
    program: String,
    args: Vec<String>,
    scope: CancelScope,
) -> io::Result<ChildExit> {
    let mut child = Command::new(&program)
        .args(&args)
        .kill_on_drop(true)
        .spawn()?;

    tokio::select! {
        status = child.wait() => status.map(ChildExit::Exited),
        () = scope.cancelled() => {
            tracing::debug!(program = %program, "Run settled before child exited; killing it");
            child.kill().await?;
            Ok(ChildExit::Killed)
        }
    }
}

fn exit_code(program: &str, outcome: Outcome<io::Result<ChildExit>>) -> ExitCode {
    match outcome {
        Outcome::Completed(Ok(ChildExit::Exited(status))) => status_code(status),
        Outcome::Completed(Ok(ChildExit::Killed)) => ExitCode::from(EXIT_CANCELLED),
        Outcome::Completed(Err(err)) => {
            tracing::error!(program, "Failed to start command: {err}");
            ExitCode::from(EXIT_NOT_STARTED)
        }
        Outcome::TimedOut(TimeoutCause::DeadlineExceeded { deadline }) => {
            tracing::error!(program, ?deadline, "Command timed out");
            ExitCode::from(EXIT_TIMED_OUT)
        }
        Outcome::TimedOut(TimeoutCause::Cancelled) => ExitCode::from(EXIT_CANCELLED),
        Outcome::Faulted(fault) => {
            tracing::error!(program, "Command runner faulted: {fault}");
            ExitCode::from(EXIT_FAULTED)
        }
    }
}

fn status_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => signal_code(status),
    }
}

#[cfg(unix)]
fn signal_code(status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    let signal = status.signal().unwrap_or(0);
    ExitCode::from(u8::try_from(128 + signal).unwrap_or(1))
}

#[cfg(not(unix))]
fn signal_code(_status: ExitStatus) -> ExitCode {
    ExitCode::from(1)
}
