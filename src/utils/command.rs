//! Command execution primitives with consistent error handling.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::utils::cancel::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Run a command in `dir` while watching `cancel`.
///
/// The child is killed as soon as the token fires and the call returns
/// `run.cancelled`. Non-zero exits are returned as output, not errors, so
/// callers can decide what a failure means.
pub fn run_cancellable(
    dir: &Path,
    program: &str,
    args: &[&str],
    envs: &[(&str, &str)],
    context: &str,
    cancel: &CancellationToken,
) -> Result<Output> {
    if cancel.is_cancelled() {
        return Err(Error::run_cancelled(context));
    }

    let mut child = Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            Error::internal_io(
                format!("Failed to run {}: {}", context, e),
                Some(context.to_string()),
            )
        })?;

    // Drain pipes on their own threads so a chatty child can't block on a full pipe.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        if cancel.is_cancelled() {
            kill(&mut child);
            return Err(Error::run_cancelled(context));
        }
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill(&mut child);
                return Err(Error::internal_io(
                    format!("Failed to wait on {}: {}", context, e),
                    Some(context.to_string()),
                ));
            }
        }
    };

    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Extract error text from command output.
///
/// Prefers stderr, falls back to stdout if stderr is empty.
pub fn error_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::time::Instant;

    #[test]
    fn run_cancellable_captures_output_and_env() {
        let dir = std::env::temp_dir();
        let token = CancellationToken::new();
        let output = run_cancellable(
            &dir,
            "sh",
            &["-c", "echo \"$PROMOTER_TEST_VALUE\"; echo oops >&2; exit 3"],
            &[("PROMOTER_TEST_VALUE", "from-env")],
            "sh test",
            &token,
        )
        .unwrap();

        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "from-env");
        assert_eq!(error_text(&output), "oops");
    }

    #[test]
    fn run_cancellable_refuses_to_start_when_cancelled() {
        let dir = std::env::temp_dir();
        let token = CancellationToken::new();
        token.cancel();
        let err = run_cancellable(&dir, "echo", &["hi"], &[], "echo", &token).unwrap_err();
        assert_eq!(err.code, ErrorCode::RunCancelled);
    }

    #[test]
    fn run_cancellable_kills_child_on_cancel() {
        let dir = std::env::temp_dir();
        let token = CancellationToken::new();
        let trigger = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });

        let started = Instant::now();
        let err = run_cancellable(&dir, "sleep", &["10"], &[], "sleep", &token).unwrap_err();
        canceller.join().unwrap();

        assert_eq!(err.code, ErrorCode::RunCancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn error_text_prefers_stderr() {
        let output = Output {
            status: std::process::ExitStatus::default(),
            stdout: b"stdout content".to_vec(),
            stderr: b"stderr content".to_vec(),
        };
        assert_eq!(error_text(&output), "stderr content");
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let output = Output {
            status: std::process::ExitStatus::default(),
            stdout: b"stdout content".to_vec(),
            stderr: b"".to_vec(),
        };
        assert_eq!(error_text(&output), "stdout content");
    }
}
