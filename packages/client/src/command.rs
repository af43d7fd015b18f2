//! Running external commands, optionally as the desktop user.
//!
//! The color-scheme command must talk to the desktop user's session bus, so
//! when the client runs with elevated privileges it is executed through
//! [`DesktopUserRunner`], which drops to that user's uid/gid first.
//!
//! Every command is bounded by a timeout; a command that hangs is killed.

use std::{
    io::Read,
    os::unix::process::CommandExt,
    process::{Child, Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};

use crate::error::ActuatorError;

/// Upper bound for one actuator command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Capability to run a program to completion
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<(), ActuatorError>;
}

/// Runs commands as the current user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectRunner {
    timeout: Duration,
}

impl DirectRunner {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_COMMAND_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for DirectRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for DirectRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<(), ActuatorError> {
        let mut command = Command::new(program);
        command.args(args);
        execute(command, program, self.timeout)
    }
}

/// Runs commands as another (non-privileged) user with access to that
/// user's D-Bus session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesktopUserRunner {
    uid: u32,
    gid: u32,
    timeout: Duration,
}

impl DesktopUserRunner {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid,
            gid,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn runtime_dir(&self) -> String {
        format!("/run/user/{}", self.uid)
    }

    pub fn session_bus_address(&self) -> String {
        format!("unix:path={}/bus", self.runtime_dir())
    }
}

impl CommandRunner for DesktopUserRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<(), ActuatorError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .env("XDG_RUNTIME_DIR", self.runtime_dir())
            .env("DBUS_SESSION_BUS_ADDRESS", self.session_bus_address())
            .gid(self.gid)
            .uid(self.uid);
        execute(command, program, self.timeout)
    }
}

fn execute(mut command: Command, program: &str, timeout: Duration) -> Result<(), ActuatorError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ActuatorError::NotFound {
                program: program.to_string(),
            },
            _ => ActuatorError::Spawn {
                program: program.to_string(),
                source,
            },
        })?;

    let status = wait_with_timeout(&mut child, program, timeout)?;
    if status.success() {
        return Ok(());
    }

    let mut stderr = Vec::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_end(&mut stderr);
    }
    Err(ActuatorError::Failed {
        program: program.to_string(),
        code: status.code(),
        stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
    })
}

fn wait_with_timeout(
    child: &mut Child,
    program: &str,
    timeout: Duration,
) -> Result<ExitStatus, ActuatorError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                tracing::warn!("'{}' did not finish within {:?}, killing it", program, timeout);
                // Already exited between the poll and the kill is fine
                let _ = child.kill();
                let _ = child.wait();
                return Err(ActuatorError::TimedOut {
                    program: program.to_string(),
                    timeout,
                });
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(source) => {
                return Err(ActuatorError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_runner_success() {
        // テスト項目: 正常終了するコマンドは Ok を返す
        // given (前提条件):
        let runner = DirectRunner::new();

        // when (操作):
        let result = runner.run("true", &[]);

        // then (期待する結果):
        assert!(result.is_ok());
    }

    #[test]
    fn test_direct_runner_reports_exit_status() {
        // テスト項目: 失敗したコマンドは終了コードと stderr 付きの Failed エラーになる
        // given (前提条件):
        let runner = DirectRunner::new();
        let args = vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()];

        // when (操作):
        let result = runner.run("sh", &args);

        // then (期待する結果):
        match result {
            Err(ActuatorError::Failed { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_direct_runner_reports_missing_program() {
        // テスト項目: 存在しないコマンドは NotFound エラーになる
        // given (前提条件):
        let runner = DirectRunner::new();

        // when (操作):
        let result = runner.run("joybridge-no-such-command", &[]);

        // then (期待する結果):
        assert!(matches!(result, Err(ActuatorError::NotFound { .. })));
    }

    #[test]
    fn test_direct_runner_kills_hung_command() {
        // テスト項目: タイムアウトを超えたコマンドは強制終了され TimedOut エラーになる
        // given (前提条件):
        let runner = DirectRunner::with_timeout(Duration::from_millis(100));
        let started = Instant::now();

        // when (操作):
        let result = runner.run("sleep", &["5".to_string()]);

        // then (期待する結果):
        assert!(matches!(result, Err(ActuatorError::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_desktop_user_session_paths() {
        // テスト項目: デスクトップユーザーのランタイムディレクトリとセッションバスのアドレス
        // given (前提条件):
        let runner = DesktopUserRunner::new(1000, 1000);

        // when (操作) / then (期待する結果):
        assert_eq!(runner.runtime_dir(), "/run/user/1000");
        assert_eq!(runner.session_bus_address(), "unix:path=/run/user/1000/bus");
    }
}
