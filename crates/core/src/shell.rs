//! 셸 실행기 -- 호스트 특권 명령 실행
//!
//! [`CommandRunner`] trait은 네트워크 제어 계층과 `shell` 액션이 사용하는
//! 명령 실행 경계입니다. 운영 코드는 [`ShellRunner`]를 사용하고,
//! 테스트는 기록용 페이크 구현을 주입합니다.

use std::process::Command;
use std::time::{Duration, Instant};

use crate::error::ShellError;

/// 명령 실행 추상화
///
/// 성공 시 stdout 전체를 반환합니다. 종료 코드가 0이 아니거나
/// stderr 출력이 있으면 [`ShellError`]를 반환합니다.
/// 호출자 관점에서 실행은 직렬이며 내부 큐잉은 없습니다.
pub trait CommandRunner: Send + Sync {
    /// 명령 한 줄을 호스트 셸에서 실행합니다.
    fn run(&self, command: &str) -> Result<String, ShellError>;
}

/// `sh -c` 기반 명령 실행기
///
/// 출력은 해석하지 않습니다. 파싱은 호출자의 몫입니다.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    /// 선택적 실행 제한 시간 (None = 무제한)
    timeout: Option<Duration>,
}

impl ShellRunner {
    /// 제한 시간 없는 실행기를 생성합니다.
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// 제한 시간이 있는 실행기를 생성합니다.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    fn run_bounded(&self, command: &str, timeout: Duration) -> Result<String, ShellError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| ShellError::Spawn {
                command: command.to_owned(),
                source: e,
            })?;

        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ShellError::Timeout {
                            command: command.to_owned(),
                            secs: timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    return Err(ShellError::Spawn {
                        command: command.to_owned(),
                        source: e,
                    });
                }
            }
        }

        let output = child.wait_with_output().map_err(|e| ShellError::Spawn {
            command: command.to_owned(),
            source: e,
        })?;
        collect(command, output)
    }
}

fn collect(command: &str, output: std::process::Output) -> Result<String, ShellError> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() || !stderr.trim().is_empty() {
        return Err(ShellError::Failed {
            command: command.to_owned(),
            status: output.status.code(),
            stderr: stderr.trim_end().to_owned(),
        });
    }

    Ok(stdout)
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<String, ShellError> {
        tracing::debug!(command = command, "executing shell command");

        if let Some(timeout) = self.timeout {
            return self.run_bounded(command, timeout);
        }

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .map_err(|e| ShellError::Spawn {
                command: command.to_owned(),
                source: e,
            })?;
        collect(command, output)
    }
}
