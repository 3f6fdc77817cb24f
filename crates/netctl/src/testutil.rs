//! 테스트 전용 페이크 -- 명령 기록과 응답 주입
//!
//! [`FakeRunner`]는 실행된 명령을 순서대로 기록하고, 명령별 canned 출력과
//! 실패 주입을 지원합니다. 테스트는 [`FakeRunner::log_handle`]로 기록
//! 핸들을 미리 받아 정확한 명령 문자열을 검증합니다.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use netvine_core::error::ShellError;
use netvine_core::shell::CommandRunner;

/// 기록용 페이크 명령 실행기
#[derive(Default)]
pub(crate) struct FakeRunner {
    log: Arc<Mutex<Vec<String>>>,
    responses: Mutex<HashMap<String, VecDeque<String>>>,
    failures: Mutex<HashSet<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 실행 기록 핸들을 반환합니다 (Arc로 이동하기 전에 확보).
    pub fn log_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }

    /// 특정 명령에 고정 출력을 설정합니다.
    pub fn respond_to(&self, command: &str, output: &str) {
        self.responses
            .lock()
            .unwrap()
            .entry(command.to_owned())
            .or_default()
            .push_back(output.to_owned());
        // 마지막 응답은 이후 호출에도 반복되도록 바닥에 남긴다
    }

    /// 특정 명령에 호출 순서대로 소비되는 출력 목록을 설정합니다.
    ///
    /// 목록이 소진되면 마지막 출력이 반복됩니다.
    pub fn respond_sequence(&self, command: &str, outputs: &[&str]) {
        let mut responses = self.responses.lock().unwrap();
        let queue = responses.entry(command.to_owned()).or_default();
        for output in outputs {
            queue.push_back((*output).to_owned());
        }
    }

    /// 특정 명령이 실패하도록 설정합니다.
    pub fn fail_on(&self, command: &str) {
        self.failures.lock().unwrap().insert(command.to_owned());
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &str) -> Result<String, ShellError> {
        self.log.lock().unwrap().push(command.to_owned());

        if self.failures.lock().unwrap().contains(command) {
            return Err(ShellError::Failed {
                command: command.to_owned(),
                status: Some(1),
                stderr: "injected failure".to_owned(),
            });
        }

        let mut responses = self.responses.lock().unwrap();
        if let Some(queue) = responses.get_mut(command) {
            if queue.len() > 1 {
                return Ok(queue.pop_front().unwrap_or_default());
            }
            if let Some(last) = queue.front() {
                return Ok(last.clone());
            }
        }
        Ok(String::new())
    }
}
