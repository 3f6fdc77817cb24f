//! 큐 워커 -- netfilter 큐 바인딩과 패킷 판정 루프
//!
//! 큐 번호마다 [`nfq::Queue`] 하나를 열어 블로킹 태스크가 소유합니다.
//! 판정은 해당 태스크가 소유한 핸들로만 내려갑니다. 이벤트에서 큐를
//! 유추하지 않으므로 멀티 큐에서도 판정이 엇갈리지 않습니다.
//!
//! 패킷 하나는 처리 완료까지 달립니다. 정지는 취소 토큰으로 신호하며
//! 처리 중인 패킷의 판정이 끝난 뒤 워커가 내려갑니다.

use std::sync::Arc;
use std::time::Duration;

use nfq::{Queue, Verdict};
use tokio_util::sync::CancellationToken;

use netvine_core::error::{NetvineError, PipelineError};
use netvine_core::pipeline::{HealthStatus, Pipeline};
use netvine_core::storage::Storage;
use netvine_packet_engine::{hex_dump, PacketProcessor};

use crate::config::{parse_queue_spec, QueueConfig};
use crate::error::QueueError;

/// recv가 비어 있을 때의 폴링 간격
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// 수신 에러 후 재시도 간격
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// 워커 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum WorkerState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// netfilter 큐 워커
///
/// core의 [`Pipeline`] trait을 구현하여 데몬이 다른 모듈과 동일한
/// 생명주기로 관리합니다.
pub struct QueueWorker {
    config: QueueConfig,
    processor: Arc<PacketProcessor>,
    storage: Arc<dyn Storage>,
    state: WorkerState,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

/// 큐 워커 빌더
pub struct QueueWorkerBuilder {
    config: QueueConfig,
    processor: Option<Arc<PacketProcessor>>,
    storage: Option<Arc<dyn Storage>>,
}

impl QueueWorkerBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: QueueConfig::default(),
            processor: None,
            storage: None,
        }
    }

    /// 큐 설정을 지정합니다.
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// 패킷 프로세서를 지정합니다 (필수).
    pub fn processor(mut self, processor: Arc<PacketProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// 처리 로그 스토리지를 지정합니다 (필수).
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// 워커를 빌드합니다.
    ///
    /// # 에러
    /// - `PipelineError::InitFailed`: 필수 의존성 누락 또는 설정 오류
    pub fn build(self) -> Result<QueueWorker, NetvineError> {
        self.config.validate().map_err(NetvineError::from)?;

        let processor = self.processor.ok_or_else(|| {
            NetvineError::Pipeline(PipelineError::InitFailed(
                "processor is required".to_owned(),
            ))
        })?;
        let storage = self.storage.ok_or_else(|| {
            NetvineError::Pipeline(PipelineError::InitFailed("storage is required".to_owned()))
        })?;

        Ok(QueueWorker {
            config: self.config,
            processor,
            storage,
            state: WorkerState::Initialized,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }
}

impl Default for QueueWorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueWorker {
    /// 빌더를 반환합니다.
    pub fn builder() -> QueueWorkerBuilder {
        QueueWorkerBuilder::new()
    }

    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            WorkerState::Initialized => "initialized",
            WorkerState::Running => "running",
            WorkerState::Stopped => "stopped",
        }
    }

    /// 큐 하나를 열고 바인딩합니다.
    fn open_queue(&self, queue_num: u16) -> Result<Queue, QueueError> {
        let mut queue = Queue::open().map_err(QueueError::Open)?;
        queue.bind(queue_num).map_err(|e| QueueError::Configure {
            queue: queue_num,
            source: e,
        })?;
        queue
            .set_copy_range(queue_num, self.config.max_packet_len)
            .map_err(|e| QueueError::Configure {
                queue: queue_num,
                source: e,
            })?;
        queue
            .set_queue_max_len(queue_num, self.config.max_queue_len)
            .map_err(|e| QueueError::Configure {
                queue: queue_num,
                source: e,
            })?;
        queue.set_nonblocking(true);
        Ok(queue)
    }
}

impl Pipeline for QueueWorker {
    /// 설정된 모든 큐에 바인딩하고 워커 태스크를 스폰합니다.
    async fn start(&mut self) -> Result<(), NetvineError> {
        if self.state == WorkerState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let queue_nums = parse_queue_spec(&self.config.queues).map_err(NetvineError::from)?;
        tracing::info!(
            queues = ?queue_nums,
            family = %self.config.family,
            "starting nfqueue workers"
        );

        self.cancel = CancellationToken::new();

        for queue_num in queue_nums {
            let queue = self.open_queue(queue_num).map_err(NetvineError::from)?;

            let processor = Arc::clone(&self.processor);
            let storage = Arc::clone(&self.storage);
            let cancel = self.cancel.child_token();

            self.tasks.push(tokio::task::spawn_blocking(move || {
                worker_loop(queue, queue_num, processor, storage, cancel);
            }));

            tracing::info!(queue = queue_num, "nfqueue started");
        }

        self.state = WorkerState::Running;
        Ok(())
    }

    /// 모든 워커를 정지하고 큐를 닫습니다.
    ///
    /// 처리 중인 패킷은 자연스럽게 완료됩니다. 개별 큐의 닫기 실패는
    /// 로그로 남기고 무시합니다.
    async fn stop(&mut self) -> Result<(), NetvineError> {
        if self.state != WorkerState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping nfqueue workers");
        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "nfqueue worker task panicked");
            }
        }

        self.state = WorkerState::Stopped;
        tracing::info!("nfqueue stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            WorkerState::Running => HealthStatus::Healthy,
            WorkerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            WorkerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 큐 하나의 수신/판정 루프. 블로킹 스레드에서 돌며 큐 핸들을 소유합니다.
fn worker_loop(
    mut queue: Queue,
    queue_num: u16,
    processor: Arc<PacketProcessor>,
    storage: Arc<dyn Storage>,
    cancel: CancellationToken,
) {
    tracing::debug!(queue = queue_num, "nfqueue worker loop entered");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match queue.recv() {
            Ok(msg) => handle_message(&mut queue, queue_num, msg, &processor, &storage),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                tracing::error!(queue = queue_num, error = %e, "nfqueue receive error");
                std::thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    if let Err(e) = queue.unbind(queue_num) {
        tracing::warn!(queue = queue_num, error = %e, "failed to unbind queue");
    }
    tracing::debug!(queue = queue_num, "nfqueue worker loop exited");
}

/// 패킷 하나를 처리하고 판정을 내립니다. 관측한 패킷 ID마다 정확히
/// 한 번의 판정이 나갑니다.
fn handle_message(
    queue: &mut Queue,
    queue_num: u16,
    mut msg: nfq::Message,
    processor: &PacketProcessor,
    storage: &Arc<dyn Storage>,
) {
    let packet_id = msg.get_packet_id();
    let raw = msg.get_payload().to_vec();

    // 기본 판정은 accept (통과)
    msg.set_verdict(Verdict::Accept);

    if raw.is_empty() {
        tracing::warn!(
            queue = queue_num,
            packet_id = packet_id,
            "received packet with empty payload"
        );
        if let Err(e) = queue.verdict(msg) {
            tracing::error!(queue = queue_num, packet_id = packet_id, error = %e, "failed to set verdict");
        }
        return;
    }

    if tracing::enabled!(tracing::Level::TRACE) {
        for line in hex_dump(&raw).lines() {
            tracing::trace!(packet_id = packet_id, line = line, "packet hex dump");
        }
    }

    let decision = processor.process(&raw);
    let rule_name = decision
        .log
        .as_ref()
        .map(|log| log.rule_name.clone())
        .unwrap_or_default();

    match decision.payload {
        Some(modified) => {
            let modified_len = modified.len();
            msg.set_payload(modified);

            if let Err(e) = queue.try_verdict(&msg) {
                tracing::error!(
                    queue = queue_num,
                    packet_id = packet_id,
                    error = %e,
                    "failed to set verdict with modified packet"
                );
                // 변형 판정 실패 시 원본 accept로 폴백
                msg.set_payload(raw.clone());
                if let Err(e) = queue.try_verdict(&msg) {
                    tracing::error!(
                        queue = queue_num,
                        packet_id = packet_id,
                        error = %e,
                        "failed to set fallback verdict"
                    );
                }
            } else {
                tracing::info!(
                    rule = rule_name.as_str(),
                    original_size = raw.len(),
                    modified_size = modified_len,
                    "packet modified and sent"
                );
            }
        }
        None => {
            if let Err(e) = queue.verdict(msg) {
                tracing::error!(queue = queue_num, packet_id = packet_id, error = %e, "failed to set verdict");
            }
        }
    }

    if let Some(log) = decision.log {
        if let Err(e) = storage.insert_process_log(log) {
            tracing::error!(error = %e, "failed to persist process log");
        }
    }
}
