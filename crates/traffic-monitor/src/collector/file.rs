//! 파일 추적기 -- 액세스 로그 파일에 추가되는 라인을 수집합니다.
//!
//! `tail -F`와 유사한 동작을 폴링 방식으로 구현합니다.
//!
//! # 동작
//! - `poll_interval_ms`마다 파일 메타데이터를 확인하고 새로 추가된 바이트를 읽습니다.
//! - 개행이 오지 않은 마지막 조각은 버퍼에 보관했다가 개행이 도착하면 내보냅니다.
//! - 파일 크기가 읽은 위치보다 작아지면 (truncation) 처음부터 다시 읽습니다.
//! - inode가 바뀌면 (logrotate 등, Unix 전용) 새 파일을 처음부터 읽습니다.
//! - 파일이 없으면 생길 때까지 기다립니다 (경고는 한 번만).

use std::path::PathBuf;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use trafficwatch_core::metrics as m;

use super::{CollectorStatus, RawLine};
use crate::error::MonitorError;

/// 한 번의 read 호출로 읽을 최대 바이트 수
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// 파일 추적기 설정
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// 추적할 파일 경로
    pub path: PathBuf,
    /// 파일 상태 체크 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 시작 시 기존 내용을 읽을지 여부 (false면 파일 끝부터)
    pub read_from_start: bool,
    /// 최대 라인 길이 (바이트, 초과 시 드롭)
    pub max_line_length: usize,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/tmp/access.log"),
            poll_interval_ms: 250,
            read_from_start: true,
            max_line_length: 64 * 1024, // 64KB
        }
    }
}

/// 파일 추적기
///
/// 완성된 라인을 순서대로 [`RawLine`]으로 채널에 보냅니다.
/// 수신측이 닫히거나 취소 토큰이 취소되면 종료합니다.
pub struct FileTailer {
    config: TailerConfig,
    tx: mpsc::Sender<RawLine>,
    status: CollectorStatus,
    /// 다음에 읽을 바이트 오프셋
    offset: u64,
    /// 현재 파일의 식별자 (Unix에서는 inode)
    file_id: Option<u64>,
    /// 파일을 한 번이라도 본 적이 있는지
    seen: bool,
    /// 파일 부재 경고를 이미 출력했는지
    missing_warned: bool,
    /// 개행을 기다리는 미완성 라인
    partial: BytesMut,
    /// 너무 긴 라인의 나머지를 버리는 중
    discarding: bool,
    /// 지금까지 본 라인 수
    line_no: u64,
}

impl FileTailer {
    /// 새 파일 추적기를 생성합니다.
    pub fn new(config: TailerConfig, tx: mpsc::Sender<RawLine>) -> Self {
        Self {
            config,
            tx,
            status: CollectorStatus::Idle,
            offset: 0,
            file_id: None,
            seen: false,
            missing_warned: false,
            partial: BytesMut::new(),
            discarding: false,
            line_no: 0,
        }
    }

    /// 추적 루프를 실행합니다.
    ///
    /// 취소되거나 수신측이 닫힐 때까지 실행됩니다.
    /// `tokio::spawn`으로 별도 태스크에서 호출하세요.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), MonitorError> {
        self.status = CollectorStatus::Running;
        info!(
            path = %self.config.path.display(),
            poll_interval_ms = self.config.poll_interval_ms,
            read_from_start = self.config.read_from_start,
            "file tailer started"
        );

        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("file tailer received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if self.tx.is_closed() {
                debug!("line receiver closed, stopping file tailer");
                break;
            }

            match self.poll_once().await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("line receiver closed, stopping file tailer");
                    break;
                }
                Err(e) => {
                    self.status = CollectorStatus::Error(e.to_string());
                    return Err(e);
                }
            }
        }

        self.status = CollectorStatus::Stopped;
        info!(lines = self.line_no, "file tailer stopped");
        Ok(())
    }

    /// 파일을 한 번 확인하고 새 라인을 보냅니다.
    ///
    /// 수신측이 닫혔으면 `Ok(false)`를 반환합니다.
    async fn poll_once(&mut self) -> Result<bool, MonitorError> {
        let path = self.config.path.clone();
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !self.missing_warned {
                    warn!(path = %path.display(), "access log not found, waiting for it to appear");
                    self.missing_warned = true;
                }
                return Ok(true);
            }
            Err(e) => return Err(self.tail_error(e)),
        };

        let appeared = self.missing_warned;
        if appeared {
            info!(path = %path.display(), "access log appeared");
            self.missing_warned = false;
        }

        let len = meta.len();
        let id = file_id(&meta);

        if !self.seen {
            self.seen = true;
            self.file_id = id;
            // 시작 시 없던 파일이 나중에 생기면 처음부터 읽음
            self.offset = if self.config.read_from_start || appeared {
                0
            } else {
                len
            };
        } else if id != self.file_id {
            info!(path = %path.display(), "access log rotated, reopening from start");
            metrics::counter!(m::TAILER_REOPENS_TOTAL).increment(1);
            self.file_id = id;
            self.reset();
        } else if len < self.offset {
            info!(
                path = %path.display(),
                size = len,
                offset = self.offset,
                "access log truncated, reading from start"
            );
            metrics::counter!(m::TAILER_REOPENS_TOTAL).increment(1);
            self.reset();
        }

        if len == self.offset {
            return Ok(true);
        }

        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| self.tail_error(e))?;
        file.seek(std::io::SeekFrom::Start(self.offset))
            .await
            .map_err(|e| self.tail_error(e))?;

        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let n = file.read(&mut chunk).await.map_err(|e| self.tail_error(e))?;
            if n == 0 {
                break;
            }
            self.offset += n as u64;
            self.partial.extend_from_slice(&chunk[..n]);
            if !self.drain_lines().await {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// 버퍼에서 완성된 라인을 꺼내 보냅니다.
    ///
    /// 수신측이 닫혔으면 `false`를 반환합니다.
    async fn drain_lines(&mut self) -> bool {
        let max = self.config.max_line_length;

        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let raw = self.partial.split_to(pos + 1);
            self.line_no += 1;

            if self.discarding {
                self.discarding = false;
                continue;
            }

            let mut bytes = &raw[..pos];
            if let Some(stripped) = bytes.strip_suffix(b"\r") {
                bytes = stripped;
            }

            if bytes.len() > max {
                warn!(
                    line_no = self.line_no,
                    length = bytes.len(),
                    max_line_length = max,
                    "dropping overlong line"
                );
                metrics::counter!(m::TAILER_LINES_DROPPED_TOTAL).increment(1);
                continue;
            }

            let line = RawLine {
                line: String::from_utf8_lossy(bytes).into_owned(),
                line_no: self.line_no,
            };
            metrics::counter!(m::TAILER_LINES_READ_TOTAL).increment(1);

            if self.tx.send(line).await.is_err() {
                return false;
            }
        }

        // 개행 없이 한도를 넘은 조각은 버리고 다음 개행까지 무시
        if !self.discarding && self.partial.len() > max {
            warn!(
                line_no = self.line_no + 1,
                buffered = self.partial.len(),
                max_line_length = max,
                "dropping overlong line"
            );
            metrics::counter!(m::TAILER_LINES_DROPPED_TOTAL).increment(1);
            self.partial.clear();
            self.discarding = true;
        } else if self.discarding {
            self.partial.clear();
        }

        true
    }

    fn reset(&mut self) {
        self.offset = 0;
        self.partial.clear();
        self.discarding = false;
    }

    fn tail_error(&self, e: std::io::Error) -> MonitorError {
        MonitorError::Tail {
            path: self.config.path.display().to_string(),
            reason: e.to_string(),
        }
    }

    /// 현재 상태를 반환합니다.
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }

    /// 지금까지 본 라인 수
    pub fn lines_seen(&self) -> u64 {
        self.line_no
    }
}

#[cfg(unix)]
fn file_id(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn file_id(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}
