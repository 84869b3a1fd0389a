//! 라인 수집 모듈 -- 액세스 로그 파일에서 원시 라인을 수집합니다.
//!
//! # 아키텍처
//! [`FileTailer`]는 자체 tokio 태스크에서 실행되며, 수집한 라인을
//! `tokio::mpsc::Sender<RawLine>` 채널을 통해 수집 태스크로 전달합니다.

pub mod file;

pub use file::{FileTailer, TailerConfig};

/// 수집된 원시 라인
///
/// 개행과 끝의 `\r`이 제거된 상태입니다. UTF-8이 아닌 바이트는 대체 문자로 바뀝니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 라인 내용
    pub line: String,
    /// 파일 내 라인 번호 (1부터, truncation/로테이션 후에도 계속 증가)
    pub line_no: u64,
}

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 에러로 중단됨
    Error(String),
    /// 정상 종료됨
    Stopped,
}

impl CollectorStatus {
    /// 상태 이름
    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Error(_) => "error",
            Self::Stopped => "stopped",
        }
    }
}
