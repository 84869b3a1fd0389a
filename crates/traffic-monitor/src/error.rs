//! 트래픽 모니터 에러 타입
//!
//! [`MonitorError`]는 파일 추적, 설정, 채널 통신 등 모니터 크레이트 내부에서
//! 발생하는 에러를 표현합니다. `From<MonitorError> for TrafficwatchError` 변환이
//! 구현되어 있어 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.
//!
//! 라인 단위 파싱 실패는 core의 [`ParseError`]로 표현되며,
//! 파이프라인이 중단 정책일 때만 [`MonitorError::Parse`]로 감싸집니다.

use trafficwatch_core::error::{ParseError, PipelineError, TrafficwatchError};

/// 트래픽 모니터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// 라인 파싱 실패 (abort 정책에서 파이프라인을 중단시킨 경우)
    #[error("line {line_no}: {source}")]
    Parse {
        /// 파일 내 라인 번호 (1부터)
        line_no: u64,
        /// 원인
        #[source]
        source: ParseError,
    },

    /// 파일 추적 에러
    #[error("tail error: {path}: {reason}")]
    Tail {
        /// 추적 중인 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러 (수집 채널이 예기치 않게 닫힘)
    #[error("channel error: {0}")]
    Channel(String),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<MonitorError> for TrafficwatchError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::Parse { source, .. } => TrafficwatchError::Parse(source),
            MonitorError::Channel(reason) => {
                TrafficwatchError::Pipeline(PipelineError::Channel(reason))
            }
            other => TrafficwatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
