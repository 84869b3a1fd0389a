//! 에러 타입 -- 도메인별 에러 정의

/// trafficwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TrafficwatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 액세스 로그 라인 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 액세스 로그 한 줄의 파싱 실패
///
/// 모든 변형은 해당 라인에 대해서만 치명적입니다.
/// 건너뛸지 중단할지는 호출자가 결정합니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// 라인이 문법과 일치하지 않음
    #[error("malformed log line: {reason}")]
    Malformed { reason: String },

    /// 타임스탬프 해석 실패 (존재하지 않는 날짜 등)
    #[error("bad timestamp '{value}': {reason}")]
    BadTimestamp { value: String, reason: String },

    /// 상태 코드가 100-599 범위의 정수가 아님
    #[error("bad status code '{value}'")]
    BadStatusCode { value: String },
}

impl ParseError {
    /// 메트릭 레이블용 에러 종류
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "malformed",
            Self::BadTimestamp { .. } => "bad_timestamp",
            Self::BadStatusCode { .. } => "bad_status_code",
        }
    }
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 채널 통신 실패
    #[error("channel error: {0}")]
    Channel(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}
