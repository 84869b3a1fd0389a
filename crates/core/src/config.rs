//! 설정 관리 -- trafficwatch.toml 파싱 및 런타임 설정
//!
//! [`TrafficwatchConfig`]는 모든 섹션의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, daemon에서 적용)
//! 2. 환경변수 (`TRAFFICWATCH_MONITOR_RATE_THRESHOLD=20` 형식)
//! 3. 설정 파일 (`trafficwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), trafficwatch_core::error::TrafficwatchError> {
//! use trafficwatch_core::config::TrafficwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TrafficwatchConfig::load("trafficwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TrafficwatchConfig::parse("[monitor]\ntop_n = 10")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TrafficwatchError};

/// 허용되는 최대 윈도우 길이 (1일)
const MAX_WINDOW_SECS: u64 = 86_400;
/// 허용되는 최대 리포트 주기 (1시간)
const MAX_REPORT_INTERVAL_SECS: u64 = 3600;

/// trafficwatch 통합 설정
///
/// `trafficwatch.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 트래픽 모니터 설정
    #[serde(default)]
    pub monitor: MonitorSection,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl TrafficwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TrafficwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TrafficwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TrafficwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TrafficwatchError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TrafficwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            TrafficwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TRAFFICWATCH_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TRAFFICWATCH_GENERAL_LOG_LEVEL");
        override_string(
            &mut self.general.log_format,
            "TRAFFICWATCH_GENERAL_LOG_FORMAT",
        );

        // Monitor
        override_string(&mut self.monitor.filename, "TRAFFICWATCH_MONITOR_FILENAME");
        override_u64(
            &mut self.monitor.window_secs,
            "TRAFFICWATCH_MONITOR_WINDOW_SECS",
        );
        override_f64(
            &mut self.monitor.rate_threshold,
            "TRAFFICWATCH_MONITOR_RATE_THRESHOLD",
        );
        override_usize(&mut self.monitor.top_n, "TRAFFICWATCH_MONITOR_TOP_N");
        override_u64(
            &mut self.monitor.report_interval_secs,
            "TRAFFICWATCH_MONITOR_REPORT_INTERVAL_SECS",
        );
        override_u64(
            &mut self.monitor.poll_interval_ms,
            "TRAFFICWATCH_MONITOR_POLL_INTERVAL_MS",
        );
        override_bool(
            &mut self.monitor.read_from_start,
            "TRAFFICWATCH_MONITOR_READ_FROM_START",
        );
        override_usize(
            &mut self.monitor.max_line_length,
            "TRAFFICWATCH_MONITOR_MAX_LINE_LENGTH",
        );
        override_string(
            &mut self.monitor.on_parse_error,
            "TRAFFICWATCH_MONITOR_ON_PARSE_ERROR",
        );
        override_string(
            &mut self.monitor.output_format,
            "TRAFFICWATCH_MONITOR_OUTPUT_FORMAT",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "TRAFFICWATCH_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "TRAFFICWATCH_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "TRAFFICWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TrafficwatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.monitor.validate()?;

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be non-zero when enabled"));
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 트래픽 모니터 설정 (`[monitor]` 섹션)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// 추적할 액세스 로그 파일 경로
    pub filename: String,
    /// 슬라이딩 윈도우 길이 (초)
    pub window_secs: u64,
    /// 고트래픽 알림 임계값 (초당 요청 수)
    pub rate_threshold: f64,
    /// 리포트에 표시할 상위 섹션 수
    pub top_n: usize,
    /// 리포트 출력 주기 (초)
    pub report_interval_secs: u64,
    /// 파일 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 시작 시 파일 처음부터 읽을지 여부
    pub read_from_start: bool,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 파싱 실패 정책 (skip, abort)
    pub on_parse_error: String,
    /// 리포트 출력 형식 (text, json)
    pub output_format: String,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            filename: "/tmp/access.log".to_owned(),
            window_secs: 120,
            rate_threshold: 10.0,
            top_n: 5,
            report_interval_secs: 10,
            poll_interval_ms: 250,
            read_from_start: true,
            max_line_length: 64 * 1024, // 64KB
            on_parse_error: "skip".to_owned(),
            output_format: "text".to_owned(),
        }
    }
}

impl MonitorSection {
    /// `[monitor]` 섹션을 검증합니다.
    pub fn validate(&self) -> Result<(), TrafficwatchError> {
        if self.filename.is_empty() {
            return Err(invalid("monitor.filename", "must not be empty"));
        }

        if self.window_secs == 0 || self.window_secs > MAX_WINDOW_SECS {
            return Err(invalid(
                "monitor.window_secs",
                format!("must be 1-{MAX_WINDOW_SECS}"),
            ));
        }

        if !self.rate_threshold.is_finite() || self.rate_threshold < 0.0 {
            return Err(invalid(
                "monitor.rate_threshold",
                "must be a finite, non-negative number",
            ));
        }

        if self.top_n == 0 {
            return Err(invalid("monitor.top_n", "must be greater than 0"));
        }

        if self.report_interval_secs == 0 || self.report_interval_secs > MAX_REPORT_INTERVAL_SECS
        {
            return Err(invalid(
                "monitor.report_interval_secs",
                format!("must be 1-{MAX_REPORT_INTERVAL_SECS}"),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(invalid("monitor.poll_interval_ms", "must be greater than 0"));
        }

        if self.max_line_length == 0 {
            return Err(invalid("monitor.max_line_length", "must be greater than 0"));
        }

        let valid_policies = ["skip", "abort"];
        if !valid_policies.contains(&self.on_parse_error.as_str()) {
            return Err(invalid(
                "monitor.on_parse_error",
                format!("must be one of: {}", valid_policies.join(", ")),
            ));
        }

        let valid_outputs = ["text", "json"];
        if !valid_outputs.contains(&self.output_format.as_str()) {
            return Err(invalid(
                "monitor.output_format",
                format!("must be one of: {}", valid_outputs.join(", ")),
            ));
        }

        Ok(())
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9187,
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> TrafficwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_f64(target: &mut f64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<f64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse f64 from env var, ignoring"
            ),
        }
    }
}
