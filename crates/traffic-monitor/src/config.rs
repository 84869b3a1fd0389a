//! 모니터 설정
//!
//! [`MonitorConfig`]는 core의 [`MonitorSection`](trafficwatch_core::config::MonitorSection)을
//! 기반으로 문자열 필드를 열거형으로 해석한 모니터 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use trafficwatch_core::config::TrafficwatchConfig;
//! use trafficwatch_monitor::config::MonitorConfig;
//!
//! let core_config = TrafficwatchConfig::default();
//! let config = MonitorConfig::from_core(&core_config.monitor)?;
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use trafficwatch_core::config::MonitorSection;

use crate::collector::TailerConfig;
use crate::error::MonitorError;
use crate::monitor::MonitorSettings;

/// 파싱 실패 라인 처리 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseErrorPolicy {
    /// 경고 후 건너뜀 (기본값)
    #[default]
    Skip,
    /// 파이프라인 중단
    Abort,
}

impl FromStr for ParseErrorPolicy {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            other => Err(MonitorError::Config {
                field: "on_parse_error".to_owned(),
                reason: format!("unknown policy '{other}', expected skip or abort"),
            }),
        }
    }
}

/// 리포트 출력 형식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 사람이 읽는 텍스트 (기본값)
    #[default]
    Text,
    /// 한 줄에 JSON 객체 하나
    Json,
}

impl FromStr for OutputFormat {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(MonitorError::Config {
                field: "output_format".to_owned(),
                reason: format!("unknown format '{other}', expected text or json"),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// 모니터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 추적할 액세스 로그 경로
    pub filename: PathBuf,
    /// 슬라이딩 윈도우 길이 (초)
    pub window_secs: u64,
    /// 알림 임계값 (초당 요청 수)
    pub rate_threshold: f64,
    /// 리포트에 표시할 상위 섹션 수
    pub top_n: usize,
    /// 리포트 주기 (초)
    pub report_interval_secs: u64,
    /// 파일 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 시작 시 기존 내용을 읽을지 여부
    pub read_from_start: bool,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 파싱 실패 처리 정책
    pub on_parse_error: ParseErrorPolicy,
    /// 리포트 출력 형식
    pub output_format: OutputFormat,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 수집 채널 용량
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            filename: PathBuf::from("/tmp/access.log"),
            window_secs: 120,
            rate_threshold: 10.0,
            top_n: 5,
            report_interval_secs: 10,
            poll_interval_ms: 250,
            read_from_start: true,
            max_line_length: 64 * 1024,
            on_parse_error: ParseErrorPolicy::Skip,
            output_format: OutputFormat::Text,
            channel_capacity: 4096,
        }
    }
}

impl MonitorConfig {
    /// core의 `MonitorSection`에서 모니터 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &MonitorSection) -> Result<Self, MonitorError> {
        Ok(Self {
            filename: PathBuf::from(&core.filename),
            window_secs: core.window_secs,
            rate_threshold: core.rate_threshold,
            top_n: core.top_n,
            report_interval_secs: core.report_interval_secs,
            poll_interval_ms: core.poll_interval_ms,
            read_from_start: core.read_from_start,
            max_line_length: core.max_line_length,
            on_parse_error: core.on_parse_error.parse()?,
            output_format: core.output_format.parse()?,
            ..Self::default()
        })
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), MonitorError> {
        const MAX_WINDOW_SECS: u64 = 86_400; // 1 day
        const MAX_REPORT_INTERVAL_SECS: u64 = 3600;
        const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

        if self.filename.as_os_str().is_empty() {
            return Err(config_error("filename", "must not be empty"));
        }

        if self.window_secs == 0 || self.window_secs > MAX_WINDOW_SECS {
            return Err(config_error(
                "window_secs",
                format!("must be 1-{MAX_WINDOW_SECS}"),
            ));
        }

        if !self.rate_threshold.is_finite() || self.rate_threshold < 0.0 {
            return Err(config_error(
                "rate_threshold",
                "must be a finite, non-negative number",
            ));
        }

        if self.top_n == 0 {
            return Err(config_error("top_n", "must be greater than 0"));
        }

        if self.report_interval_secs == 0 || self.report_interval_secs > MAX_REPORT_INTERVAL_SECS {
            return Err(config_error(
                "report_interval_secs",
                format!("must be 1-{MAX_REPORT_INTERVAL_SECS}"),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(config_error("poll_interval_ms", "must be greater than 0"));
        }

        if self.max_line_length == 0 {
            return Err(config_error("max_line_length", "must be greater than 0"));
        }

        if self.channel_capacity == 0 || self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(config_error(
                "channel_capacity",
                format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
            ));
        }

        Ok(())
    }

    /// 집계기 설정
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            window_secs: self.window_secs,
            rate_threshold: self.rate_threshold,
        }
    }

    /// 파일 추적기 설정
    pub fn tailer_config(&self) -> TailerConfig {
        TailerConfig {
            path: self.filename.clone(),
            poll_interval_ms: self.poll_interval_ms,
            read_from_start: self.read_from_start,
            max_line_length: self.max_line_length,
        }
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> MonitorError {
    MonitorError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 모니터 설정 빌더
///
/// 3개 이상의 설정 필드가 있으므로 빌더 패턴을 사용합니다.
#[derive(Default)]
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 추적할 파일 경로를 설정합니다.
    pub fn filename(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.filename = path.into();
        self
    }

    /// 윈도우 길이(초)를 설정합니다.
    pub fn window_secs(mut self, secs: u64) -> Self {
        self.config.window_secs = secs;
        self
    }

    /// 알림 임계값을 설정합니다.
    pub fn rate_threshold(mut self, threshold: f64) -> Self {
        self.config.rate_threshold = threshold;
        self
    }

    /// 상위 섹션 수를 설정합니다.
    pub fn top_n(mut self, n: usize) -> Self {
        self.config.top_n = n;
        self
    }

    /// 리포트 주기(초)를 설정합니다.
    pub fn report_interval_secs(mut self, secs: u64) -> Self {
        self.config.report_interval_secs = secs;
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 기존 내용 읽기 여부를 설정합니다.
    pub fn read_from_start(mut self, enabled: bool) -> Self {
        self.config.read_from_start = enabled;
        self
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.config.max_line_length = len;
        self
    }

    /// 파싱 실패 정책을 설정합니다.
    pub fn on_parse_error(mut self, policy: ParseErrorPolicy) -> Self {
        self.config.on_parse_error = policy;
        self
    }

    /// 출력 형식을 설정합니다.
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// 수집 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `MonitorConfig`를 생성합니다.
    pub fn build(self) -> Result<MonitorConfig, MonitorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MonitorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.window_secs, 120);
        assert_eq!(config.rate_threshold, 10.0);
    }

    #[test]
    fn from_core_preserves_values() {
        let core = MonitorSection {
            filename: "/var/log/nginx/access.log".to_owned(),
            window_secs: 60,
            rate_threshold: 2.5,
            top_n: 3,
            on_parse_error: "abort".to_owned(),
            output_format: "JSON".to_owned(),
            ..Default::default()
        };
        let config = MonitorConfig::from_core(&core).unwrap();
        assert_eq!(config.filename, PathBuf::from("/var/log/nginx/access.log"));
        assert_eq!(config.window_secs, 60);
        assert_eq!(config.top_n, 3);
        assert_eq!(config.on_parse_error, ParseErrorPolicy::Abort);
        assert_eq!(config.output_format, OutputFormat::Json);
        // 확장 필드는 기본값
        assert_eq!(config.channel_capacity, 4096);
    }

    #[test]
    fn from_core_rejects_unknown_policy() {
        let core = MonitorSection {
            on_parse_error: "ignore".to_owned(),
            ..Default::default()
        };
        let err = MonitorConfig::from_core(&core).unwrap_err();
        assert!(err.to_string().contains("on_parse_error"));
    }

    #[test]
    fn validate_rejects_zero_window() {
        let config = MonitorConfig {
            window_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_nan_threshold() {
        let config = MonitorConfig {
            rate_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_top_n() {
        let config = MonitorConfig {
            top_n: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = MonitorConfigBuilder::new()
            .filename("/tmp/custom.log")
            .rate_threshold(1.0)
            .top_n(10)
            .output_format(OutputFormat::Json)
            .build()
            .unwrap();
        assert_eq!(config.filename, PathBuf::from("/tmp/custom.log"));
        assert_eq!(config.top_n, 10);
        assert_eq!(config.output_format, OutputFormat::Json);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = MonitorConfigBuilder::new().report_interval_secs(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn derived_component_configs() {
        let config = MonitorConfigBuilder::new()
            .window_secs(30)
            .poll_interval_ms(50)
            .read_from_start(false)
            .build()
            .unwrap();
        assert_eq!(config.monitor_settings().window_secs, 30);
        let tailer = config.tailer_config();
        assert_eq!(tailer.poll_interval_ms, 50);
        assert!(!tailer.read_from_start);
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("SKIP".parse::<ParseErrorPolicy>().unwrap(), ParseErrorPolicy::Skip);
        assert_eq!("Json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
