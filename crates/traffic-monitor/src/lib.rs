#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: 액세스 로그 파일 추적 (tail -F 방식)
//! - [`parser`]: Common Log Format 라인 파서
//! - [`window`]: 요청 시각 슬라이딩 윈도우와 요청률 계산
//! - [`monitor`]: 응답 코드/섹션 집계와 고트래픽 알림 상태 머신
//! - [`report`]: 주기 리포트와 알림 전환 메시지 출력 (텍스트/JSON)
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 모니터 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! FileTailer -> AccessLogParser -> TrafficMonitor -> ReportWriter
//!     |               |                  |               |
//!  poll/rotate    regex+chrono     window + alert    text/JSON
//! ```

pub mod config;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod report;
pub mod window;

pub mod collector;
pub mod parser;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{MonitorPipeline, MonitorPipelineBuilder, process_line};

// 설정
pub use config::{MonitorConfig, MonitorConfigBuilder, OutputFormat, ParseErrorPolicy};

// 에러
pub use error::MonitorError;

// 파서
pub use parser::{AccessLogParser, parse_line};

// 집계
pub use monitor::{AlertState, MonitorSettings, SectionCount, TrafficMonitor};
pub use window::{RateUnavailable, RateWindow};

// 리포트
pub use report::{AlertTransition, Render, ReportWriter, TrafficReport};

// 수집기
pub use collector::{FileTailer, RawLine, TailerConfig};
