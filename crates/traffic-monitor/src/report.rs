//! 리포트 -- 주기 리포트와 알림 전환 메시지를 텍스트/JSON으로 출력합니다.
//!
//! 모든 출력은 [`ReportWriter`]를 거칩니다. 페이로드는 `Serialize`(JSON)와
//! [`Render`](텍스트)를 함께 구현합니다.
//!
//! # 텍스트 형식
//! ```text
//! Response codes:
//!        0 (HTTP/1XX)      12 (HTTP/2XX)       0 (HTTP/3XX)       3 (HTTP/4XX)       1 (HTTP/5XX)
//! Top 5 sections:
//!       10  /api
//!        6  /report
//! High-traffic alert: not firing
//! ---
//! ```

use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

use trafficwatch_core::types::StatusClass;

use crate::config::OutputFormat;
use crate::monitor::{AlertState, SectionCount, TrafficMonitor};

/// 텍스트 렌더링
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> io::Result<()>;
}

/// 주기 리포트 한 건
///
/// 집계기 잠금을 잡은 상태에서 한 번에 읽어 만든 일관된 스냅샷입니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficReport {
    /// 생성 시각 (벽시계)
    pub generated_at: DateTime<Utc>,
    /// 상태 코드 클래스별 누적 카운트 (`1XX`..`5XX` 순서)
    pub response_codes: BTreeMap<StatusClass, u64>,
    /// 요청한 상위 섹션 수
    pub top_n: usize,
    /// 상위 섹션
    pub top_sections: Vec<SectionCount>,
    /// 알림 중 여부
    pub alerting: bool,
    /// 윈도우 평균 요청률 (계산 불가 시 `None`)
    pub rate: Option<f64>,
    /// 윈도우 내 요청 수
    pub window_len: usize,
    /// 누적 집계 레코드 수
    pub total_ingested: u64,
    /// 지금까지 본 서로 다른 섹션 수
    pub distinct_sections: usize,
    /// 시각 역행으로 보정된 레코드 수
    pub clamped: u64,
}

impl TrafficReport {
    /// 집계기 상태로부터 리포트를 만듭니다.
    pub fn capture(monitor: &TrafficMonitor, top_n: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            response_codes: monitor.response_code_counts(),
            top_n,
            top_sections: monitor.top_sections(top_n),
            alerting: monitor.is_alerting(),
            rate: monitor.current_rate().ok(),
            window_len: monitor.window_len(),
            total_ingested: monitor.total_ingested(),
            distinct_sections: monitor.section_count(),
            clamped: monitor.clamped_count(),
        }
    }
}

impl Render for TrafficReport {
    fn render_text(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "Response codes:")?;
        for class in StatusClass::ALL {
            let count = self.response_codes.get(&class).copied().unwrap_or(0);
            write!(w, "{count:>8} (HTTP/{class})")?;
        }
        writeln!(w)?;

        writeln!(w, "Top {} sections:", self.top_n)?;
        for entry in &self.top_sections {
            writeln!(w, "{:>8}  {}", entry.count, entry.section)?;
        }

        match (self.alerting, self.rate) {
            (true, Some(rate)) => writeln!(
                w,
                "High-traffic alert: firing at {rate:.6} queries per second on average"
            )?,
            (true, None) => writeln!(w, "High-traffic alert: firing")?,
            (false, _) => writeln!(w, "High-traffic alert: not firing")?,
        }
        writeln!(w, "---")
    }
}

/// 알림 상태 전환
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum AlertTransition {
    /// NotAlerting -> Alerting
    Fired {
        /// 전환 시점의 요청률
        rate: Option<f64>,
    },
    /// Alerting -> NotAlerting
    Resolved,
}

impl AlertTransition {
    /// 두 상태 사이의 전환을 판별합니다. 상태가 같으면 `None`입니다.
    pub fn between(previous: AlertState, current: AlertState, rate: Option<f64>) -> Option<Self> {
        match (previous, current) {
            (AlertState::NotAlerting, AlertState::Alerting) => Some(Self::Fired { rate }),
            (AlertState::Alerting, AlertState::NotAlerting) => Some(Self::Resolved),
            _ => None,
        }
    }

    /// 메트릭 레이블
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fired { .. } => "fired",
            Self::Resolved => "resolved",
        }
    }

    /// 사람이 읽는 메시지
    pub fn message(&self) -> String {
        match self {
            Self::Fired { rate: Some(rate) } => format!(
                "High-traffic alerting is firing at {rate:.6} queries per second on average"
            ),
            Self::Fired { rate: None } => "High-traffic alerting is firing".to_owned(),
            Self::Resolved => "High-traffic alerting not firing anymore".to_owned(),
        }
    }
}

impl Render for AlertTransition {
    fn render_text(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}", self.message())
    }
}

/// 리포트 출력기
///
/// JSON 형식에서는 페이로드 하나당 한 줄을 씁니다.
pub struct ReportWriter {
    format: OutputFormat,
    out: Box<dyn Write + Send>,
}

impl ReportWriter {
    /// 임의의 출력 대상으로 출력기를 생성합니다.
    pub fn new(format: OutputFormat, out: Box<dyn Write + Send>) -> Self {
        Self { format, out }
    }

    /// 표준 출력으로 쓰는 출력기를 생성합니다.
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(format, Box::new(io::stdout()))
    }

    /// 페이로드 하나를 쓰고 flush합니다.
    pub fn write<T: Render + Serialize>(&mut self, payload: &T) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => payload.render_text(&mut self.out)?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, payload)?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }
}

impl std::fmt::Debug for ReportWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportWriter")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}
