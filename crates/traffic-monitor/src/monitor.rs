//! 트래픽 집계 -- 응답 코드/섹션 카운트와 고트래픽 알림 상태를 관리합니다.
//!
//! [`TrafficMonitor`]는 파싱된 [`LogRecord`]를 하나씩 받아
//! 다음 세 가지를 갱신합니다:
//!
//! 1. 상태 코드 클래스별 누적 카운트 (5개 키가 항상 존재)
//! 2. 섹션별 누적 카운트
//! 3. 요청 시각 슬라이딩 윈도우와 알림 상태
//!
//! # 알림 상태 머신
//! ```text
//! NotAlerting --(rate > threshold)--> Alerting
//! Alerting --(rate <= threshold)--> NotAlerting
//! ```
//! 요청률을 계산할 수 없는 경우(빈 윈도우, 0초 구간)에는 상태를 바꾸지 않습니다.
//! 히스테리시스는 없습니다.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use trafficwatch_core::types::{LogRecord, StatusClass};

use crate::report::TrafficReport;
use crate::window::{RateUnavailable, RateWindow};

/// 기본 윈도우 길이 (초)
pub const DEFAULT_WINDOW_SECS: u64 = 120;
/// 기본 알림 임계값 (초당 요청 수)
pub const DEFAULT_RATE_THRESHOLD: f64 = 10.0;

/// 집계기 설정
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    /// 슬라이딩 윈도우 길이 (초)
    pub window_secs: u64,
    /// 이 값을 **초과**하면 알림 발생
    pub rate_threshold: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            rate_threshold: DEFAULT_RATE_THRESHOLD,
        }
    }
}

/// 고트래픽 알림 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    /// 정상 (초기 상태)
    #[default]
    NotAlerting,
    /// 고트래픽 알림 중
    Alerting,
}

impl AlertState {
    /// 알림 중인지 확인합니다.
    pub fn is_alerting(self) -> bool {
        self == Self::Alerting
    }
}

/// 섹션과 누적 요청 수
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionCount {
    /// 섹션 (`/api` 등)
    pub section: String,
    /// 누적 요청 수
    pub count: u64,
}

/// 트래픽 집계기
///
/// 한 프로세스에 하나 생성되어 수명 동안 유지됩니다.
/// 수집 태스크와 리포터 태스크가 `tokio::sync::Mutex`로 공유합니다.
#[derive(Debug, Clone)]
pub struct TrafficMonitor {
    settings: MonitorSettings,
    response_codes: BTreeMap<StatusClass, u64>,
    sections: HashMap<String, u64>,
    window: RateWindow,
    alert: AlertState,
    total_ingested: u64,
}

impl TrafficMonitor {
    /// 주어진 설정으로 비어있는 집계기를 생성합니다.
    pub fn new(settings: MonitorSettings) -> Self {
        let response_codes = StatusClass::ALL.iter().map(|class| (*class, 0)).collect();
        Self {
            settings,
            response_codes,
            sections: HashMap::new(),
            window: RateWindow::new(settings.window_secs),
            alert: AlertState::NotAlerting,
            total_ingested: 0,
        }
    }

    /// 레코드 하나를 집계합니다.
    ///
    /// 실패하지 않습니다. 범위를 벗어난 상태 코드를 가진 레코드는
    /// 응답 코드 카운트에서만 제외됩니다.
    pub fn ingest(&mut self, record: &LogRecord) {
        match record.status_class() {
            Some(class) => *self.response_codes.entry(class).or_insert(0) += 1,
            None => tracing::debug!(
                status_code = record.status_code,
                "status code outside 100-599, not counted"
            ),
        }

        match self.sections.get_mut(&record.section) {
            Some(count) => *count += 1,
            None => {
                self.sections.insert(record.section.clone(), 1);
            }
        }

        self.window.push(record.timestamp);
        self.total_ingested += 1;

        match self.window.rate() {
            Ok(rate) => {
                self.alert = if rate > self.settings.rate_threshold {
                    AlertState::Alerting
                } else {
                    AlertState::NotAlerting
                };
            }
            Err(reason) => {
                tracing::trace!(%reason, "rate unavailable, alert state unchanged");
            }
        }
    }

    /// 상태 코드 클래스별 누적 카운트 (5개 키 항상 포함)
    pub fn response_code_counts(&self) -> BTreeMap<StatusClass, u64> {
        self.response_codes.clone()
    }

    /// 요청 수 상위 `n`개 섹션
    ///
    /// 요청 수 내림차순, 같으면 섹션 이름 오름차순으로 정렬합니다.
    pub fn top_sections(&self, n: usize) -> Vec<SectionCount> {
        let mut ranked: Vec<(&String, &u64)> = self.sections.iter().collect();
        ranked.sort_unstable_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(n)
            .map(|(section, count)| SectionCount {
                section: section.clone(),
                count: *count,
            })
            .collect()
    }

    /// 현재 윈도우의 평균 요청률
    pub fn current_rate(&self) -> Result<f64, RateUnavailable> {
        self.window.rate()
    }

    /// 알림 중인지 확인합니다.
    pub fn is_alerting(&self) -> bool {
        self.alert.is_alerting()
    }

    /// 현재 알림 상태
    pub fn alert_state(&self) -> AlertState {
        self.alert
    }

    /// 윈도우에 있는 요청 수
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// 지금까지 집계한 레코드 수
    pub fn total_ingested(&self) -> u64 {
        self.total_ingested
    }

    /// 지금까지 본 서로 다른 섹션 수
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// 시각이 역행해 최신 시각으로 보정된 레코드 수
    pub fn clamped_count(&self) -> u64 {
        self.window.clamped_count()
    }

    /// 리포트 한 건에 필요한 상태를 한 번에 읽습니다.
    pub fn snapshot(&self, top_n: usize) -> TrafficReport {
        TrafficReport::capture(self, top_n)
    }
}

impl Default for TrafficMonitor {
    fn default() -> Self {
        Self::new(MonitorSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use trafficwatch_core::types::HttpMethod;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 5, 9, 16, 0, 0).unwrap()
    }

    fn record(section: &str, status: u16, at: DateTime<Utc>) -> LogRecord {
        LogRecord {
            ip: "127.0.0.1".to_owned(),
            identity: "-".to_owned(),
            user: "james".to_owned(),
            timestamp: at,
            method: HttpMethod::Get,
            section: section.to_owned(),
            resource: "/user".to_owned(),
            protocol: "HTTP/1.0".to_owned(),
            status_code: status,
            size: 123,
        }
    }

    fn monitor(threshold: f64) -> TrafficMonitor {
        TrafficMonitor::new(MonitorSettings {
            window_secs: 120,
            rate_threshold: threshold,
        })
    }

    #[test]
    fn new_monitor_has_all_classes_at_zero() {
        let monitor = TrafficMonitor::default();
        let counts = monitor.response_code_counts();
        assert_eq!(counts.len(), 5);
        assert!(counts.values().all(|&c| c == 0));
        assert!(!monitor.is_alerting());
        assert_eq!(monitor.current_rate(), Err(RateUnavailable::EmptyWindow));
        assert!(monitor.top_sections(5).is_empty());
    }

    #[test]
    fn ingest_counts_status_class_and_section() {
        let mut monitor = TrafficMonitor::default();
        monitor.ingest(&record("/api", 200, t0()));
        monitor.ingest(&record("/api", 503, t0()));
        monitor.ingest(&record("/report", 404, t0()));

        let counts = monitor.response_code_counts();
        assert_eq!(counts[&StatusClass::Success], 1);
        assert_eq!(counts[&StatusClass::ServerError], 1);
        assert_eq!(counts[&StatusClass::ClientError], 1);
        assert_eq!(counts[&StatusClass::Informational], 0);
        assert_eq!(monitor.total_ingested(), 3);
        assert_eq!(monitor.section_count(), 2);
        assert_eq!(monitor.window_len(), 3);
    }

    #[test]
    fn out_of_range_status_skips_histogram_only() {
        let mut monitor = TrafficMonitor::default();
        monitor.ingest(&record("/api", 999, t0()));
        assert!(monitor.response_code_counts().values().all(|&c| c == 0));
        assert_eq!(monitor.section_count(), 1);
        assert_eq!(monitor.total_ingested(), 1);
    }

    #[test]
    fn top_sections_orders_by_count_then_name() {
        let mut monitor = TrafficMonitor::default();
        for section in ["/b", "/a", "/c", "/c", "/b", "/c"] {
            monitor.ingest(&record(section, 200, t0()));
        }
        let top = monitor.top_sections(5);
        let names: Vec<&str> = top.iter().map(|s| s.section.as_str()).collect();
        assert_eq!(names, ["/c", "/b", "/a"]);
        assert_eq!(top[0].count, 3);

        // 동률은 이름순
        let mut tied = TrafficMonitor::default();
        for section in ["/zeta", "/alpha", "/mid"] {
            tied.ingest(&record(section, 200, t0()));
        }
        let names: Vec<String> = tied.top_sections(2).into_iter().map(|s| s.section).collect();
        assert_eq!(names, ["/alpha", "/mid"]);
    }

    #[test]
    fn top_sections_zero_is_empty() {
        let mut monitor = TrafficMonitor::default();
        monitor.ingest(&record("/api", 200, t0()));
        assert!(monitor.top_sections(0).is_empty());
    }

    #[test]
    fn single_record_does_not_alert() {
        let mut monitor = monitor(0.0);
        monitor.ingest(&record("/api", 200, t0()));
        assert_eq!(monitor.current_rate(), Err(RateUnavailable::ZeroSpan));
        assert!(!monitor.is_alerting());
    }

    #[test]
    fn burst_fires_alert() {
        let mut monitor = monitor(10.0);
        for i in 0..21 {
            monitor.ingest(&record("/api", 200, t0() + Duration::milliseconds(i * 50)));
        }
        assert!(monitor.is_alerting());
        assert_eq!(monitor.alert_state(), AlertState::Alerting);
    }

    #[test]
    fn alert_resolves_after_quiet_period() {
        let mut monitor = monitor(10.0);
        for i in 0..21 {
            monitor.ingest(&record("/api", 200, t0() + Duration::milliseconds(i * 50)));
        }
        assert!(monitor.is_alerting());

        // 한 시간 뒤 요청 2개: 윈도우가 비워지고 낮은 요청률
        let later = t0() + Duration::hours(1);
        monitor.ingest(&record("/api", 200, later));
        assert!(monitor.is_alerting(), "zero-span window keeps the previous state");
        monitor.ingest(&record("/api", 200, later + Duration::seconds(1)));
        assert!(!monitor.is_alerting());
    }

    #[test]
    fn rate_equal_to_threshold_does_not_alert() {
        // 3건 / 2초 = 1.5
        let mut monitor = monitor(1.5);
        for i in 0..3 {
            monitor.ingest(&record("/api", 200, t0() + Duration::seconds(i)));
        }
        assert_eq!(monitor.current_rate(), Ok(1.5));
        assert!(!monitor.is_alerting());
    }

    #[test]
    fn slow_traffic_never_alerts() {
        let mut monitor = monitor(10.0);
        for i in 0..5 {
            monitor.ingest(&record("/api", 200, t0() + Duration::seconds(i * 60)));
            assert!(!monitor.is_alerting());
        }
        // 마지막 요청 기준 120초 이내: 120, 180, 240
        assert_eq!(monitor.window_len(), 3);
    }

    #[test]
    fn identical_timestamps_keep_state() {
        let mut monitor = monitor(0.5);
        monitor.ingest(&record("/api", 200, t0()));
        monitor.ingest(&record("/api", 200, t0() + Duration::seconds(1)));
        assert!(monitor.is_alerting());

        let mut flat = self::monitor(0.5);
        for _ in 0..100 {
            flat.ingest(&record("/api", 200, t0()));
        }
        assert!(!flat.is_alerting());
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut monitor = TrafficMonitor::default();
        monitor.ingest(&record("/api", 200, t0()));
        monitor.ingest(&record("/api", 200, t0() + Duration::seconds(1)));
        let report = monitor.snapshot(5);
        assert_eq!(report.total_ingested, 2);
        assert_eq!(report.top_sections.len(), 1);
        assert_eq!(report.rate, Some(2.0));
        assert!(!report.alerting);
        assert_eq!(report.distinct_sections, 1);
        assert_eq!(report.clamped, 0);

        monitor.ingest(&record("/report", 200, t0()));
        let report = monitor.snapshot(5);
        assert_eq!(report.distinct_sections, 2);
        assert_eq!(report.clamped, 1);
    }
}
