//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `trafficwatch_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use trafficwatch_core::metrics as m;
//!
//! metrics::counter!(m::MONITOR_RECORDS_INGESTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 응답 코드 분류 레이블 키 (1XX..5XX)
pub const LABEL_STATUS_CLASS: &str = "status_class";

/// 파싱 에러 종류 레이블 키 (malformed, bad_timestamp, bad_status_code)
pub const LABEL_PARSE_ERROR: &str = "kind";

/// 알림 전이 방향 레이블 키 (fired, resolved)
pub const LABEL_TRANSITION: &str = "transition";

// ─── Tailer 메트릭 ─────────────────────────────────────────────────

/// Tailer: 파일에서 읽은 전체 라인 수 (counter)
pub const TAILER_LINES_READ_TOTAL: &str = "trafficwatch_tailer_lines_read_total";

/// Tailer: 길이 초과로 버린 라인 수 (counter)
pub const TAILER_LINES_DROPPED_TOTAL: &str = "trafficwatch_tailer_lines_dropped_total";

/// Tailer: 감지된 truncation/rotation 수 (counter)
pub const TAILER_REOPENS_TOTAL: &str = "trafficwatch_tailer_reopens_total";

// ─── Monitor 메트릭 ────────────────────────────────────────────────

/// Monitor: 집계에 반영된 레코드 수 (counter, label: status_class)
pub const MONITOR_RECORDS_INGESTED_TOTAL: &str = "trafficwatch_monitor_records_ingested_total";

/// Monitor: 파싱 실패 수 (counter, label: kind)
pub const MONITOR_PARSE_ERRORS_TOTAL: &str = "trafficwatch_monitor_parse_errors_total";

/// Monitor: 현재 윈도우의 평균 요청률 (gauge, req/s)
pub const MONITOR_REQUEST_RATE: &str = "trafficwatch_monitor_request_rate";

/// Monitor: 윈도우 내 엔트리 수 (gauge)
pub const MONITOR_WINDOW_SIZE: &str = "trafficwatch_monitor_window_size";

/// Monitor: 고트래픽 알림 상태 (gauge, 0 또는 1)
pub const MONITOR_ALERTING: &str = "trafficwatch_monitor_alerting";

/// Monitor: 알림 상태 전이 수 (counter, label: transition)
pub const MONITOR_ALERT_TRANSITIONS_TOTAL: &str = "trafficwatch_monitor_alert_transitions_total";

/// Monitor: 라인 하나를 파싱하고 집계하는 데 걸린 시간 (histogram, 초)
pub const MONITOR_INGEST_DURATION_SECONDS: &str = "trafficwatch_monitor_ingest_duration_seconds";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "trafficwatch_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 라인 처리 지연 시간 히스토그램 버킷 (초)
///
/// 1us ~ 10ms 범위 (I/O 없는 순수 CPU 작업)
pub const INGEST_DURATION_BUCKETS: [f64; 8] = [
    0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.01,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
/// 일반적으로 `trafficwatch-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        TAILER_LINES_READ_TOTAL,
        "Total number of complete lines read from the followed file"
    );
    describe_counter!(
        TAILER_LINES_DROPPED_TOTAL,
        "Lines dropped because they exceeded the maximum line length"
    );
    describe_counter!(
        TAILER_REOPENS_TOTAL,
        "Times the followed file was truncated or rotated and read again from the start"
    );

    describe_counter!(
        MONITOR_RECORDS_INGESTED_TOTAL,
        "Parsed access log records folded into the traffic statistics"
    );
    describe_counter!(
        MONITOR_PARSE_ERRORS_TOTAL,
        "Access log lines rejected by the parser"
    );
    describe_gauge!(
        MONITOR_REQUEST_RATE,
        "Average request rate over the sliding window (requests/sec)"
    );
    describe_gauge!(
        MONITOR_WINDOW_SIZE,
        "Number of requests currently held in the sliding window"
    );
    describe_gauge!(
        MONITOR_ALERTING,
        "1 while the high-traffic alert is firing, 0 otherwise"
    );
    describe_counter!(
        MONITOR_ALERT_TRANSITIONS_TOTAL,
        "High-traffic alert state changes, labelled fired or resolved"
    );
    describe_histogram!(
        MONITOR_INGEST_DURATION_SECONDS,
        "Time to parse one line and fold it into the statistics"
    );

    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, labelled with version)"
    );
}
