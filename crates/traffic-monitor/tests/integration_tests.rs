//! 통합 테스트 -- 파이프라인 전체 흐름 검증
//!
//! 라인 파싱부터 집계, 알림 전환, 리포트 출력까지의 흐름을 검증합니다.

use std::io::Write;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use tokio::sync::Mutex;

use trafficwatch_core::pipeline::Pipeline;
use trafficwatch_core::types::StatusClass;
use trafficwatch_monitor::{
    AccessLogParser, AlertTransition, MonitorConfigBuilder, MonitorPipelineBuilder, MonitorSettings,
    OutputFormat, ParseErrorPolicy, ReportWriter, TrafficMonitor, process_line,
};

/// 테스트용 공유 출력 버퍼
#[derive(Clone, Default)]
struct SharedBuf(Arc<StdMutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 5, 9, 16, 0, 0).unwrap()
}

fn line_at(at: DateTime<Utc>, path: &str, status: u16) -> String {
    format!(
        r#"127.0.0.1 - james [{}] "GET {path} HTTP/1.0" {status} 123"#,
        at.format("%d/%b/%Y:%H:%M:%S %z")
    )
}

fn new_monitor(threshold: f64) -> Mutex<TrafficMonitor> {
    Mutex::new(TrafficMonitor::new(MonitorSettings {
        window_secs: 120,
        rate_threshold: threshold,
    }))
}

async fn wait_until<F: Fn() -> bool>(cond: F) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

/// 60초 간격 5건은 알림을 발생시키지 않음
#[tokio::test]
async fn slow_traffic_never_alerts() {
    let monitor = new_monitor(10.0);
    let parser = AccessLogParser::new().unwrap();

    for i in 0..5 {
        let line = line_at(t0() + ChronoDuration::seconds(i * 60), "/api/user", 200);
        let transition = process_line(&monitor, &parser, &line).await.unwrap();
        assert!(transition.is_none());
    }

    let guard = monitor.lock().await;
    assert!(!guard.is_alerting());
    assert_eq!(guard.total_ingested(), 5);
}

/// 1초 안의 21건은 알림을 발생시키고, 한 시간 뒤 트래픽이 알림을 해제
#[tokio::test]
async fn burst_fires_then_resolves() {
    let monitor = new_monitor(10.0);
    let parser = AccessLogParser::new().unwrap();
    let mut transitions = Vec::new();

    // 같은 초 10건 (0초 구간, 판단 보류)
    for _ in 0..10 {
        let line = line_at(t0(), "/api", 200);
        if let Some(t) = process_line(&monitor, &parser, &line).await.unwrap() {
            transitions.push(t);
        }
    }
    assert!(transitions.is_empty());

    // 1초 뒤 11건: 21건 / 1초
    for _ in 0..11 {
        let line = line_at(t0() + ChronoDuration::seconds(1), "/api", 200);
        if let Some(t) = process_line(&monitor, &parser, &line).await.unwrap() {
            transitions.push(t);
        }
    }
    assert_eq!(transitions.len(), 1);
    assert!(matches!(transitions[0], AlertTransition::Fired { rate: Some(r) } if r > 10.0));
    assert!(monitor.lock().await.is_alerting());

    // 한 시간 뒤 2건
    let later = t0() + ChronoDuration::hours(1);
    for offset in [0, 1] {
        let line = line_at(later + ChronoDuration::seconds(offset), "/report", 200);
        if let Some(t) = process_line(&monitor, &parser, &line).await.unwrap() {
            transitions.push(t);
        }
    }
    assert_eq!(transitions.last(), Some(&AlertTransition::Resolved));
    assert!(!monitor.lock().await.is_alerting());
}

/// 응답 코드 5개 키는 항상 존재하고 상위 섹션은 min(n, 섹션 수)개
#[tokio::test]
async fn report_shape_invariants() {
    let monitor = new_monitor(10.0);
    let parser = AccessLogParser::new().unwrap();

    let inputs = [
        ("/api/user", 200),
        ("/api/user", 404),
        ("/report", 500),
        ("/", 301),
        ("/api", 200),
    ];
    for (i, (path, status)) in inputs.iter().enumerate() {
        let line = line_at(t0() + ChronoDuration::seconds(i as i64), path, *status);
        process_line(&monitor, &parser, &line).await.unwrap();
    }

    let guard = monitor.lock().await;
    let counts = guard.response_code_counts();
    assert_eq!(counts.len(), 5);
    assert_eq!(counts[&StatusClass::Informational], 0);
    assert_eq!(counts[&StatusClass::Success], 2);
    assert_eq!(counts.values().sum::<u64>(), 5);

    assert_eq!(guard.top_sections(10).len(), 3);
    assert_eq!(guard.top_sections(2).len(), 2);
    assert_eq!(guard.top_sections(1)[0].section, "/api");
    assert_eq!(guard.top_sections(1)[0].count, 3);
}

/// 파일을 추적하는 파이프라인이 전환 메시지와 리포트를 출력
#[tokio::test]
async fn pipeline_tails_file_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");

    let mut content = String::new();
    for i in 0..30 {
        let at = t0() + ChronoDuration::milliseconds(i * 50);
        content.push_str(&line_at(at, "/api/user", 200));
        content.push('\n');
    }
    content.push_str("garbage line\n");
    std::fs::write(&path, content).unwrap();

    let config = MonitorConfigBuilder::new()
        .filename(&path)
        .poll_interval_ms(10)
        .report_interval_secs(1)
        .build()
        .unwrap();
    let out = SharedBuf::default();
    let mut pipeline = MonitorPipelineBuilder::new()
        .config(config)
        .writer(ReportWriter::new(OutputFormat::Text, Box::new(out.clone())))
        .build()
        .unwrap();

    pipeline.start().await.unwrap();
    assert!(pipeline.start().await.is_err(), "double start must fail");

    wait_until(|| out.contents().contains("High-traffic alerting is firing at")).await;
    let health = pipeline.health_check().await;
    assert!(health.is_healthy(), "unexpected health: {health}");
    pipeline.stop().await.unwrap();

    let output = out.contents();
    // 리포트 다음에 전환 메시지가 한 번만 출력됨
    let report_end = output.find("---").unwrap();
    let fired_at = output.find("High-traffic alerting is firing at").unwrap();
    assert!(report_end < fired_at);
    assert_eq!(output.matches("High-traffic alerting is firing at").count(), 1);
    assert!(output.contains("High-traffic alert: firing at"));
    assert!(output.contains("Response codes:"));
    assert!(output.contains("(HTTP/2XX)"));
    assert!(output.contains("/api"));
    assert_eq!(pipeline.processed_count(), 30);
    assert_eq!(pipeline.parse_error_count(), 1);
    assert!(pipeline.health_check().await.is_unhealthy());
}

/// 리포트 주기 안에서 발생했다가 해제된 알림은 출력하지 않음
#[tokio::test]
async fn flapping_within_one_interval_prints_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");

    // 임계값 1.0에서 0,1,3,3,7초: 발생 -> 해제 -> 발생 -> 해제
    let mut content = String::new();
    for offset in [0, 1, 3, 3, 7] {
        content.push_str(&line_at(t0() + ChronoDuration::seconds(offset), "/api", 200));
        content.push('\n');
    }
    std::fs::write(&path, content).unwrap();

    let config = MonitorConfigBuilder::new()
        .filename(&path)
        .poll_interval_ms(10)
        .rate_threshold(1.0)
        .report_interval_secs(3600)
        .build()
        .unwrap();
    let out = SharedBuf::default();
    let mut pipeline = MonitorPipelineBuilder::new()
        .config(config)
        .writer(ReportWriter::new(OutputFormat::Text, Box::new(out.clone())))
        .build()
        .unwrap();

    pipeline.start().await.unwrap();
    let monitor = pipeline.monitor();
    wait_until(|| pipeline.processed_count() == 5).await;
    pipeline.stop().await.unwrap();

    assert!(!monitor.lock().await.is_alerting());
    assert_eq!(out.contents(), "", "no report was due, so nothing is printed");
}

/// 알림 중인 상태가 유지되면 전환 메시지는 첫 리포트에서 한 번만 출력
#[tokio::test]
async fn sustained_alert_is_announced_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");

    let mut content = String::new();
    for i in 0..40 {
        content.push_str(&line_at(t0() + ChronoDuration::milliseconds(i * 25), "/api", 200));
        content.push('\n');
    }
    std::fs::write(&path, content).unwrap();

    let config = MonitorConfigBuilder::new()
        .filename(&path)
        .poll_interval_ms(10)
        .report_interval_secs(1)
        .build()
        .unwrap();
    let out = SharedBuf::default();
    let mut pipeline = MonitorPipelineBuilder::new()
        .config(config)
        .writer(ReportWriter::new(OutputFormat::Text, Box::new(out.clone())))
        .build()
        .unwrap();

    pipeline.start().await.unwrap();
    wait_until(|| out.contents().matches("---").count() >= 2).await;
    pipeline.stop().await.unwrap();

    let output = out.contents();
    assert_eq!(output.matches("High-traffic alerting is firing at").count(), 1);
    assert!(!output.contains("not firing anymore"));
}

/// abort 정책에서는 파싱 실패가 파이프라인을 멈춤
#[tokio::test]
async fn abort_policy_stops_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    std::fs::write(
        &path,
        format!("{}\nnot an access log line\n", line_at(t0(), "/api", 200)),
    )
    .unwrap();

    let config = MonitorConfigBuilder::new()
        .filename(&path)
        .poll_interval_ms(10)
        .on_parse_error(ParseErrorPolicy::Abort)
        .build()
        .unwrap();
    let out = SharedBuf::default();
    let mut pipeline = MonitorPipelineBuilder::new()
        .config(config)
        .writer(ReportWriter::new(OutputFormat::Json, Box::new(out.clone())))
        .build()
        .unwrap();

    pipeline.start().await.unwrap();
    let token = pipeline.shutdown_token();
    tokio::time::timeout(Duration::from_secs(5), token.cancelled())
        .await
        .expect("pipeline should stop itself");

    let failure = pipeline.failure().expect("failure recorded");
    assert!(failure.contains("line 2"), "unexpected failure: {failure}");
    assert!(pipeline.health_check().await.is_unhealthy());
    pipeline.stop().await.unwrap();
    assert_eq!(pipeline.processed_count(), 1);
}

/// JSON 리포트는 한 줄씩 파싱 가능
#[tokio::test]
async fn json_reports_are_parseable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    std::fs::write(&path, format!("{}\n", line_at(t0(), "/api", 503))).unwrap();

    let config = MonitorConfigBuilder::new()
        .filename(&path)
        .poll_interval_ms(10)
        .report_interval_secs(1)
        .output_format(OutputFormat::Json)
        .build()
        .unwrap();
    let out = SharedBuf::default();
    let mut pipeline = MonitorPipelineBuilder::new()
        .config(config)
        .writer(ReportWriter::new(OutputFormat::Json, Box::new(out.clone())))
        .build()
        .unwrap();

    pipeline.start().await.unwrap();
    wait_until(|| !out.contents().is_empty()).await;
    pipeline.stop().await.unwrap();

    let output = out.contents();
    let first = output.lines().next().unwrap();
    let value: serde_json::Value = serde_json::from_str(first).unwrap();
    assert_eq!(value["response_codes"]["5XX"], 1);
    assert_eq!(value["top_sections"][0]["section"], "/api");
}
