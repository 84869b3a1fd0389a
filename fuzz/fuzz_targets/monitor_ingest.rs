#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use trafficwatch_monitor::monitor::{MonitorSettings, TrafficMonitor};
use trafficwatch_monitor::parser::AccessLogParser;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 윈도우 길이 (1-600초로 제한)
    window_secs: u16,
    /// 임계값 (0-1000 req/s로 제한)
    threshold: u16,
    /// 요청 목록 (최대 256개로 제한)
    requests: Vec<FuzzRequest>,
}

#[derive(Arbitrary, Debug)]
struct FuzzRequest {
    /// 기준 시각으로부터의 오프셋 (초, 음수면 순서 위반)
    offset_secs: i16,
    section: u8,
    status: u16,
}

fuzz_target!(|input: FuzzInput| {
    let parser = AccessLogParser::new().unwrap();
    let mut monitor = TrafficMonitor::new(MonitorSettings {
        window_secs: u64::from(input.window_secs % 600) + 1,
        rate_threshold: f64::from(input.threshold % 1000),
    });

    let mut ingested = 0u64;
    for req in input.requests.iter().take(256) {
        let secs = 3600 + i32::from(req.offset_secs);
        let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
        let line = format!(
            r#"10.0.0.1 - - [09/May/2018:{h:02}:{m:02}:{s:02} +0000] "GET /s{}/x HTTP/1.1" {} 1"#,
            req.section % 16,
            req.status,
        );
        if let Ok(record) = parser.parse(&line) {
            monitor.ingest(&record);
            ingested += 1;
        }

        // 어떤 입력에서도 유지되어야 하는 불변식
        assert_eq!(monitor.response_code_counts().len(), 5);
        assert!(monitor.window_len() as u64 <= ingested);
        if let Ok(rate) = monitor.current_rate() {
            assert!(rate.is_finite() && rate > 0.0);
        }
        let top = monitor.top_sections(5);
        assert!(top.len() <= 5);
        assert!(top.windows(2).all(|w| w[0].count >= w[1].count));
    }
    assert_eq!(monitor.total_ingested(), ingested);
});
