#![no_main]

use libfuzzer_sys::fuzz_target;
use trafficwatch_monitor::parser::AccessLogParser;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let parser = AccessLogParser::new().unwrap().with_max_line_length(4096);
    if let Ok(record) = parser.parse(&line) {
        // 파싱에 성공한 레코드는 불변식을 만족해야 함
        assert!(record.section.starts_with('/'));
        assert!(!record.section[1..].contains('/'));
        assert!((100..=599).contains(&record.status_code));
        assert!(record.status_class().is_some());
    }
});
