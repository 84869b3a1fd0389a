//! 액세스 로그 파서
//!
//! W3C/Common Log Format 계열의 액세스 로그 한 줄을 [`LogRecord`]로 변환합니다.
//!
//! # 라인 형식
//! ```text
//! <ip> - <user> [<dd>/<Mon>/<yyyy>:<HH>:<MM>:<SS> <±hhmm>] "<METHOD> <section><resource> <protocol>" <status> <size>
//! ```
//!
//! 라인 전체가 형식과 일치해야 하며 부분 매칭은 허용하지 않습니다.
//! `size`가 `-`처럼 숫자가 아니면 0으로 대체합니다.
//!
//! # 사용 예시
//! ```ignore
//! use trafficwatch_monitor::parser::AccessLogParser;
//!
//! let parser = AccessLogParser::new()?;
//! let record = parser.parse(
//!     r#"127.0.0.1 - jill [09/May/2018:16:00:41 +0000] "GET /api/user HTTP/1.0" 200 234"#,
//! )?;
//! assert_eq!(record.section, "/api");
//! ```

use std::sync::LazyLock;

use chrono::{DateTime, Timelike, Utc};
use regex::{Captures, Regex};
use trafficwatch_core::error::ParseError;
use trafficwatch_core::types::{HttpMethod, LogRecord};

use crate::error::MonitorError;

/// 라인 문법
///
/// `\d` 대신 `[0-9]`를 사용한다 (regex 크레이트의 `\d`는 유니코드 숫자 전체와 일치).
const LINE_PATTERN: &str = concat!(
    r"^(?P<ip>[^ ]+) ",
    r"(?P<identity>-) ",
    r"(?P<user>[0-9A-Za-z-]+) ",
    r"\[(?P<timestamp>[0-9]{2}/(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)/[0-9]{4}",
    r":[0-9]{2}:[0-9]{2}:[0-9]{2} [+-][0-9]{4})\] ",
    r#""(?P<method>GET|POST|PUT|HEAD|DELETE|OPTIONS) "#,
    r"(?P<section>/[^/ ]*)",
    r"(?P<resource>[^ ]*) ",
    r#"(?P<protocol>HTTP/[0-9]\.[0-9])" "#,
    r"(?P<status>[^ ]+) ",
    r"(?P<size>[0-9-]+)$",
);

/// 타임스탬프 형식 (예: `09/May/2018:16:00:41 +0000`)
const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// 기본 최대 라인 길이 (바이트)
const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// 액세스 로그 파서
///
/// 정규식은 생성 시 한 번만 컴파일되며, 이후 `parse`는 `&self`로
/// 여러 태스크에서 공유할 수 있습니다.
#[derive(Debug, Clone)]
pub struct AccessLogParser {
    /// 컴파일된 라인 문법
    pattern: Regex,
    /// 최대 허용 입력 크기 (바이트)
    max_line_length: usize,
}

impl AccessLogParser {
    /// 기본 설정으로 새 파서를 생성합니다.
    pub fn new() -> Result<Self, MonitorError> {
        Ok(Self {
            pattern: Regex::new(LINE_PATTERN)?,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        })
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// 최대 라인 길이를 반환합니다.
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// 한 줄을 파싱합니다.
    ///
    /// 끝의 줄바꿈 하나(`\n`, `\r`, `\r\n`)만 무시합니다.
    ///
    /// # Errors
    /// - [`ParseError::Malformed`]: 문법 불일치, 빈 줄, 길이 초과
    /// - [`ParseError::BadTimestamp`]: 존재하지 않는 날짜/시각
    /// - [`ParseError::BadStatusCode`]: 100-599 범위의 정수가 아닌 상태 코드
    pub fn parse(&self, line: &str) -> Result<LogRecord, ParseError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return Err(ParseError::Malformed {
                reason: "empty line".to_owned(),
            });
        }

        if line.len() > self.max_line_length {
            return Err(ParseError::Malformed {
                reason: format!(
                    "line too long: {} bytes (max: {})",
                    line.len(),
                    self.max_line_length
                ),
            });
        }

        let caps = self
            .pattern
            .captures(line)
            .ok_or_else(|| ParseError::Malformed {
                reason: "line does not match access log grammar".to_owned(),
            })?;

        let field = |name: &str| group(&caps, name);

        let timestamp = parse_timestamp(field("timestamp"))?;
        let status_code = parse_status_code(field("status"))?;
        let size = parse_size(field("size"));

        let method = field("method")
            .parse::<HttpMethod>()
            .map_err(|reason| ParseError::Malformed { reason })?;

        Ok(LogRecord {
            ip: field("ip").to_owned(),
            identity: field("identity").to_owned(),
            user: field("user").to_owned(),
            timestamp,
            method,
            section: field("section").to_owned(),
            resource: field("resource").to_owned(),
            protocol: field("protocol").to_owned(),
            status_code,
            size,
        })
    }
}

/// 프로세스 전역 기본 파서
static DEFAULT_PARSER: LazyLock<Result<AccessLogParser, String>> =
    LazyLock::new(|| AccessLogParser::new().map_err(|e| e.to_string()));

/// 기본 설정의 파서로 한 줄을 파싱합니다.
///
/// [`AccessLogParser::parse`]와 같습니다.
pub fn parse_line(line: &str) -> Result<LogRecord, ParseError> {
    match &*DEFAULT_PARSER {
        Ok(parser) => parser.parse(line),
        Err(reason) => Err(ParseError::Malformed {
            reason: reason.clone(),
        }),
    }
}

/// 모든 그룹은 필수이므로 매칭에 성공하면 항상 존재한다.
fn group<'h>(caps: &Captures<'h>, name: &str) -> &'h str {
    caps.name(name).map_or("", |m| m.as_str())
}

/// 로그에 포함된 오프셋으로 시각을 해석한 뒤 UTC로 변환합니다.
///
/// chrono의 `%S`는 윤초(`60`)를 받아들이므로 따로 거부한다.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ParseError> {
    let ts = DateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|e| {
        ParseError::BadTimestamp {
            value: value.to_owned(),
            reason: e.to_string(),
        }
    })?;

    if ts.nanosecond() >= 1_000_000_000 {
        return Err(ParseError::BadTimestamp {
            value: value.to_owned(),
            reason: "second out of range".to_owned(),
        });
    }
    Ok(ts.with_timezone(&Utc))
}

fn parse_status_code(value: &str) -> Result<u16, ParseError> {
    match value.parse::<u16>() {
        Ok(code) if (100..=599).contains(&code) => Ok(code),
        _ => Err(ParseError::BadStatusCode {
            value: value.to_owned(),
        }),
    }
}

/// 크기는 집계에 쓰이지 않으므로 해석 실패는 0으로 대체한다.
fn parse_size(value: &str) -> u64 {
    value.parse::<u64>().unwrap_or(0)
}
