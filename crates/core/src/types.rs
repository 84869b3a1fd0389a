//! 도메인 타입 -- 액세스 로그 레코드와 응답 코드 분류
//!
//! 파서가 생성하고 모니터가 소비하는 데이터 구조를 정의합니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 지원하는 HTTP 메서드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Head,
    Delete,
    Options,
}

impl HttpMethod {
    /// 메서드 토큰 문자열을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Head => "HEAD",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "HEAD" => Ok(Self::Head),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            other => Err(format!("unsupported method: {other}")),
        }
    }
}

/// 응답 코드 분류 (`1XX`..`5XX`)
///
/// 상태 코드의 첫 자리로 결정됩니다. 정렬 순서는 `1XX` < ... < `5XX`입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatusClass {
    #[serde(rename = "1XX")]
    Informational,
    #[serde(rename = "2XX")]
    Success,
    #[serde(rename = "3XX")]
    Redirection,
    #[serde(rename = "4XX")]
    ClientError,
    #[serde(rename = "5XX")]
    ServerError,
}

impl StatusClass {
    /// 모든 분류 (표시 순서)
    pub const ALL: [StatusClass; 5] = [
        Self::Informational,
        Self::Success,
        Self::Redirection,
        Self::ClientError,
        Self::ServerError,
    ];

    /// 상태 코드의 분류를 반환합니다.
    ///
    /// 100-599 범위 밖이면 `None`입니다.
    pub fn of(status_code: u16) -> Option<Self> {
        match status_code / 100 {
            1 => Some(Self::Informational),
            2 => Some(Self::Success),
            3 => Some(Self::Redirection),
            4 => Some(Self::ClientError),
            5 => Some(Self::ServerError),
            _ => None,
        }
    }

    /// `"4XX"` 형식의 라벨
    pub fn label(&self) -> &'static str {
        match self {
            Self::Informational => "1XX",
            Self::Success => "2XX",
            Self::Redirection => "3XX",
            Self::ClientError => "4XX",
            Self::ServerError => "5XX",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 파싱된 액세스 로그 레코드
///
/// 생성 후 변경되지 않습니다. `section`은 항상 `/`로 시작하며
/// `section + resource`가 원래 요청 경로입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// 클라이언트 주소
    pub ip: String,
    /// RFC 1413 identity (관례상 `-`)
    pub identity: String,
    /// 인증 사용자
    pub user: String,
    /// 요청 시각 (UTC로 정규화)
    pub timestamp: DateTime<Utc>,
    /// HTTP 메서드
    pub method: HttpMethod,
    /// 경로의 첫 세그먼트 (예: `/api`)
    pub section: String,
    /// 섹션 이후의 나머지 경로 (빈 문자열 가능)
    pub resource: String,
    /// 프로토콜 (예: `HTTP/1.1`)
    pub protocol: String,
    /// 응답 상태 코드 (100-599)
    pub status_code: u16,
    /// 응답 본문 크기 (알 수 없으면 0)
    pub size: u64,
}

impl LogRecord {
    /// 원래 요청 경로를 재구성합니다.
    pub fn path(&self) -> String {
        format!("{}{}", self.section, self.resource)
    }

    /// 응답 코드 분류
    ///
    /// 파서를 거친 레코드는 항상 `Some`입니다.
    pub fn status_class(&self) -> Option<StatusClass> {
        StatusClass::of(self.status_code)
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {} ({} bytes)",
            self.ip,
            self.method,
            self.path(),
            self.status_code,
            self.size,
        )
    }
}
