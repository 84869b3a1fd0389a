//! 슬라이딩 윈도우 -- 최근 요청 시각을 보관하고 평균 요청률을 계산합니다.
//!
//! [`RateWindow`]는 도착 순서대로 요청 시각을 쌓고, 가장 최근 요청을 기준으로
//! 윈도우 길이보다 오래된 엔트리를 앞에서부터 제거합니다.
//!
//! # 경계 조건
//! - 최신 엔트리와의 차이가 윈도우 길이와 **정확히 같은** 엔트리는 유지됩니다
//!   (차이가 윈도우 길이를 초과할 때만 제거).
//! - 최신 엔트리보다 과거의 시각이 들어오면 최신 시각으로 보정하여 넣습니다.
//!   윈도우는 항상 단조 증가 순서를 유지합니다.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// 요청률을 계산할 수 없는 이유
///
/// 에러가 아니라 "판단 보류"를 뜻합니다. 알림 상태는 그대로 유지됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RateUnavailable {
    /// 아직 요청이 없음
    #[error("window is empty")]
    EmptyWindow,
    /// 가장 오래된 요청과 최신 요청의 시각이 같음 (엔트리 1개 포함)
    #[error("window spans zero seconds")]
    ZeroSpan,
}

/// 요청 시각 슬라이딩 윈도우
#[derive(Debug, Clone)]
pub struct RateWindow {
    /// 요청 시각 (오래된 것부터)
    entries: VecDeque<DateTime<Utc>>,
    /// 윈도우 길이 (밀리초)
    span_ms: i64,
    /// 순서가 뒤바뀌어 보정된 엔트리 수
    clamped: u64,
}

impl RateWindow {
    /// 주어진 길이(초)의 빈 윈도우를 생성합니다.
    pub fn new(window_secs: u64) -> Self {
        let span_ms = i64::try_from(window_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        Self {
            entries: VecDeque::new(),
            span_ms,
            clamped: 0,
        }
    }

    /// 요청 시각을 추가하고 윈도우 밖으로 밀려난 엔트리를 제거합니다.
    ///
    /// 제거된 엔트리 수를 반환합니다.
    pub fn push(&mut self, timestamp: DateTime<Utc>) -> usize {
        let timestamp = match self.entries.back() {
            Some(&newest) if timestamp < newest => {
                self.clamped += 1;
                tracing::debug!(
                    timestamp = %timestamp,
                    newest = %newest,
                    "out-of-order timestamp, clamping to newest"
                );
                newest
            }
            _ => timestamp,
        };
        self.entries.push_back(timestamp);

        let mut evicted = 0;
        while let (Some(&oldest), Some(&newest)) = (self.entries.front(), self.entries.back()) {
            if (newest - oldest).num_milliseconds() <= self.span_ms {
                break;
            }
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// 윈도우의 평균 요청률 (초당 요청 수)
    ///
    /// `엔트리 수 / (최신 - 최고(最古) 시각)`으로 계산합니다.
    pub fn rate(&self) -> Result<f64, RateUnavailable> {
        let span = self.span_secs().ok_or(RateUnavailable::EmptyWindow)?;
        if span <= 0.0 {
            return Err(RateUnavailable::ZeroSpan);
        }
        #[allow(clippy::cast_precision_loss)]
        Ok(self.entries.len() as f64 / span)
    }

    /// 가장 오래된 엔트리와 최신 엔트리 사이의 시간 (초)
    pub fn span_secs(&self) -> Option<f64> {
        let oldest = self.entries.front()?;
        let newest = self.entries.back()?;
        #[allow(clippy::cast_precision_loss)]
        Some((*newest - *oldest).num_milliseconds() as f64 / 1000.0)
    }

    /// 가장 오래된 엔트리
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.entries.front().copied()
    }

    /// 최신 엔트리
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.entries.back().copied()
    }

    /// 현재 윈도우에 있는 엔트리 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 윈도우가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 순서 보정된 엔트리 수
    pub fn clamped_count(&self) -> u64 {
        self.clamped
    }
}
