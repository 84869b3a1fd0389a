//! 파이프라인 오케스트레이션 -- 추적/파싱/집계/리포트의 전체 흐름을 관리합니다.
//!
//! [`MonitorPipeline`]은 core의 [`Pipeline`](trafficwatch_core::pipeline::Pipeline) trait을
//! 구현하여 `trafficwatch-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! FileTailer -> mpsc<RawLine> -> ingest task -> Mutex<TrafficMonitor> <- reporter task
//!                                                                            |
//!                                          TrafficReport + AlertTransition --+--> ReportWriter
//! ```
//!
//! 집계기 잠금은 레코드 하나의 `ingest` 또는 리포트 스냅샷 하나 동안만 잡습니다.
//! 출력은 잠금을 놓은 뒤에 합니다.
//!
//! 알림 전환 메시지는 리포터만 출력합니다. 리포트마다 직전 리포트에서 본
//! 알림 상태와 비교하므로, 한 주기 안에서 상태가 바뀌었다가 되돌아오면
//! 메시지를 출력하지 않습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use trafficwatch_core::error::{ParseError, PipelineError, TrafficwatchError};
use trafficwatch_core::metrics as m;
use trafficwatch_core::pipeline::{HealthStatus, Pipeline};

use crate::collector::{FileTailer, RawLine};
use crate::config::{MonitorConfig, ParseErrorPolicy};
use crate::error::MonitorError;
use crate::monitor::{AlertState, TrafficMonitor};
use crate::parser::AccessLogParser;
use crate::report::{AlertTransition, ReportWriter};

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 태스크 간 공유 카운터
#[derive(Debug, Default)]
struct PipelineStats {
    processed: AtomicU64,
    parse_errors: AtomicU64,
    failure: std::sync::Mutex<Option<String>>,
}

impl PipelineStats {
    fn fail(&self, reason: String) {
        if let Ok(mut slot) = self.failure.lock() {
            slot.get_or_insert(reason);
        }
    }

    fn failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|slot| slot.clone())
    }
}

/// 라인 하나를 파싱하고 집계합니다.
///
/// 수집 태스크가 쓰는 단일 처리 단위입니다. 이 레코드로 알림 상태가
/// 바뀌었으면 전환을 반환합니다 (메트릭 기록용, 출력은 리포터 담당).
/// 파싱 실패 시 집계기는 변경되지 않습니다.
pub async fn process_line(
    monitor: &Mutex<TrafficMonitor>,
    parser: &AccessLogParser,
    line: &str,
) -> Result<Option<AlertTransition>, ParseError> {
    let record = match parser.parse(line) {
        Ok(record) => record,
        Err(e) => {
            metrics::counter!(m::MONITOR_PARSE_ERRORS_TOTAL, m::LABEL_PARSE_ERROR => e.kind())
                .increment(1);
            return Err(e);
        }
    };

    let started = Instant::now();
    let (previous, current, rate, window_len) = {
        let mut guard = monitor.lock().await;
        let previous = guard.alert_state();
        guard.ingest(&record);
        (
            previous,
            guard.alert_state(),
            guard.current_rate().ok(),
            guard.window_len(),
        )
    };
    metrics::histogram!(m::MONITOR_INGEST_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    let class = record.status_class().map_or("other", |c| c.label());
    metrics::counter!(m::MONITOR_RECORDS_INGESTED_TOTAL, m::LABEL_STATUS_CLASS => class)
        .increment(1);
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::MONITOR_WINDOW_SIZE).set(window_len as f64);
    if let Some(rate) = rate {
        metrics::gauge!(m::MONITOR_REQUEST_RATE).set(rate);
    }

    record_alerting(current);

    let transition = AlertTransition::between(previous, current, rate);
    if let Some(t) = &transition {
        metrics::counter!(m::MONITOR_ALERT_TRANSITIONS_TOTAL, m::LABEL_TRANSITION => t.label())
            .increment(1);
    }
    Ok(transition)
}

fn record_alerting(state: AlertState) {
    metrics::gauge!(m::MONITOR_ALERTING).set(if state.is_alerting() { 1.0 } else { 0.0 });
}

/// 트래픽 모니터 파이프라인 -- 추적/파싱/집계/리포트의 전체 흐름을 관리합니다.
///
/// # 사용 예시
/// ```ignore
/// use trafficwatch_monitor::{MonitorPipelineBuilder, config::MonitorConfig};
/// use trafficwatch_core::pipeline::Pipeline;
///
/// let mut pipeline = MonitorPipelineBuilder::new()
///     .config(MonitorConfig::default())
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct MonitorPipeline {
    config: MonitorConfig,
    state: PipelineState,
    monitor: Arc<Mutex<TrafficMonitor>>,
    parser: Arc<AccessLogParser>,
    writer: Arc<Mutex<ReportWriter>>,
    stats: Arc<PipelineStats>,
    /// 현재 실행의 취소 토큰 (start마다 새로 생성)
    cancel: CancellationToken,
    /// 백그라운드 태스크 핸들
    tasks: Vec<JoinHandle<()>>,
}

impl MonitorPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 공유 집계기
    pub fn monitor(&self) -> Arc<Mutex<TrafficMonitor>> {
        Arc::clone(&self.monitor)
    }

    /// 설정
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// 집계된 라인 수를 반환합니다.
    pub fn processed_count(&self) -> u64 {
        self.stats.processed.load(Ordering::Relaxed)
    }

    /// 파싱 에러 수를 반환합니다.
    pub fn parse_error_count(&self) -> u64 {
        self.stats.parse_errors.load(Ordering::Relaxed)
    }

    /// 파이프라인을 스스로 멈추게 한 에러 (abort 정책, 추적 실패)
    pub fn failure(&self) -> Option<String> {
        self.stats.failure()
    }

    /// 현재 실행의 취소 토큰
    ///
    /// 내부 실패로 파이프라인이 멈추면 취소됩니다.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn spawn_tailer(&mut self, tx: mpsc::Sender<RawLine>) {
        let mut tailer = FileTailer::new(self.config.tailer_config(), tx);
        let cancel = self.cancel.clone();
        let stats = Arc::clone(&self.stats);

        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = tailer.run(cancel.clone()).await {
                error!(error = %e, "file tailer failed, stopping pipeline");
                stats.fail(e.to_string());
                cancel.cancel();
            }
            debug!(
                status = tailer.status().name(),
                lines = tailer.lines_seen(),
                "tailer task finished"
            );
        }));
    }

    fn spawn_ingest(&mut self, mut rx: mpsc::Receiver<RawLine>) {
        let monitor = Arc::clone(&self.monitor);
        let parser = Arc::clone(&self.parser);
        let stats = Arc::clone(&self.stats);
        let cancel = self.cancel.clone();
        let policy = self.config.on_parse_error;

        self.tasks.push(tokio::spawn(async move {
            loop {
                let raw = tokio::select! {
                    _ = cancel.cancelled() => break,
                    raw = rx.recv() => match raw {
                        Some(raw) => raw,
                        None => {
                            // 추적기가 에러 없이 사라짐 (패닉 등)
                            if !cancel.is_cancelled() {
                                let err = MonitorError::Channel(
                                    "line channel closed before shutdown".to_owned(),
                                );
                                error!(error = %err, "stopping pipeline");
                                stats.fail(err.to_string());
                                cancel.cancel();
                            }
                            break;
                        }
                    },
                };

                match process_line(&monitor, &parser, &raw.line).await {
                    Ok(transition) => {
                        stats.processed.fetch_add(1, Ordering::Relaxed);
                        if let Some(transition) = transition {
                            debug!(
                                transition = transition.label(),
                                line_no = raw.line_no,
                                "alert state flipped"
                            );
                        }
                    }
                    Err(source) => {
                        stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                        match policy {
                            ParseErrorPolicy::Skip => {
                                warn!(
                                    line_no = raw.line_no,
                                    kind = source.kind(),
                                    error = %source,
                                    "skipping unparseable line"
                                );
                            }
                            ParseErrorPolicy::Abort => {
                                let err = MonitorError::Parse {
                                    line_no: raw.line_no,
                                    source,
                                };
                                error!(error = %err, "unparseable line, stopping pipeline");
                                stats.fail(err.to_string());
                                cancel.cancel();
                                break;
                            }
                        }
                    }
                }
            }
            debug!("ingest task finished");
        }));
    }

    fn spawn_reporter(&mut self) {
        let monitor = Arc::clone(&self.monitor);
        let writer = Arc::clone(&self.writer);
        let cancel = self.cancel.clone();
        let top_n = self.config.top_n;
        let period = Duration::from_secs(self.config.report_interval_secs);

        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // 직전 리포트에서 본 알림 상태
            let mut last = AlertState::NotAlerting;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let (report, current, rate) = {
                    let guard = monitor.lock().await;
                    (
                        guard.snapshot(top_n),
                        guard.alert_state(),
                        guard.current_rate().ok(),
                    )
                };
                let transition = AlertTransition::between(last, current, rate);
                last = current;

                let mut out = writer.lock().await;
                if let Err(e) = out.write(&report) {
                    warn!(error = %e, "failed to write traffic report");
                }
                if let Some(transition) = transition {
                    info!(transition = transition.label(), "{}", transition.message());
                    if let Err(e) = out.write(&transition) {
                        warn!(error = %e, "failed to write alert transition");
                    }
                }
            }
            debug!("reporter task finished");
        }));
    }
}

impl Pipeline for MonitorPipeline {
    async fn start(&mut self) -> Result<(), TrafficwatchError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!(
            filename = %self.config.filename.display(),
            window_secs = self.config.window_secs,
            rate_threshold = self.config.rate_threshold,
            top_n = self.config.top_n,
            "starting traffic monitor pipeline"
        );

        self.cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        record_alerting(self.monitor.lock().await.alert_state());

        self.spawn_tailer(tx);
        self.spawn_ingest(rx);
        self.spawn_reporter();

        self.state = PipelineState::Running;
        info!("traffic monitor pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), TrafficwatchError> {
        if self.state != PipelineState::Running {
            debug!(state = self.state_name(), "stop requested while not running");
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping traffic monitor pipeline");
        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "pipeline task ended abnormally");
            }
        }

        self.state = PipelineState::Stopped;
        info!(
            processed = self.processed_count(),
            parse_errors = self.parse_error_count(),
            "traffic monitor pipeline stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if let Some(reason) = self.failure() {
                    HealthStatus::Unhealthy(reason)
                } else if self.tasks.iter().any(JoinHandle::is_finished) {
                    HealthStatus::Degraded("a background task exited".to_owned())
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 모니터 파이프라인 빌더
pub struct MonitorPipelineBuilder {
    config: MonitorConfig,
    writer: Option<ReportWriter>,
}

impl MonitorPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
            writer: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// 리포트 출력기를 지정합니다.
    ///
    /// 설정하지 않으면 설정된 형식으로 표준 출력에 씁니다.
    pub fn writer(mut self, writer: ReportWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<MonitorPipeline, MonitorError> {
        self.config.validate()?;

        let parser = AccessLogParser::new()?.with_max_line_length(self.config.max_line_length);
        let writer = self
            .writer
            .unwrap_or_else(|| ReportWriter::stdout(self.config.output_format));
        let monitor = TrafficMonitor::new(self.config.monitor_settings());

        Ok(MonitorPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            monitor: Arc::new(Mutex::new(monitor)),
            parser: Arc::new(parser),
            writer: Arc::new(Mutex::new(writer)),
            stats: Arc::new(PipelineStats::default()),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }
}

impl Default for MonitorPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfigBuilder;

    const LINE: &str =
        r#"127.0.0.1 - james [09/May/2018:16:00:39 +0000] "GET /report HTTP/1.0" 200 123"#;

    #[test]
    fn builder_creates_pipeline() {
        let pipeline = MonitorPipelineBuilder::new().build().unwrap();
        assert_eq!(pipeline.state_name(), "initialized");
        assert_eq!(pipeline.processed_count(), 0);
        assert_eq!(pipeline.parse_error_count(), 0);
        assert!(pipeline.failure().is_none());
    }

    #[test]
    fn builder_with_invalid_config_fails() {
        let config = MonitorConfig {
            top_n: 0,
            ..Default::default()
        };
        let result = MonitorPipelineBuilder::new().config(config).build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn pipeline_lifecycle_before_start() {
        let mut pipeline = MonitorPipelineBuilder::new().build().unwrap();
        assert!(pipeline.health_check().await.is_unhealthy());
        assert!(pipeline.stop().await.is_err());
    }

    #[tokio::test]
    async fn process_line_ingests_valid_line() {
        let monitor = Mutex::new(TrafficMonitor::default());
        let parser = AccessLogParser::new().unwrap();

        let transition = process_line(&monitor, &parser, LINE).await.unwrap();
        assert!(transition.is_none());

        let guard = monitor.lock().await;
        assert_eq!(guard.total_ingested(), 1);
        assert_eq!(guard.top_sections(1)[0].section, "/report");
    }

    #[tokio::test]
    async fn process_line_leaves_monitor_untouched_on_error() {
        let monitor = Mutex::new(TrafficMonitor::default());
        let parser = AccessLogParser::new().unwrap();

        let err = process_line(&monitor, &parser, "garbage").await.unwrap_err();
        assert_eq!(err.kind(), "malformed");
        assert_eq!(monitor.lock().await.total_ingested(), 0);
    }

    /// gauge 값 기록용 테스트 레코더
    #[derive(Default)]
    struct GaugeSpy(std::sync::Mutex<Vec<(String, f64)>>);

    struct SpyGauge {
        name: String,
        spy: Arc<GaugeSpy>,
    }

    impl metrics::GaugeFn for SpyGauge {
        fn increment(&self, _value: f64) {}

        fn decrement(&self, _value: f64) {}

        fn set(&self, value: f64) {
            self.spy.0.lock().unwrap().push((self.name.clone(), value));
        }
    }

    struct SpyRecorder(Arc<GaugeSpy>);

    impl metrics::Recorder for SpyRecorder {
        fn describe_counter(
            &self,
            _key: metrics::KeyName,
            _unit: Option<metrics::Unit>,
            _description: metrics::SharedString,
        ) {
        }

        fn describe_gauge(
            &self,
            _key: metrics::KeyName,
            _unit: Option<metrics::Unit>,
            _description: metrics::SharedString,
        ) {
        }

        fn describe_histogram(
            &self,
            _key: metrics::KeyName,
            _unit: Option<metrics::Unit>,
            _description: metrics::SharedString,
        ) {
        }

        fn register_counter(
            &self,
            _key: &metrics::Key,
            _metadata: &metrics::Metadata<'_>,
        ) -> metrics::Counter {
            metrics::Counter::noop()
        }

        fn register_gauge(
            &self,
            key: &metrics::Key,
            _metadata: &metrics::Metadata<'_>,
        ) -> metrics::Gauge {
            metrics::Gauge::from_arc(Arc::new(SpyGauge {
                name: key.name().to_owned(),
                spy: Arc::clone(&self.0),
            }))
        }

        fn register_histogram(
            &self,
            _key: &metrics::Key,
            _metadata: &metrics::Metadata<'_>,
        ) -> metrics::Histogram {
            metrics::Histogram::noop()
        }
    }

    #[test]
    fn alerting_gauge_is_set_without_a_transition() {
        let spy = Arc::new(GaugeSpy::default());
        let recorder = SpyRecorder(Arc::clone(&spy));
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();

        metrics::with_local_recorder(&recorder, || {
            rt.block_on(async {
                let monitor = Mutex::new(TrafficMonitor::default());
                let parser = AccessLogParser::new().unwrap();
                let transition = process_line(&monitor, &parser, LINE).await.unwrap();
                assert!(transition.is_none());
            });
        });

        let sets = spy.0.lock().unwrap();
        assert!(
            sets.iter()
                .any(|(name, value)| name == m::MONITOR_ALERTING && *value == 0.0),
            "alerting gauge not set: {sets:?}"
        );
    }

    #[tokio::test]
    async fn process_line_reports_fired_transition() {
        let config = MonitorConfigBuilder::new().rate_threshold(1.0).build().unwrap();
        let monitor = Mutex::new(TrafficMonitor::new(config.monitor_settings()));
        let parser = AccessLogParser::new().unwrap();

        let first =
            r#"10.0.0.1 - - [09/May/2018:16:00:00 +0000] "GET /api/a HTTP/1.1" 200 10"#;
        let second =
            r#"10.0.0.1 - - [09/May/2018:16:00:01 +0000] "GET /api/b HTTP/1.1" 200 10"#;
        let third =
            r#"10.0.0.1 - - [09/May/2018:16:00:01 +0000] "GET /api/c HTTP/1.1" 200 10"#;

        assert!(process_line(&monitor, &parser, first).await.unwrap().is_none());
        // 2건 / 1초 = 2.0 > 1.0
        let fired = process_line(&monitor, &parser, second).await.unwrap();
        assert_eq!(fired, Some(AlertTransition::Fired { rate: Some(2.0) }));
        // 이미 알림 중이면 전환 없음
        assert!(process_line(&monitor, &parser, third).await.unwrap().is_none());
    }
}
