//! Integration tests for metrics server address handling.

use trafficwatch_core::config::MetricsConfig;
use trafficwatch_daemon::metrics_server;

#[test]
fn listen_addr_combines_host_and_port() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 19187,
    };
    let addr = metrics_server::listen_addr(&config).expect("valid address");
    assert_eq!(addr.to_string(), "127.0.0.1:19187");
}

#[test]
fn install_fails_with_invalid_address() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_owned(),
        port: 9187,
    };
    let result = metrics_server::install_metrics_recorder(&config);
    assert!(result.is_err(), "install should fail with invalid address");
}
