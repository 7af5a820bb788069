use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "rosterd_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "rosterd_query_duration_seconds";

/// Counter: duties moved to scheduled.
pub const DUTIES_SCHEDULED_TOTAL: &str = "rosterd_duties_scheduled_total";

/// Counter: batch auto-scheduling passes.
pub const SCHEDULING_RUNS_TOTAL: &str = "rosterd_scheduling_runs_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "rosterd_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "rosterd_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "rosterd_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "rosterd_tenants_active";

/// Counter: WAL compactions performed.
pub const WAL_COMPACTIONS_TOTAL: &str = "rosterd_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertSoldier { .. } => "insert_soldier",
        Command::UpdateSoldier { .. } => "update_soldier",
        Command::AddLimitations { .. } => "add_limitations",
        Command::DeleteSoldier { .. } => "delete_soldier",
        Command::SelectSoldiers { .. } => "select_soldiers",
        Command::InsertDuty { .. } => "insert_duty",
        Command::UpdateDuty { .. } => "update_duty",
        Command::AddConstraints { .. } => "add_constraints",
        Command::DeleteDuty { .. } => "delete_duty",
        Command::SelectDuties { .. } => "select_duties",
        Command::SelectJusticeBoard { .. } => "select_justice_board",
        Command::ScheduleDuty { .. } => "schedule_duty",
        Command::CancelDuty { .. } => "cancel_duty",
        Command::ScheduleAll => "schedule_all",
        Command::Listen { .. } => "listen",
    }
}
