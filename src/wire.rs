use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use ulid::Ulid;

use crate::auth::RosterdAuthSource;
use crate::engine::Engine;
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command};
use crate::tenant::TenantManager;

pub struct RosterdHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<RosterdQueryParser>,
}

impl RosterdHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(RosterdQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    async fn execute_timed(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let start = Instant::now();
        let result = self.execute_command(engine, cmd).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        result
    }

    async fn execute_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertSoldier {
                id,
                name,
                rank,
                limitations,
            } => {
                engine
                    .create_soldier(id, name, rank, limitations)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateSoldier { id, patch } => {
                let soldier = engine.update_soldier(id, patch).await.map_err(engine_err)?;
                Ok(vec![soldier_rows(vec![soldier])?])
            }
            Command::AddLimitations { id, limitations } => {
                let soldier = engine
                    .add_limitations(id, limitations)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![soldier_rows(vec![soldier])?])
            }
            Command::DeleteSoldier { id } => {
                engine.delete_soldier(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::SelectSoldiers {
                id,
                name,
                rank,
                limitations,
            } => {
                let soldiers = match id {
                    Some(id) => vec![engine.soldier_snapshot(&id).await.map_err(engine_err)?],
                    None => {
                        let filter = crate::engine::SoldierFilter {
                            name,
                            rank,
                            limitations,
                        };
                        engine.list_soldiers(&filter).await
                    }
                };
                Ok(vec![soldier_rows(soldiers)?])
            }
            // The created duty is returned as a row so callers learn
            // the generated id.
            Command::InsertDuty { draft } => {
                let duty = engine.create_duty(draft).await.map_err(engine_err)?;
                Ok(vec![duty_rows(vec![duty])?])
            }
            Command::UpdateDuty { id, patch } => {
                let duty = engine.update_duty(id, patch).await.map_err(engine_err)?;
                Ok(vec![duty_rows(vec![duty])?])
            }
            Command::AddConstraints { id, constraints } => {
                let duty = engine
                    .add_constraints(id, constraints)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![duty_rows(vec![duty])?])
            }
            Command::DeleteDuty { id } => {
                engine.delete_duty(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::SelectDuties { id, name, status } => {
                let duties = match id {
                    Some(id) => vec![engine.duty_snapshot(&id).await.map_err(engine_err)?],
                    None => {
                        let filter = crate::engine::DutyFilter { name, status };
                        engine.list_duties(&filter).await
                    }
                };
                Ok(vec![duty_rows(duties)?])
            }
            Command::SelectJusticeBoard { soldier_id } => {
                let entries = match soldier_id {
                    Some(id) => {
                        let score = engine.justice_score(&id).await.map_err(engine_err)?;
                        vec![JusticeEntry {
                            soldier_id: id,
                            score,
                        }]
                    }
                    None => engine.justice_board_entries().await,
                };
                Ok(vec![justice_rows(entries)?])
            }
            Command::ScheduleDuty { id } => {
                let duty = engine.schedule_duty(id).await.map_err(engine_err)?;
                Ok(vec![duty_rows(vec![duty])?])
            }
            Command::CancelDuty { id } => {
                let duty = engine.cancel_duty(id).await.map_err(engine_err)?;
                Ok(vec![duty_rows(vec![duty])?])
            }
            Command::ScheduleAll => {
                let results = engine.schedule_all_unscheduled().await;
                Ok(vec![outcome_rows(results)?])
            }
            Command::Listen { channel } => {
                let duty_id_str = channel.strip_prefix("duty_").ok_or_else(|| {
                    PgWireError::UserError(Box::new(ErrorInfo::new(
                        "ERROR".into(),
                        "42000".into(),
                        format!("invalid channel: {channel} (expected duty_{{id}})"),
                    )))
                })?;
                let duty_id = Ulid::from_string(duty_id_str).map_err(|e| {
                    PgWireError::UserError(Box::new(ErrorInfo::new(
                        "ERROR".into(),
                        "42000".into(),
                        format!("bad duty id in channel: {e}"),
                    )))
                })?;
                // Registration keeps the duty's channel alive; delivery
                // to this connection is out of band.
                let _rx = engine.notify.subscribe(duty_id);
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
        }
    }
}

// ── Row schemas and encoders ─────────────────────────────────────

fn varchar(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn int8(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::INT8, FieldFormat::Text)
}

fn float8(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::FLOAT8, FieldFormat::Text)
}

fn soldier_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("name"),
        varchar("rank"),
        int8("rank_value"),
        varchar("limitations"),
        int8("created_at"),
        int8("updated_at"),
    ]
}

fn duty_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("name"),
        varchar("description"),
        float8("lat"),
        float8("lon"),
        int8("start"),
        int8("end"),
        int8("min_rank"),
        int8("max_rank"),
        varchar("constraints"),
        int8("soldiers_required"),
        float8("value"),
        varchar("soldiers"),
        varchar("status"),
        varchar("status_history"),
        int8("created_at"),
        int8("updated_at"),
    ]
}

fn justice_schema() -> Vec<FieldInfo> {
    vec![varchar("soldier_id"), float8("score")]
}

fn outcome_schema() -> Vec<FieldInfo> {
    vec![varchar("duty_id"), varchar("assigned"), varchar("reason")]
}

fn json_text<T: serde::Serialize>(value: &T) -> PgWireResult<String> {
    serde_json::to_string(value).map_err(|e| {
        PgWireError::UserError(Box::new(ErrorInfo::new(
            "ERROR".into(),
            "XX000".into(),
            format!("row encoding failed: {e}"),
        )))
    })
}

fn soldier_rows(soldiers: Vec<Soldier>) -> PgWireResult<Response> {
    let schema = Arc::new(soldier_schema());
    let rows: Vec<PgWireResult<_>> = soldiers
        .into_iter()
        .map(|s| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&s.id.as_str())?;
            encoder.encode_field(&s.name)?;
            encoder.encode_field(&s.rank.name())?;
            encoder.encode_field(&(s.rank.value() as i64))?;
            encoder.encode_field(&json_text(&s.limitations)?)?;
            encoder.encode_field(&s.created_at)?;
            encoder.encode_field(&s.updated_at)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(
        schema,
        stream::iter(rows),
    )))
}

fn duty_rows(duties: Vec<Duty>) -> PgWireResult<Response> {
    let schema = Arc::new(duty_schema());
    let rows: Vec<PgWireResult<_>> = duties
        .into_iter()
        .map(|d| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&d.id.to_string())?;
            encoder.encode_field(&d.name)?;
            encoder.encode_field(&d.description)?;
            encoder.encode_field(&d.location.lat)?;
            encoder.encode_field(&d.location.lon)?;
            encoder.encode_field(&d.window.start)?;
            encoder.encode_field(&d.window.end)?;
            encoder.encode_field(&d.min_rank.map(|r| r.value() as i64))?;
            encoder.encode_field(&d.max_rank.map(|r| r.value() as i64))?;
            encoder.encode_field(&json_text(&d.constraints)?)?;
            encoder.encode_field(&(d.soldiers_required as i64))?;
            encoder.encode_field(&d.value)?;
            encoder.encode_field(&json_text(&d.soldiers)?)?;
            encoder.encode_field(&d.status.as_str())?;
            encoder.encode_field(&json_text(&d.status_history)?)?;
            encoder.encode_field(&d.created_at)?;
            encoder.encode_field(&d.updated_at)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(
        schema,
        stream::iter(rows),
    )))
}

fn justice_rows(entries: Vec<JusticeEntry>) -> PgWireResult<Response> {
    let schema = Arc::new(justice_schema());
    let rows: Vec<PgWireResult<_>> = entries
        .into_iter()
        .map(|entry| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&entry.soldier_id.as_str())?;
            encoder.encode_field(&entry.score)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(
        schema,
        stream::iter(rows),
    )))
}

fn outcome_rows(
    results: std::collections::BTreeMap<Ulid, ScheduleOutcome>,
) -> PgWireResult<Response> {
    let schema = Arc::new(outcome_schema());
    let rows: Vec<PgWireResult<_>> = results
        .into_iter()
        .map(|(duty_id, outcome)| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&duty_id.to_string())?;
            match outcome {
                ScheduleOutcome::Assigned(soldiers) => {
                    encoder.encode_field(&Some(json_text(&soldiers)?))?;
                    encoder.encode_field(&Option::<String>::None)?;
                }
                ScheduleOutcome::Skipped(reason) => {
                    encoder.encode_field(&Option::<String>::None)?;
                    encoder.encode_field(&Some(reason))?;
                }
            }
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(
        schema,
        stream::iter(rows),
    )))
}

#[async_trait]
impl SimpleQueryHandler for RosterdHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_timed(&engine, cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct RosterdQueryParser;

#[async_trait]
impl QueryParser for RosterdQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema_for(stmt))
    }
}

/// Best-effort row description from the statement text, for Describe.
/// Statements answered with a bare command tag describe as zero columns.
fn result_schema_for(stmt: &str) -> Vec<FieldInfo> {
    let upper = stmt.trim().to_uppercase();
    if upper.contains("JUSTICE_BOARD") {
        justice_schema()
    } else if upper.starts_with("SCHEDULE ALL") {
        outcome_schema()
    } else if upper.starts_with("SCHEDULE DUTY") || upper.starts_with("CANCEL DUTY") {
        duty_schema()
    } else if upper.contains("SOLDIERS")
        && (upper.starts_with("SELECT") || upper.starts_with("UPDATE"))
    {
        soldier_schema()
    } else if upper.contains("DUTIES")
        && (upper.starts_with("SELECT") || upper.starts_with("UPDATE") || upper.starts_with("INSERT"))
    {
        duty_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl ExtendedQueryHandler for RosterdHandler {
    type Statement = String;
    type QueryParser = RosterdQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.execute_timed(&engine, cmd).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema_for(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema_for(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    if n > max {
                        max = n;
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct RosterdFactory {
    handler: Arc<RosterdHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<RosterdAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl RosterdFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = RosterdAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(RosterdHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for RosterdFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one accepted TCP connection to completion.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = RosterdFactory::new(tenant_manager, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: crate::engine::EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "P0001".into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
