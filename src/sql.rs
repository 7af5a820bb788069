use std::collections::BTreeSet;

use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertSoldier {
        id: SoldierId,
        name: String,
        rank: Rank,
        limitations: Vec<String>,
    },
    UpdateSoldier {
        id: SoldierId,
        patch: SoldierPatch,
    },
    AddLimitations {
        id: SoldierId,
        limitations: Vec<String>,
    },
    DeleteSoldier {
        id: SoldierId,
    },
    SelectSoldiers {
        id: Option<SoldierId>,
        name: Option<String>,
        rank: Option<Rank>,
        limitations: Vec<String>,
    },
    InsertDuty {
        draft: DutyDraft,
    },
    UpdateDuty {
        id: Ulid,
        patch: DutyPatch,
    },
    AddConstraints {
        id: Ulid,
        constraints: Vec<String>,
    },
    DeleteDuty {
        id: Ulid,
    },
    SelectDuties {
        id: Option<Ulid>,
        name: Option<String>,
        status: Option<DutyStatus>,
    },
    SelectJusticeBoard {
        soldier_id: Option<SoldierId>,
    },
    ScheduleDuty {
        id: Ulid,
    },
    CancelDuty {
        id: Ulid,
    },
    ScheduleAll,
    Listen {
        channel: String,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim().trim_end_matches(';').trim();

    // Verbs that aren't SQL — handled by prefix, like LISTEN.
    if let Some(rest) = strip_prefix_ci(trimmed, "LISTEN ") {
        return Ok(Command::Listen {
            channel: rest.trim().to_string(),
        });
    }
    if trimmed.eq_ignore_ascii_case("SCHEDULE ALL") {
        return Ok(Command::ScheduleAll);
    }
    if let Some(rest) = strip_prefix_ci(trimmed, "SCHEDULE DUTY ") {
        return Ok(Command::ScheduleDuty {
            id: parse_quoted_ulid(rest)?,
        });
    }
    if let Some(rest) = strip_prefix_ci(trimmed, "CANCEL DUTY ") {
        return Ok(Command::CancelDuty {
            id: parse_quoted_ulid(rest)?,
        });
    }
    if let Some(rest) = strip_prefix_ci(trimmed, "ADD LIMITATIONS ") {
        let (id, tags) = parse_quoted_pair(rest)?;
        return Ok(Command::AddLimitations {
            id: SoldierId::parse(&id).map_err(|e| SqlError::Parse(e.to_string()))?,
            limitations: split_tags(&tags),
        });
    }
    if let Some(rest) = strip_prefix_ci(trimmed, "ADD CONSTRAINTS ") {
        let (id, tags) = parse_quoted_pair(rest)?;
        return Ok(Command::AddConstraints {
            id: Ulid::from_string(&id).map_err(|e| SqlError::Parse(format!("bad duty id: {e}")))?,
            constraints: split_tags(&tags),
        });
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(table, assignments, selection),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Case-insensitive ASCII prefix strip. The prefix is ASCII, so a match
/// guarantees the cut lands on a char boundary.
fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn parse_quoted_ulid(raw: &str) -> Result<Ulid, SqlError> {
    let id = raw.trim().trim_matches('\'');
    Ulid::from_string(id).map_err(|e| SqlError::Parse(format!("bad duty id: {e}")))
}

/// `'<id>' '<comma,separated,tags>'` — ids never contain whitespace, so
/// the first whitespace run is the separator.
fn parse_quoted_pair(raw: &str) -> Result<(String, String), SqlError> {
    let raw = raw.trim();
    let mut parts = raw.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or_default();
    let second = parts
        .next()
        .ok_or_else(|| SqlError::Parse("expected two quoted values".into()))?;
    Ok((
        first.trim().trim_matches('\'').to_string(),
        second.trim().trim_matches('\'').to_string(),
    ))
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;

    match table.as_str() {
        "soldiers" => {
            if values.len() < 3 {
                return Err(SqlError::WrongArity("soldiers", 3, values.len()));
            }
            let limitations = if values.len() >= 4 {
                parse_tags(&values[3])?
            } else {
                Vec::new()
            };
            Ok(Command::InsertSoldier {
                id: parse_soldier_id(&values[0])?,
                name: parse_string(&values[1])?,
                rank: parse_rank(&values[2])?,
                limitations,
            })
        }
        "duties" => {
            // (name, description, lat, lon, start, end, min_rank,
            //  max_rank, constraints, soldiers_required, value)
            if values.len() < 11 {
                return Err(SqlError::WrongArity("duties", 11, values.len()));
            }
            let draft = DutyDraft {
                name: parse_string(&values[0])?,
                description: parse_string(&values[1])?,
                location: Location {
                    lat: parse_f64(&values[2])?,
                    lon: parse_f64(&values[3])?,
                },
                window: Span {
                    start: parse_i64(&values[4])?,
                    end: parse_i64(&values[5])?,
                },
                min_rank: parse_rank_or_null(&values[6])?,
                max_rank: parse_rank_or_null(&values[7])?,
                constraints: parse_tags(&values[8])?.into_iter().collect::<BTreeSet<_>>(),
                soldiers_required: parse_u32(&values[9])?,
                value: parse_f64(&values[10])?,
            };
            Ok(Command::InsertDuty { draft })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = collect_eq_filters(&delete.selection)?;

    match table.as_str() {
        "soldiers" => {
            let id = filter_soldier_id(&filters)?.ok_or(SqlError::MissingFilter("id"))?;
            Ok(Command::DeleteSoldier { id })
        }
        "duties" => {
            let id = filter_ulid(&filters)?.ok_or(SqlError::MissingFilter("id"))?;
            Ok(Command::DeleteDuty { id })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    let filters = collect_eq_filters(&select.selection)?;

    match table.as_str() {
        "soldiers" => {
            let rank = match filters.iter().find(|(col, _)| col == "rank") {
                Some((_, expr)) => Some(parse_rank(expr)?),
                None => None,
            };
            let limitations = match filters.iter().find(|(col, _)| col == "limitations") {
                Some((_, expr)) => split_tags(&parse_string(expr)?)
                    .into_iter()
                    .map(|t| t.to_lowercase())
                    .collect(),
                None => Vec::new(),
            };
            Ok(Command::SelectSoldiers {
                id: filter_soldier_id(&filters)?,
                name: filter_string(&filters, "name")?,
                rank,
                limitations,
            })
        }
        "duties" => {
            let status = match filters.iter().find(|(col, _)| col == "status") {
                Some((_, expr)) => {
                    let raw = parse_string(expr)?;
                    Some(
                        DutyStatus::from_name(&raw)
                            .ok_or(SqlError::Parse(format!("bad status: {raw}")))?,
                    )
                }
                None => None,
            };
            Ok(Command::SelectDuties {
                id: filter_ulid(&filters)?,
                name: filter_string(&filters, "name")?,
                status,
            })
        }
        "justice_board" => Ok(Command::SelectJusticeBoard {
            soldier_id: filter_soldier_id(&filters)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    let filters = collect_eq_filters(selection)?;

    match table.as_str() {
        "soldiers" => {
            let id = filter_soldier_id(&filters)?.ok_or(SqlError::MissingFilter("id"))?;
            let mut patch = SoldierPatch::default();
            for assignment in assignments {
                let col = assignment_column(assignment)
                    .ok_or_else(|| SqlError::Parse("bad assignment target".into()))?;
                match col.as_str() {
                    "name" => patch.name = Some(parse_string(&assignment.value)?),
                    "rank" => patch.rank = Some(parse_rank(&assignment.value)?),
                    "limitations" => patch.limitations = Some(parse_tags(&assignment.value)?),
                    _ => return Err(SqlError::UnknownColumn(col)),
                }
            }
            Ok(Command::UpdateSoldier { id, patch })
        }
        "duties" => {
            let id = filter_ulid(&filters)?.ok_or(SqlError::MissingFilter("id"))?;
            let mut patch = DutyPatch::default();
            let mut lat = None;
            let mut lon = None;
            for assignment in assignments {
                let col = assignment_column(assignment)
                    .ok_or_else(|| SqlError::Parse("bad assignment target".into()))?;
                let value = &assignment.value;
                match col.as_str() {
                    "name" => patch.name = Some(parse_string(value)?),
                    "description" => patch.description = Some(parse_string(value)?),
                    "lat" => lat = Some(parse_f64(value)?),
                    "lon" => lon = Some(parse_f64(value)?),
                    "start" => patch.start = Some(parse_i64(value)?),
                    "end" => patch.end = Some(parse_i64(value)?),
                    "min_rank" => patch.min_rank = Some(parse_rank(value)?),
                    "max_rank" => patch.max_rank = Some(parse_rank(value)?),
                    "constraints" => patch.constraints = Some(parse_tags(value)?),
                    "soldiers_required" => patch.soldiers_required = Some(parse_u32(value)?),
                    "value" => patch.value = Some(parse_f64(value)?),
                    // status moves only through SCHEDULE/CANCEL verbs
                    _ => return Err(SqlError::UnknownColumn(col)),
                }
            }
            patch.location = match (lat, lon) {
                (Some(lat), Some(lon)) => Some(Location { lat, lon }),
                (None, None) => None,
                _ => return Err(SqlError::Parse("lat and lon must be set together".into())),
            };
            Ok(Command::UpdateDuty { id, patch })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows[0].clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn assignment_column(assignment: &ast::Assignment) -> Option<String> {
    match &assignment.target {
        ast::AssignmentTarget::ColumnName(name) => object_name_last(name),
        _ => None,
    }
}

/// Flatten a WHERE clause of AND-ed equality comparisons into
/// (column, value-expression) pairs.
fn collect_eq_filters(selection: &Option<Expr>) -> Result<Vec<(String, Expr)>, SqlError> {
    let mut filters = Vec::new();
    if let Some(expr) = selection {
        walk_eq_filters(expr, &mut filters)?;
    }
    Ok(filters)
}

fn walk_eq_filters(expr: &Expr, filters: &mut Vec<(String, Expr)>) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => {
                walk_eq_filters(left, filters)?;
                walk_eq_filters(right, filters)?;
            }
            ast::BinaryOperator::Eq => {
                let col = expr_column_name(left)
                    .ok_or_else(|| SqlError::Parse("expected column on left of =".into()))?;
                filters.push((col, (**right).clone()));
            }
            other => return Err(SqlError::Unsupported(format!("operator {other}"))),
        },
        Expr::Nested(inner) => walk_eq_filters(inner, filters)?,
        other => return Err(SqlError::Unsupported(format!("filter {other}"))),
    }
    Ok(())
}

fn filter_soldier_id(filters: &[(String, Expr)]) -> Result<Option<SoldierId>, SqlError> {
    match filters.iter().find(|(col, _)| col == "id") {
        Some((_, expr)) => Ok(Some(parse_soldier_id(expr)?)),
        None => Ok(None),
    }
}

fn filter_ulid(filters: &[(String, Expr)]) -> Result<Option<Ulid>, SqlError> {
    match filters.iter().find(|(col, _)| col == "id") {
        Some((_, expr)) => Ok(Some(parse_ulid(expr)?)),
        None => Ok(None),
    }
}

fn filter_string(filters: &[(String, Expr)], column: &str) -> Result<Option<String>, SqlError> {
    match filters.iter().find(|(col, _)| col == column) {
        Some((_, expr)) => Ok(Some(parse_string(expr)?)),
        None => Ok(None),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) => Ok(s.clone()),
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

/// Comma-separated tag list in a single string: 'gun,night driving'.
fn parse_tags(expr: &Expr) -> Result<Vec<String>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(Vec::new());
    }
    Ok(split_tags(&parse_string(expr)?))
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_f64(expr: &Expr) -> Result<f64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad number: {e}"))),
            Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad number: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_f64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_soldier_id(expr: &Expr) -> Result<SoldierId, SqlError> {
    let raw = parse_string(expr)?;
    SoldierId::parse(&raw).map_err(|e| SqlError::Parse(e.to_string()))
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let raw = parse_string(expr)?;
    Ulid::from_string(&raw).map_err(|e| SqlError::Parse(format!("bad duty id: {e}")))
}

/// Rank as ordinal number or canonical name: 3 or 'lieutenant'.
fn parse_rank(expr: &Expr) -> Result<Rank, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => {
                let v: u8 = s
                    .parse()
                    .map_err(|e| SqlError::Parse(format!("bad rank: {e}")))?;
                Rank::from_value(v).ok_or(SqlError::Parse(format!("rank {v} out of range")))
            }
            Value::SingleQuotedString(s) => {
                if let Ok(v) = s.parse::<u8>() {
                    Rank::from_value(v).ok_or(SqlError::Parse(format!("rank {v} out of range")))
                } else {
                    Rank::from_name(s).ok_or(SqlError::Parse(format!("unknown rank: {s}")))
                }
            }
            _ => Err(SqlError::Parse(format!("expected rank, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_rank_or_null(expr: &Expr) -> Result<Option<Rank>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(None);
    }
    parse_rank(expr).map(Some)
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const DUTY_ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    #[test]
    fn parse_insert_soldier() {
        let sql = "INSERT INTO soldiers (id, name, rank, limitations) VALUES ('1234567', 'Dana Levi', 2, 'gun,night driving')";
        let cmd = parse_sql(sql).unwrap();
        match cmd {
            Command::InsertSoldier {
                id,
                name,
                rank,
                limitations,
            } => {
                assert_eq!(id.as_str(), "1234567");
                assert_eq!(name, "Dana Levi");
                assert_eq!(rank, Rank::Sergeant);
                assert_eq!(limitations, vec!["gun", "night driving"]);
            }
            _ => panic!("expected InsertSoldier, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_soldier_rank_by_name() {
        let sql = "INSERT INTO soldiers (id, name, rank) VALUES ('1234567', 'Dana Levi', 'colonel')";
        let cmd = parse_sql(sql).unwrap();
        match cmd {
            Command::InsertSoldier { rank, limitations, .. } => {
                assert_eq!(rank, Rank::Colonel);
                assert!(limitations.is_empty());
            }
            _ => panic!("expected InsertSoldier, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_soldier_bad_id() {
        let sql = "INSERT INTO soldiers (id, name, rank) VALUES ('123', 'Dana Levi', 2)";
        assert!(parse_sql(sql).is_err());
    }

    #[test]
    fn parse_insert_duty() {
        let sql = "INSERT INTO duties (name, description, lat, lon, start, \"end\", min_rank, max_rank, constraints, soldiers_required, value) \
                   VALUES ('gate watch', 'north gate', 32.08, -34.78, 1000, 2000, 1, 'captain', 'gun', 2, 3.5)";
        let cmd = parse_sql(sql).unwrap();
        match cmd {
            Command::InsertDuty { draft } => {
                assert_eq!(draft.name, "gate watch");
                assert_eq!(draft.location.lat, 32.08);
                assert_eq!(draft.location.lon, -34.78);
                assert_eq!(draft.window, Span { start: 1000, end: 2000 });
                assert_eq!(draft.min_rank, Some(Rank::Corporal));
                assert_eq!(draft.max_rank, Some(Rank::Captain));
                assert!(draft.constraints.contains("gun"));
                assert_eq!(draft.soldiers_required, 2);
                assert_eq!(draft.value, 3.5);
            }
            _ => panic!("expected InsertDuty, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_duty_null_bounds() {
        let sql = "INSERT INTO duties (name, description, lat, lon, start, \"end\", min_rank, max_rank, constraints, soldiers_required, value) \
                   VALUES ('gate watch', '', 0, 0, 1000, 2000, NULL, NULL, NULL, 1, 1)";
        let cmd = parse_sql(sql).unwrap();
        match cmd {
            Command::InsertDuty { draft } => {
                assert_eq!(draft.min_rank, None);
                assert_eq!(draft.max_rank, None);
                assert!(draft.constraints.is_empty());
            }
            _ => panic!("expected InsertDuty, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_duty_wrong_arity() {
        let sql = "INSERT INTO duties (name) VALUES ('gate watch')";
        assert!(matches!(
            parse_sql(sql),
            Err(SqlError::WrongArity("duties", 11, 1))
        ));
    }

    #[test]
    fn parse_update_soldier() {
        let sql = "UPDATE soldiers SET name = 'Noa Bar', rank = 'major' WHERE id = '7654321'";
        let cmd = parse_sql(sql).unwrap();
        match cmd {
            Command::UpdateSoldier { id, patch } => {
                assert_eq!(id.as_str(), "7654321");
                assert_eq!(patch.name.as_deref(), Some("Noa Bar"));
                assert_eq!(patch.rank, Some(Rank::Major));
                assert_eq!(patch.limitations, None);
            }
            _ => panic!("expected UpdateSoldier, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_duty_window() {
        let sql = format!("UPDATE duties SET start = 5000, \"end\" = 9000 WHERE id = '{DUTY_ID}'");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::UpdateDuty { id, patch } => {
                assert_eq!(id.to_string(), DUTY_ID);
                assert_eq!(patch.start, Some(5000));
                assert_eq!(patch.end, Some(9000));
                assert_eq!(patch.location, None);
            }
            _ => panic!("expected UpdateDuty, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_duty_status_rejected() {
        let sql = format!("UPDATE duties SET status = 'scheduled' WHERE id = '{DUTY_ID}'");
        assert!(matches!(
            parse_sql(&sql),
            Err(SqlError::UnknownColumn(_))
        ));
    }

    #[test]
    fn parse_update_duty_lat_without_lon_rejected() {
        let sql = format!("UPDATE duties SET lat = 31.5 WHERE id = '{DUTY_ID}'");
        assert!(parse_sql(&sql).is_err());
    }

    #[test]
    fn parse_update_without_id_rejected() {
        let sql = "UPDATE soldiers SET name = 'Noa Bar'";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingFilter("id"))));
    }

    #[test]
    fn parse_delete_soldier() {
        let sql = "DELETE FROM soldiers WHERE id = '1234567'";
        let cmd = parse_sql(sql).unwrap();
        match cmd {
            Command::DeleteSoldier { id } => assert_eq!(id.as_str(), "1234567"),
            _ => panic!("expected DeleteSoldier, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_delete_duty() {
        let sql = format!("DELETE FROM duties WHERE id = '{DUTY_ID}'");
        let cmd = parse_sql(&sql).unwrap();
        assert!(matches!(cmd, Command::DeleteDuty { .. }));
    }

    #[test]
    fn parse_select_soldiers_all() {
        let cmd = parse_sql("SELECT * FROM soldiers").unwrap();
        assert_eq!(
            cmd,
            Command::SelectSoldiers {
                id: None,
                name: None,
                rank: None,
                limitations: vec![],
            }
        );
    }

    #[test]
    fn parse_select_soldiers_by_rank_and_limitations() {
        let cmd =
            parse_sql("SELECT * FROM soldiers WHERE rank = 'sergeant' AND limitations = 'GUN,night'")
                .unwrap();
        match cmd {
            Command::SelectSoldiers { rank, limitations, .. } => {
                assert_eq!(rank, Some(Rank::Sergeant));
                // filter tags are lower-cased to match stored limitations
                assert_eq!(limitations, vec!["gun", "night"]);
            }
            _ => panic!("expected SelectSoldiers, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_add_limitations_verb() {
        let cmd = parse_sql("ADD LIMITATIONS '1234567' 'gun,night driving'").unwrap();
        match cmd {
            Command::AddLimitations { id, limitations } => {
                assert_eq!(id.as_str(), "1234567");
                assert_eq!(limitations, vec!["gun", "night driving"]);
            }
            _ => panic!("expected AddLimitations, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_add_constraints_verb() {
        let sql = format!("ADD CONSTRAINTS '{DUTY_ID}' 'heights'");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::AddConstraints { id, constraints } => {
                assert_eq!(id.to_string(), DUTY_ID);
                assert_eq!(constraints, vec!["heights"]);
            }
            _ => panic!("expected AddConstraints, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_duties_by_status() {
        let cmd = parse_sql("SELECT * FROM duties WHERE status = 'unscheduled'").unwrap();
        match cmd {
            Command::SelectDuties { id, status, .. } => {
                assert_eq!(id, None);
                assert_eq!(status, Some(DutyStatus::Unscheduled));
            }
            _ => panic!("expected SelectDuties, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_justice_board_by_id() {
        let cmd = parse_sql("SELECT * FROM justice_board WHERE id = '1234567'").unwrap();
        match cmd {
            Command::SelectJusticeBoard { soldier_id } => {
                assert_eq!(soldier_id.unwrap().as_str(), "1234567");
            }
            _ => panic!("expected SelectJusticeBoard, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_schedule_duty_verb() {
        let sql = format!("SCHEDULE DUTY '{DUTY_ID}'");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::ScheduleDuty { id } => assert_eq!(id.to_string(), DUTY_ID),
            _ => panic!("expected ScheduleDuty, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_cancel_duty_verb() {
        let sql = format!("cancel duty '{DUTY_ID}';");
        let cmd = parse_sql(&sql).unwrap();
        assert!(matches!(cmd, Command::CancelDuty { .. }));
    }

    #[test]
    fn parse_schedule_all_verb() {
        assert_eq!(parse_sql("SCHEDULE ALL").unwrap(), Command::ScheduleAll);
        assert_eq!(parse_sql("schedule all;").unwrap(), Command::ScheduleAll);
    }

    #[test]
    fn parse_listen() {
        let sql = format!("LISTEN duty_{DUTY_ID}");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::Listen { channel } => {
                assert_eq!(channel, format!("duty_{DUTY_ID}"));
            }
            _ => panic!("expected Listen, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_unknown_table_errors() {
        let sql = "INSERT INTO foobar (id) VALUES ('1234567')";
        assert!(matches!(parse_sql(sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(parse_sql("").is_err());
    }
}
