use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Comparison operators supported in WHERE conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gte,
    ILike,
    In,
    IsNull,
    IsNotNull,
}

/// A typed bind parameter. Keeping the Rust type lets the driver send the
/// matching Postgres type (uuid, timestamptz) instead of text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: String,
    pub operator: FilterOp,
    pub data: Vec<SqlValue>,
}

/// WHERE tree. Top-level conditions of a filter are joined with AND.
#[derive(Debug, Clone)]
pub enum Condition {
    Field(FilterWhereInfo),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    fn field(column: &str, operator: FilterOp, data: Vec<SqlValue>) -> Self {
        Condition::Field(FilterWhereInfo {
            column: column.to_string(),
            operator,
            data,
        })
    }

    pub fn eq(column: &str, value: impl Into<SqlValue>) -> Self {
        Self::field(column, FilterOp::Eq, vec![value.into()])
    }

    pub fn ne(column: &str, value: impl Into<SqlValue>) -> Self {
        Self::field(column, FilterOp::Ne, vec![value.into()])
    }

    pub fn gte(column: &str, value: impl Into<SqlValue>) -> Self {
        Self::field(column, FilterOp::Gte, vec![value.into()])
    }

    pub fn ilike(column: &str, pattern: impl Into<SqlValue>) -> Self {
        Self::field(column, FilterOp::ILike, vec![pattern.into()])
    }

    pub fn is_in<V: Into<SqlValue>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::field(column, FilterOp::In, values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(column: &str) -> Self {
        Self::field(column, FilterOp::IsNull, vec![])
    }

    pub fn is_not_null(column: &str) -> Self {
        Self::field(column, FilterOp::IsNotNull, vec![])
    }

    /// Case-insensitive substring match over any of `columns`.
    pub fn search(columns: &[&str], term: &str) -> Self {
        let pattern = format!("%{}%", escape_like(term));
        Condition::Or(columns.iter().map(|c| Self::ilike(c, pattern.clone())).collect())
    }
}

/// Escape LIKE wildcards so user input matches literally
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct FilterData {
    pub select: Option<Vec<String>>,
    pub conditions: Vec<Condition>,
    pub order: Vec<FilterOrderInfo>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FilterData {
    pub fn where_all(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

impl FilterOrderInfo {
    pub fn new(column: &str, sort: SortDirection) -> Self {
        Self {
            column: column.to_string(),
            sort,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlValue>,
}
