use crux_core::capability::{CapabilityContext, Operation};
use crux_core::macros::Capability;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::{AppError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Announcements,
    Flights,
    Profiles,
    UserRoles,
}

impl TableName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Announcements => "announcements",
            Self::Flights => "flights",
            Self::Profiles => "profiles",
            Self::UserRoles => "user_roles",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Gte,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// Column projection, filters, ordering and row limit of a select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Default for Query {
    fn default() -> Self {
        Self::all()
    }
}

impl Query {
    #[must_use]
    pub fn all() -> Self {
        Self::columns("*")
    }

    pub fn columns(columns: impl Into<String>) -> Self {
        Self {
            columns: columns.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableOperation {
    Select { table: TableName, query: Query },
    Insert { table: TableName, row: Value },
    Update { table: TableName, filters: Vec<Filter>, fields: Value },
    Delete { table: TableName, filters: Vec<Filter> },
    Subscribe { table: TableName },
    Unsubscribe { table: TableName },
}

impl TableOperation {
    #[must_use]
    pub const fn table(&self) -> TableName {
        match self {
            Self::Select { table, .. }
            | Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::Delete { table, .. }
            | Self::Subscribe { table }
            | Self::Unsubscribe { table } => *table,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub table: TableName,
    pub kind: ChangeKind,
    pub record_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableOutput {
    /// Result set of a select.
    Rows(Vec<Value>),
    /// Representation of an inserted or updated row, when the backend
    /// returns one.
    Row(Option<Value>),
    Done,
    /// One push from a live feed. Carries no row data.
    Change(ChangeNotice),
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TableError {
    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("rejected by backend: {message}")]
    Rejected { code: Option<String>, message: String },

    #[error("not authenticated")]
    Unauthorized,

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("feed closed")]
    FeedClosed,
}

pub type TableResult = Result<TableOutput, TableError>;

impl TableError {
    /// Session and policy failures keep their own kind; everything else
    /// becomes `kind` with the given one-line message.
    #[must_use]
    pub fn into_app_error(self, kind: ErrorKind, message: impl Into<String>) -> AppError {
        let error = match &self {
            Self::Unauthorized => AppError::new(
                ErrorKind::Authentication,
                "Your session has expired. Please sign in again.",
            ),
            Self::Forbidden { .. } => AppError::new(ErrorKind::Authorization, message),
            _ => AppError::new(kind, message),
        };
        error.with_internal(self.to_string())
    }
}

impl Operation for TableOperation {
    type Output = TableResult;
}

/// Access to the remote relational tables and their change feeds.
#[derive(Capability)]
pub struct Table<Ev> {
    context: CapabilityContext<TableOperation, Ev>,
}

impl<Ev> Table<Ev> {
    #[must_use]
    pub fn new(context: CapabilityContext<TableOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Table<Ev>
where
    Ev: Send + 'static,
{
    pub fn select<F>(&self, table: TableName, query: Query, make_event: F)
    where
        F: FnOnce(TableResult) -> Ev + Send + 'static,
    {
        self.request(TableOperation::Select { table, query }, make_event);
    }

    pub fn insert<F>(&self, table: TableName, row: Value, make_event: F)
    where
        F: FnOnce(TableResult) -> Ev + Send + 'static,
    {
        self.request(TableOperation::Insert { table, row }, make_event);
    }

    pub fn update<F>(&self, table: TableName, filters: Vec<Filter>, fields: Value, make_event: F)
    where
        F: FnOnce(TableResult) -> Ev + Send + 'static,
    {
        self.request(
            TableOperation::Update {
                table,
                filters,
                fields,
            },
            make_event,
        );
    }

    pub fn delete<F>(&self, table: TableName, filters: Vec<Filter>, make_event: F)
    where
        F: FnOnce(TableResult) -> Ev + Send + 'static,
    {
        self.request(TableOperation::Delete { table, filters }, make_event);
    }

    /// Opens the change feed of `table`. Each push becomes one event.
    pub fn subscribe<F>(&self, table: TableName, make_event: F)
    where
        F: Fn(TableResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let mut feed = ctx.stream_from_shell(TableOperation::Subscribe { table });
            while let Some(notice) = feed.next().await {
                ctx.update_app(make_event(notice));
            }
        });
    }

    pub fn unsubscribe(&self, table: TableName) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(TableOperation::Unsubscribe { table }).await;
        });
    }

    fn request<F>(&self, operation: TableOperation, make_event: F)
    where
        F: FnOnce(TableResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(result));
        });
    }
}
