mod admin;
mod auth;
mod table;

pub use self::admin::{
    Admin, AdminAction, AdminError, AdminOperation, AdminReply, AdminReplyResult, AdminResponse,
    AdminResult,
};
pub use self::auth::{Auth, AuthError, AuthOperation, AuthOutput, AuthResult, AuthSession};
pub use self::table::{
    ChangeKind, ChangeNotice, Direction, Filter, FilterOp, Order, Query, Table, TableError,
    TableName, TableOperation, TableOutput, TableResult,
};

pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub table: Table<Event>,
    pub auth: Auth<Event>,
    pub admin: Admin<Event>,
}
