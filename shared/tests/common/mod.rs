#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use crux_core::testing::AppTester;
use crux_core::Request;
use serde_json::{json, Value};

use opsdash::capabilities::{
    AdminOperation, AdminReply, AdminReplyResult, AuthOperation, AuthResult, TableName,
    TableOperation, TableOutput, TableResult,
};
use opsdash::model::UserId;
use opsdash::{App, Effect, Event, Model};

pub const ME: &str = "me";
pub const ME_EMAIL: &str = "me@example.com";

pub type Tester = AppTester<App, Effect>;

pub fn table_requests(effects: Vec<Effect>) -> Vec<Request<TableOperation>> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Table(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn admin_requests(effects: Vec<Effect>) -> Vec<Request<AdminOperation>> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Admin(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn auth_requests(effects: Vec<Effect>) -> Vec<Request<AuthOperation>> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Auth(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn remote_call_count(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|effect| matches!(effect, Effect::Table(_) | Effect::Admin(_) | Effect::Auth(_)))
        .count()
}

pub fn is_select(request: &Request<TableOperation>, table: TableName) -> bool {
    matches!(&request.operation, TableOperation::Select { table: t, .. } if *t == table)
}

pub fn is_subscribe(request: &Request<TableOperation>, table: TableName) -> bool {
    matches!(&request.operation, TableOperation::Subscribe { table: t } if *t == table)
}

/// Removes the first request matching `pred`.
pub fn take(
    requests: &mut Vec<Request<TableOperation>>,
    pred: impl Fn(&Request<TableOperation>) -> bool,
) -> Request<TableOperation> {
    let pos = requests
        .iter()
        .position(pred)
        .expect("expected request was not emitted");
    requests.remove(pos)
}

/// Resolves a table request and feeds the resulting events back in.
pub fn resolve_table(
    app: &Tester,
    model: &mut Model,
    request: &mut Request<TableOperation>,
    output: TableResult,
) -> Vec<Effect> {
    let update = app.resolve(request, output).expect("table request resolves");
    let mut effects = update.effects;
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

pub fn resolve_admin(
    app: &Tester,
    model: &mut Model,
    request: &mut Request<AdminOperation>,
    output: AdminReplyResult,
) -> Vec<Effect> {
    let update = app.resolve(request, output).expect("admin request resolves");
    let mut effects = update.effects;
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

pub fn resolve_auth(
    app: &Tester,
    model: &mut Model,
    request: &mut Request<AuthOperation>,
    output: AuthResult,
) -> Vec<Effect> {
    let update = app.resolve(request, output).expect("auth request resolves");
    let mut effects = update.effects;
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

/// Signs in as `me` and resolves the role lookup. Returns the pending
/// feed and list requests.
pub fn start_session(app: &Tester, model: &mut Model, admin: bool) -> Vec<Request<TableOperation>> {
    let effects = app
        .update(
            Event::SessionStarted {
                user_id: UserId::new(ME),
                email: ME_EMAIL.into(),
            },
            model,
        )
        .effects;
    let mut requests = table_requests(effects);
    let mut roles = take(&mut requests, |r| is_select(r, TableName::UserRoles));
    let rows = if admin {
        vec![json!({ "role": "admin" })]
    } else {
        vec![json!({ "role": "user" })]
    };
    let more = resolve_table(app, model, &mut roles, Ok(TableOutput::Rows(rows)));
    requests.extend(table_requests(more));
    requests
}

/// A 200 reply from the admin endpoint.
pub fn admin_ok(body: Value) -> AdminReplyResult {
    Ok(AdminReply::new(200, body.to_string()))
}

pub fn admin_status(status: u16, error: &str) -> AdminReplyResult {
    Ok(AdminReply::new(status, json!({ "error": error }).to_string()))
}

pub fn future(hours: i64) -> DateTime<Utc> {
    Utc::now() + Duration::hours(hours)
}

pub fn flight_row(id: &str, number: &str, departs_in_hours: i64) -> Value {
    json!({
        "id": id,
        "flight_number": number,
        "departure_airport": "PRG",
        "arrival_airport": "LHR",
        "departure_time": future(departs_in_hours).to_rfc3339(),
        "arrival_time": future(departs_in_hours + 2).to_rfc3339(),
        "status": "scheduled",
        "gate": "B12",
        "aircraft_type": null
    })
}

pub fn announcement_row(id: &str, title: &str, minutes_ago: i64) -> Value {
    json!({
        "id": id,
        "title": title,
        "content": "Details",
        "priority": "normal",
        "created_at": (Utc::now() - Duration::minutes(minutes_ago)).to_rfc3339(),
        "created_by": ME,
        "read": false
    })
}

pub fn profile_row(id: &str, email: &str, admin: bool) -> Value {
    let roles = if admin {
        json!([{ "role": "admin" }])
    } else {
        json!([])
    };
    json!({
        "id": id,
        "email": email,
        "full_name": null,
        "created_at": "2026-01-01T00:00:00Z",
        "user_roles": roles
    })
}
