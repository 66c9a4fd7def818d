mod common;

use assert_matches::assert_matches;
use serde_json::json;

use common::*;
use opsdash::capabilities::{
    Direction, FilterOp, TableError, TableName, TableOperation, TableOutput,
};
use opsdash::dialog::DialogState;
use opsdash::model::{FlightStatus, Panel, RecordId};
use opsdash::validation::FlightDraft;
use opsdash::{Event, Model};

fn draft() -> FlightDraft {
    FlightDraft {
        flight_number: "ok123".into(),
        departure_airport: "prg".into(),
        arrival_airport: "cdg".into(),
        departure_time: future(3).format("%Y-%m-%dT%H:%M").to_string(),
        arrival_time: future(5).format("%Y-%m-%dT%H:%M").to_string(),
        status: FlightStatus::Scheduled,
        gate: String::new(),
        aircraft_type: "A320".into(),
    }
}

fn with_flights(app: &Tester, model: &mut Model) {
    let mut requests = start_session(app, model, true);
    let mut select = take(&mut requests, |r| is_select(r, TableName::Flights));
    resolve_table(
        app,
        model,
        &mut select,
        Ok(TableOutput::Rows(vec![
            flight_row("f2", "BA0857", 6),
            flight_row("f1", "AA1234", 2),
        ])),
    );
}

#[test]
fn flight_list_query_covers_the_upcoming_window() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = start_session(&app, &mut model, true);
    let select = take(&mut requests, |r| is_select(r, TableName::Flights));

    let TableOperation::Select { query, .. } = &select.operation else {
        panic!("expected select");
    };
    assert_eq!(query.limit, Some(10));
    assert_eq!(query.filters.len(), 1);
    assert_eq!(query.filters[0].column, "departure_time");
    assert_eq!(query.filters[0].op, FilterOp::Gte);
    assert_eq!(
        query.order.as_ref().map(|o| o.direction),
        Some(Direction::Ascending)
    );
}

#[test]
fn flights_are_ordered_by_departure() {
    let app = Tester::default();
    let mut model = Model::default();
    with_flights(&app, &mut model);

    let numbers: Vec<_> = model
        .flights
        .items()
        .iter()
        .map(|f| f.flight_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["AA1234", "BA0857"]);
}

#[test]
fn arrival_not_after_departure_is_rejected_locally() {
    let app = Tester::default();
    let mut model = Model::default();
    with_flights(&app, &mut model);

    let mut bad = draft();
    bad.arrival_time = bad.departure_time.clone();
    let update = app.update(Event::CreateFlightRequested(bad), &mut model);

    assert_eq!(remote_call_count(&update.effects), 0);
    let error = model.active_error.as_ref().expect("validation error");
    assert_eq!(error.code(), "VALIDATION_ERROR");
    assert_eq!(
        error.user_facing_message(),
        "Arrival time must be after departure time"
    );
}

#[test]
fn created_flight_is_normalized_and_merged() {
    let app = Tester::default();
    let mut model = Model::default();
    with_flights(&app, &mut model);

    let effects = app
        .update(Event::CreateFlightRequested(draft()), &mut model)
        .effects;
    let mut insert = table_requests(effects).remove(0);
    let TableOperation::Insert { table, row } = &insert.operation else {
        panic!("expected insert");
    };
    assert_eq!(*table, TableName::Flights);
    assert_eq!(row["flight_number"], "OK123");
    assert_eq!(row["departure_airport"], "PRG");
    assert_eq!(row["gate"], json!(null));
    let mut stored = row.clone();
    stored["id"] = json!("f3");

    resolve_table(&app, &mut model, &mut insert, Ok(TableOutput::Row(Some(stored))));

    let numbers: Vec<_> = model
        .flights
        .items()
        .iter()
        .map(|f| f.flight_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["AA1234", "OK123", "BA0857"]);
    assert!(!model.flight_form.open);
}

#[test]
fn cancelled_delete_leaves_flight_in_place() {
    let app = Tester::default();
    let mut model = Model::default();
    with_flights(&app, &mut model);

    let update = app.update(
        Event::DeleteRequested {
            panel: Panel::Flights,
            id: RecordId::new("f1"),
        },
        &mut model,
    );
    assert_eq!(remote_call_count(&update.effects), 0);
    assert_matches!(
        model.flight_dialog.state(),
        DialogState::Confirming(action) if action.label() == "AA1234"
    );
    let view = app.view(&model);
    assert!(view.flights.dialog.open);
    assert!(view.flights.dialog.message.contains("AA1234"));

    let update = app.update(Event::DialogCancelled { panel: Panel::Flights }, &mut model);
    assert_eq!(remote_call_count(&update.effects), 0);
    assert_eq!(model.flight_dialog.state(), &DialogState::Idle);
    assert!(model.flights.contains("f1"));
}

#[test]
fn confirmed_delete_removes_flight() {
    let app = Tester::default();
    let mut model = Model::default();
    with_flights(&app, &mut model);

    app.update(
        Event::DeleteRequested {
            panel: Panel::Flights,
            id: RecordId::new("f1"),
        },
        &mut model,
    );
    let effects = app
        .update(Event::DialogConfirmed { panel: Panel::Flights }, &mut model)
        .effects;
    let mut delete = table_requests(effects).remove(0);
    assert_matches!(
        &delete.operation,
        TableOperation::Delete { table: TableName::Flights, filters } if filters[0].value == json!("f1")
    );
    assert!(model.flight_dialog.is_in_flight());

    // Controls are disabled while in flight.
    let update = app.update(
        Event::DeleteRequested {
            panel: Panel::Flights,
            id: RecordId::new("f2"),
        },
        &mut model,
    );
    assert_eq!(remote_call_count(&update.effects), 0);
    assert_eq!(model.active_error.as_ref().map(|e| e.code()), Some("INVALID_STATE"));

    resolve_table(&app, &mut model, &mut delete, Ok(TableOutput::Done));
    assert!(model.flight_dialog.is_idle());
    assert!(!model.flights.contains("f1"));
    assert!(model.flights.contains("f2"));
}

#[test]
fn failed_delete_keeps_flight_and_closes_dialog() {
    let app = Tester::default();
    let mut model = Model::default();
    with_flights(&app, &mut model);

    app.update(
        Event::DeleteRequested {
            panel: Panel::Flights,
            id: RecordId::new("f1"),
        },
        &mut model,
    );
    let effects = app
        .update(Event::DialogConfirmed { panel: Panel::Flights }, &mut model)
        .effects;
    let mut delete = table_requests(effects).remove(0);
    resolve_table(
        &app,
        &mut model,
        &mut delete,
        Err(TableError::Rejected {
            code: Some("23503".into()),
            message: "still referenced".into(),
        }),
    );

    assert!(model.flight_dialog.is_idle());
    assert!(model.flights.contains("f1"));
    assert_eq!(
        model.active_error.as_ref().map(|e| e.user_facing_message()),
        Some("Failed to delete flight".to_string())
    );
}
