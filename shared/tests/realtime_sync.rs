mod common;

use common::*;
use opsdash::capabilities::{
    ChangeKind, ChangeNotice, TableError, TableName, TableOperation, TableOutput,
};
use opsdash::{Event, Model};

fn change(table: TableName, kind: ChangeKind) -> TableOutput {
    TableOutput::Change(ChangeNotice {
        table,
        kind,
        record_id: None,
    })
}

fn flight_numbers(model: &Model) -> Vec<&str> {
    model
        .flights
        .items()
        .iter()
        .map(|f| f.flight_number.as_str())
        .collect()
}

#[test]
fn every_change_issues_exactly_one_reload() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = start_session(&app, &mut model, false);
    let mut feed = take(&mut requests, |r| is_subscribe(r, TableName::Flights));

    for kind in [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete] {
        let effects = resolve_table(&app, &mut model, &mut feed, Ok(change(TableName::Flights, kind)));
        let selects = table_requests(effects);
        assert_eq!(selects.len(), 1, "one reload per {kind:?}");
        assert!(is_select(&selects[0], TableName::Flights));
    }
}

#[test]
fn older_snapshot_never_overwrites_newer() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = start_session(&app, &mut model, false);
    let mut initial = take(&mut requests, |r| is_select(r, TableName::Flights));
    let mut feed = take(&mut requests, |r| is_subscribe(r, TableName::Flights));

    let effects = resolve_table(
        &app,
        &mut model,
        &mut feed,
        Ok(change(TableName::Flights, ChangeKind::Delete)),
    );
    let mut after_delete = table_requests(effects).remove(0);

    resolve_table(
        &app,
        &mut model,
        &mut after_delete,
        Ok(TableOutput::Rows(vec![flight_row("f1", "AA1234", 2)])),
    );
    assert_eq!(flight_numbers(&model), vec!["AA1234"]);

    // The initial load answers last and still carries the deleted flight.
    resolve_table(
        &app,
        &mut model,
        &mut initial,
        Ok(TableOutput::Rows(vec![
            flight_row("f1", "AA1234", 2),
            flight_row("f2", "BA0857", 4),
        ])),
    );
    assert_eq!(flight_numbers(&model), vec!["AA1234"]);
    assert!(!model.flights.is_loading());
}

#[test]
fn snapshot_drops_departed_flights() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = start_session(&app, &mut model, false);
    let mut select = take(&mut requests, |r| is_select(r, TableName::Flights));

    resolve_table(
        &app,
        &mut model,
        &mut select,
        Ok(TableOutput::Rows(vec![
            flight_row("gone", "OK001", -1),
            flight_row("f1", "AA1234", 1),
        ])),
    );
    assert_eq!(flight_numbers(&model), vec!["AA1234"]);
}

#[test]
fn session_end_closes_feeds_and_ignores_late_responses() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = start_session(&app, &mut model, true);
    let mut select = take(&mut requests, |r| is_select(r, TableName::Flights));
    let mut feed = take(&mut requests, |r| is_subscribe(r, TableName::Flights));

    let effects = app.update(Event::SessionEnded, &mut model).effects;
    let mut closed: Vec<_> = table_requests(effects)
        .into_iter()
        .filter_map(|r| match r.operation {
            TableOperation::Unsubscribe { table } => Some(table),
            _ => None,
        })
        .collect();
    closed.sort_by_key(|t| t.as_str());
    assert_eq!(
        closed,
        vec![TableName::Announcements, TableName::Flights, TableName::Profiles]
    );
    assert!(model.session.is_none());

    resolve_table(
        &app,
        &mut model,
        &mut select,
        Ok(TableOutput::Rows(vec![flight_row("f1", "AA1234", 2)])),
    );
    assert!(model.flights.is_empty());

    let effects = resolve_table(
        &app,
        &mut model,
        &mut feed,
        Ok(change(TableName::Flights, ChangeKind::Insert)),
    );
    assert_eq!(remote_call_count(&effects), 0);
}

#[test]
fn failed_feed_is_reopened_on_tick() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = start_session(&app, &mut model, false);
    let mut feed = take(&mut requests, |r| is_subscribe(r, TableName::Flights));

    resolve_table(&app, &mut model, &mut feed, Err(TableError::FeedClosed));
    assert!(!model.is_subscribed(opsdash::model::Panel::Flights));

    let effects = app.update(Event::Tick, &mut model).effects;
    let requests = table_requests(effects);
    assert!(requests.iter().any(|r| matches!(
        r.operation,
        TableOperation::Unsubscribe { table: TableName::Flights }
    )));
    assert!(requests.iter().any(|r| is_subscribe(r, TableName::Flights)));
    assert!(requests.iter().any(|r| is_select(r, TableName::Flights)));
    assert!(!requests.iter().any(|r| is_subscribe(r, TableName::Announcements)));
}

#[test]
fn failed_reload_keeps_the_list() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = start_session(&app, &mut model, false);
    let mut select = take(&mut requests, |r| is_select(r, TableName::Flights));
    let mut feed = take(&mut requests, |r| is_subscribe(r, TableName::Flights));
    resolve_table(
        &app,
        &mut model,
        &mut select,
        Ok(TableOutput::Rows(vec![flight_row("f1", "AA1234", 2)])),
    );

    let effects = resolve_table(
        &app,
        &mut model,
        &mut feed,
        Ok(change(TableName::Flights, ChangeKind::Update)),
    );
    let mut reload = table_requests(effects).remove(0);
    resolve_table(
        &app,
        &mut model,
        &mut reload,
        Err(TableError::Transport {
            message: "timeout".into(),
        }),
    );

    assert_eq!(flight_numbers(&model), vec!["AA1234"]);
    assert!(!model.flights.is_loading());
    let view = app.view(&model);
    let error = view.error.expect("load error surfaced");
    assert_eq!(error.error_code, "FETCH_ERROR");
    assert_eq!(error.message, "Failed to load flights. Please try again.");
    assert!(error.is_retryable);
}

#[test]
fn failed_load_is_not_retried_on_every_tick() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = start_session(&app, &mut model, false);
    let mut select = take(&mut requests, |r| is_select(r, TableName::Flights));
    resolve_table(
        &app,
        &mut model,
        &mut select,
        Err(TableError::Transport {
            message: "503".into(),
        }),
    );
    assert!(model.flights.is_empty());

    for _ in 0..3 {
        let effects = app.update(Event::Tick, &mut model).effects;
        let reloads = table_requests(effects)
            .iter()
            .filter(|r| is_select(r, TableName::Flights))
            .count();
        assert_eq!(reloads, 0);
    }
}
