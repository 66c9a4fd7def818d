mod common;

use assert_matches::assert_matches;
use serde_json::json;

use common::*;
use opsdash::capabilities::{
    AuthError, AuthOperation, AuthOutput, AuthSession, TableError, TableName, TableOperation,
    TableOutput,
};
use opsdash::model::{Panel, Secret, UserId};
use opsdash::{Config, Event, Model, ToastKind};

fn signed_in() -> AuthOutput {
    AuthOutput::Session(Some(AuthSession {
        user_id: UserId::new(ME),
        email: ME_EMAIL.into(),
    }))
}

#[test]
fn sign_in_starts_the_session() {
    let app = Tester::default();
    let mut model = Model::default();

    let effects = app
        .update(
            Event::SignInRequested {
                email: "  me@example.com ".into(),
                password: Secret::new("Runway27L"),
            },
            &mut model,
        )
        .effects;
    let mut request = auth_requests(effects).remove(0);
    assert_eq!(
        request.operation,
        AuthOperation::SignIn {
            email: ME_EMAIL.into(),
            password: Secret::new("Runway27L"),
        }
    );
    assert!(model.auth_pending);

    let effects = resolve_auth(&app, &mut model, &mut request, Ok(signed_in()));
    assert!(!model.auth_pending);
    assert_eq!(model.session.as_ref().map(|s| s.user_id.as_str()), Some(ME));
    assert_eq!(
        model.active_toast.as_ref().map(|t| t.message.as_str()),
        Some("Logged in successfully!")
    );
    let requests = table_requests(effects);
    assert!(requests.iter().any(|r| is_select(r, TableName::UserRoles)));
    assert!(requests.iter().any(|r| is_subscribe(r, TableName::Announcements)));
    assert!(requests.iter().any(|r| is_select(r, TableName::Flights)));
}

#[test]
fn empty_credentials_never_reach_the_auth_service() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(
        Event::SignInRequested {
            email: "   ".into(),
            password: Secret::new("Runway27L"),
        },
        &mut model,
    );

    assert_eq!(remote_call_count(&update.effects), 0);
    assert!(!model.auth_pending);
    let error = model.active_error.as_ref().expect("validation surfaced");
    assert_eq!(error.code(), "VALIDATION_ERROR");
}

#[test]
fn wrong_password_keeps_the_user_signed_out() {
    let app = Tester::default();
    let mut model = Model::default();

    let effects = app
        .update(
            Event::SignInRequested {
                email: ME_EMAIL.into(),
                password: Secret::new("Runway27R"),
            },
            &mut model,
        )
        .effects;
    let mut request = auth_requests(effects).remove(0);
    let effects = resolve_auth(
        &app,
        &mut model,
        &mut request,
        Err(AuthError::InvalidCredentials),
    );

    assert_eq!(remote_call_count(&effects), 0);
    assert!(model.session.is_none());
    assert!(!model.auth_pending);
    assert_eq!(
        model.active_error.as_ref().map(|e| e.user_facing_message()),
        Some("Invalid email or password".to_string())
    );
}

#[test]
fn failed_sign_out_still_clears_local_state() {
    let app = Tester::default();
    let mut model = Model::default();
    start_session(&app, &mut model, true);

    let effects = app.update(Event::SignOutRequested, &mut model).effects;
    let mut request = auth_requests(effects).remove(0);
    assert_eq!(request.operation, AuthOperation::SignOut);

    let effects = resolve_auth(
        &app,
        &mut model,
        &mut request,
        Err(AuthError::Transport {
            message: "offline".into(),
        }),
    );

    assert!(model.session.is_none());
    assert!(model.flights.is_empty());
    let closed = table_requests(effects)
        .into_iter()
        .filter(|r| matches!(r.operation, TableOperation::Unsubscribe { .. }))
        .count();
    assert_eq!(closed, 3);
    let toast = model.active_toast.as_ref().expect("toast shown");
    assert_eq!(toast.message, "Signed out");
    assert_eq!(toast.kind, ToastKind::Info);
}

#[test]
fn app_start_restores_a_stored_session() {
    let app = Tester::default();
    let mut model = Model::default();

    let effects = app
        .update(
            Event::AppStarted {
                config: Config::default(),
            },
            &mut model,
        )
        .effects;
    let mut request = auth_requests(effects).remove(0);
    assert_eq!(request.operation, AuthOperation::GetSession);

    let effects = resolve_auth(&app, &mut model, &mut request, Ok(signed_in()));
    assert_eq!(model.session.as_ref().map(|s| s.email.as_str()), Some(ME_EMAIL));
    assert!(table_requests(effects)
        .iter()
        .any(|r| is_select(r, TableName::UserRoles)));
}

#[test]
fn app_start_without_stored_session_stays_signed_out() {
    let app = Tester::default();
    let mut model = Model::default();

    let effects = app
        .update(
            Event::AppStarted {
                config: Config::default(),
            },
            &mut model,
        )
        .effects;
    let mut request = auth_requests(effects).remove(0);
    let effects = resolve_auth(
        &app,
        &mut model,
        &mut request,
        Ok(AuthOutput::Session(None)),
    );

    assert!(model.session.is_none());
    assert_eq!(remote_call_count(&effects), 0);
}

#[test]
fn invalid_config_is_rejected_and_defaults_kept() {
    let app = Tester::default();
    let mut model = Model::default();

    let effects = app
        .update(
            Event::AppStarted {
                config: Config {
                    flight_window_limit: 0,
                    ..Config::default()
                },
            },
            &mut model,
        )
        .effects;

    assert_eq!(model.config, Config::default());
    assert_eq!(model.active_error.as_ref().map(|e| e.code()), Some("CONFIG_ERROR"));
    let requests = auth_requests(effects);
    assert_matches!(&requests[..], [r] if r.operation == AuthOperation::GetSession);
}

#[test]
fn failed_role_lookup_is_retried_on_refresh() {
    let app = Tester::default();
    let mut model = Model::default();

    let effects = app
        .update(
            Event::SessionStarted {
                user_id: UserId::new(ME),
                email: ME_EMAIL.into(),
            },
            &mut model,
        )
        .effects;
    let mut requests = table_requests(effects);
    let mut roles = take(&mut requests, |r| is_select(r, TableName::UserRoles));
    resolve_table(
        &app,
        &mut model,
        &mut roles,
        Err(TableError::Transport {
            message: "502".into(),
        }),
    );
    let session = model.session.as_ref().expect("session kept");
    assert!(!session.roles_loaded);
    assert!(!session.roles_pending);
    assert_eq!(model.active_error.as_ref().map(|e| e.code()), Some("FETCH_ERROR"));

    // Too soon for the periodic retry.
    let effects = app.update(Event::Tick, &mut model).effects;
    assert!(!table_requests(effects)
        .iter()
        .any(|r| is_select(r, TableName::UserRoles)));

    let effects = app
        .update(Event::RefreshRequested { panel: Panel::Users }, &mut model)
        .effects;
    let mut requests = table_requests(effects);
    assert_eq!(requests.len(), 1);
    let mut retry = take(&mut requests, |r| is_select(r, TableName::UserRoles));

    let effects = resolve_table(
        &app,
        &mut model,
        &mut retry,
        Ok(TableOutput::Rows(vec![json!({ "role": "admin" })])),
    );
    let session = model.session.as_ref().expect("session kept");
    assert!(session.roles_loaded);
    assert!(session.is_admin());
    let requests = table_requests(effects);
    assert!(requests.iter().any(|r| is_subscribe(r, TableName::Profiles)));
    assert!(requests.iter().any(|r| is_select(r, TableName::Profiles)));

    let effects = app.update(Event::Tick, &mut model).effects;
    assert!(!table_requests(effects)
        .iter()
        .any(|r| is_select(r, TableName::UserRoles)));
}
