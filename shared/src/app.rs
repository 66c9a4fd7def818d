use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::capabilities::{
    AdminAction, AdminError, AdminOperation, AuthOutput, Capabilities, Direction, Filter, Query,
    TableName, TableOutput,
};
use crate::dialog::{check_self_action, DialogController, PendingAction};
use crate::event::Event;
use crate::model::{
    roles_from_labels, Highlight, Model, Panel, RecordId, Role, Session, UserId,
};
use crate::sync::{decode_rows, ListSync, LoadOutcome, SyncedRecord};
use crate::validation::validate_password;
use crate::view::{self, capitalize, ViewModel};
use crate::{AppError, ErrorKind, ToastKind};

#[derive(Default)]
pub struct App;

impl App {
    // --- Session ---

    fn start_session(
        model: &mut Model,
        caps: &Capabilities,
        user_id: UserId,
        email: String,
        now: DateTime<Utc>,
    ) {
        if model
            .session
            .as_ref()
            .is_some_and(|s| s.user_id == user_id)
        {
            debug!(user_id = %user_id, "Session already active");
            return;
        }
        if model.session.is_some() {
            Self::end_session(model, caps);
        }

        info!(user_id = %user_id, "Session started");
        model.session = Some(Session::new(user_id, email));
        Self::request_roles(model, caps, now);

        for panel in [Panel::Announcements, Panel::Flights] {
            Self::subscribe(panel, model, caps);
            Self::load(panel, model, caps, now);
        }
    }

    fn request_roles(model: &mut Model, caps: &Capabilities, now: DateTime<Utc>) {
        let Some(session) = model.session.as_mut() else {
            return;
        };
        session.roles_pending = true;
        session.roles_requested_at = Some(now);
        let user_id = session.user_id.clone();
        debug!(user_id = %user_id, "Looking up roles");

        let query = Query::columns("role").filter(Filter::eq("user_id", user_id.as_str()));
        caps.table.select(TableName::UserRoles, query, move |result| {
            Event::RolesLoaded {
                user_id,
                result: Box::new(result),
            }
        });
    }

    fn end_session(model: &mut Model, caps: &Capabilities) {
        for panel in Panel::ALL {
            if model.is_subscribed(panel) {
                debug!(table = %panel.table(), "Closing change feed");
                caps.table.unsubscribe(panel.table());
            }
        }
        if let Some(session) = &model.session {
            info!(user_id = %session.user_id, "Session ended");
        }
        model.reset_session_state();
    }

    /// Yields the acting admin, or surfaces why the action is refused.
    fn require_admin(model: &mut Model, now: DateTime<Utc>) -> Option<UserId> {
        let acting = model
            .session
            .as_ref()
            .map(|s| (s.user_id.clone(), s.is_admin()));
        match acting {
            Some((user_id, true)) => Some(user_id),
            Some((user_id, false)) => {
                warn!(user_id = %user_id, "Admin action refused");
                model.report(
                    AppError::new(ErrorKind::Authorization, "admin role required"),
                    now,
                );
                None
            }
            None => {
                model.report(
                    AppError::new(ErrorKind::Authentication, "Please sign in first"),
                    now,
                );
                None
            }
        }
    }

    fn visible_panels(model: &Model) -> Vec<Panel> {
        let is_admin = model.is_admin();
        Panel::ALL
            .into_iter()
            .filter(|panel| !panel.requires_admin() || is_admin)
            .collect()
    }

    // --- List sync ---

    fn subscribe(panel: Panel, model: &mut Model, caps: &Capabilities) {
        if model.is_subscribed(panel) {
            return;
        }
        debug!(table = %panel.table(), "Opening change feed");
        model.set_subscribed(panel, true);
        caps.table.subscribe(panel.table(), move |notice| Event::RemoteChanged {
            panel,
            notice: Box::new(notice),
        });
    }

    fn load(panel: Panel, model: &mut Model, caps: &Capabilities, now: DateTime<Utc>) {
        if model.session.is_none() {
            return;
        }
        let generation = model.begin_load(panel);
        let query = match panel {
            Panel::Announcements => Query::all().order_by("created_at", Direction::Descending),
            Panel::Flights => Query::all()
                .filter(Filter::gte("departure_time", now.to_rfc3339()))
                .order_by("departure_time", Direction::Ascending)
                .limit(model.config.flight_window_limit),
            Panel::Users => Query::columns("*, user_roles(role)")
                .order_by("created_at", Direction::Descending),
        };
        debug!(table = %panel.table(), generation, "Loading list");
        caps.table.select(panel.table(), query, move |result| Event::ListLoaded {
            panel,
            generation,
            result: Box::new(result),
        });
    }

    fn apply_snapshot<T>(
        list: &mut ListSync<T>,
        table: TableName,
        generation: u64,
        rows: Vec<Value>,
        now: DateTime<Utc>,
    ) -> LoadOutcome
    where
        T: SyncedRecord + DeserializeOwned,
    {
        let (decoded, skipped) = decode_rows::<T>(table.as_str(), rows);
        if skipped > 0 {
            warn!(table = %table, skipped, "Snapshot contained undecodable rows");
        }
        list.apply_load(generation, decoded, now)
    }

    /// Merges the row returned by an insert. `None` when there was nothing
    /// usable to merge or the row falls outside the list window.
    fn merge_inserted<T>(
        list: &mut ListSync<T>,
        table: TableName,
        row: Value,
        now: DateTime<Utc>,
    ) -> Option<RecordId>
    where
        T: SyncedRecord + DeserializeOwned,
    {
        match serde_json::from_value::<T>(row) {
            Ok(item) => {
                let id = RecordId::new(item.record_id());
                list.merge(item, now).then_some(id)
            }
            Err(e) => {
                error!(table = %table, error = %e, "Inserted row could not be decoded");
                None
            }
        }
    }

    // --- Mutations ---

    fn send_insert<R: Serialize>(
        panel: Panel,
        row: &R,
        model: &mut Model,
        caps: &Capabilities,
        now: DateTime<Utc>,
    ) -> bool {
        match serde_json::to_value(row) {
            Ok(value) => {
                debug!(table = %panel.table(), "Inserting row");
                caps.table.insert(panel.table(), value, move |result| Event::RecordInserted {
                    panel,
                    result: Box::new(result),
                });
                true
            }
            Err(e) => {
                error!(table = %panel.table(), error = %e, "Row could not be encoded");
                model.report(
                    AppError::new(ErrorKind::Unknown, "row encoding failed").with_internal(e.to_string()),
                    now,
                );
                false
            }
        }
    }

    fn send_admin(operation: AdminOperation, model: &mut Model, caps: &Capabilities) {
        let action = operation.action();
        let user_id = operation.target().cloned();
        debug!(action = action.as_str(), "Calling admin endpoint");
        if action != AdminAction::Delete {
            model.admin_request_pending = true;
        }
        caps.admin.execute(operation, move |result| Event::AdminCompleted {
            action,
            user_id,
            result: Box::new(result),
        });
    }

    fn dialog_field(model: &mut Model, panel: Panel) -> (&Option<Session>, &mut DialogController) {
        let dialog = match panel {
            Panel::Announcements => &mut model.announcement_dialog,
            Panel::Flights => &mut model.flight_dialog,
            Panel::Users => &mut model.user_dialog,
        };
        (&model.session, dialog)
    }

    /// Runs the self-protection guard first, so a self action is refused
    /// with the same error whatever the caller's role.
    fn open_dialog(
        panel: Panel,
        action: PendingAction,
        known: bool,
        model: &mut Model,
        now: DateTime<Utc>,
    ) {
        let Some(session) = &model.session else {
            return;
        };
        if let Err(e) = check_self_action(&action, session) {
            warn!(target_id = action.target(), error = %e, "Self action refused");
            model.report(e.into(), now);
            return;
        }
        if Self::require_admin(model, now).is_none() {
            return;
        }
        if !known {
            warn!(target_id = action.target(), table = %panel.table(), "Action on unknown record");
            return;
        }
        let (session, dialog) = Self::dialog_field(model, panel);
        let Some(session) = session else {
            return;
        };
        if let Err(e) = dialog.request(action, session) {
            model.report(e.into(), now);
        }
    }

    fn execute(action: PendingAction, caps: &Capabilities, model: &mut Model) {
        match action {
            PendingAction::Delete {
                panel: Panel::Users,
                id,
                ..
            } => {
                let user_id = UserId::new(id.as_str());
                Self::send_admin(AdminOperation::Delete { user_id }, model, caps);
            }
            PendingAction::Delete { panel, id, .. } => {
                debug!(table = %panel.table(), id = %id, "Deleting row");
                let filters = vec![Filter::eq("id", id.as_str())];
                caps.table.delete(panel.table(), filters, move |result| Event::RecordDeleted {
                    panel,
                    id,
                    result: Box::new(result),
                });
            }
            PendingAction::SetAdmin {
                user_id,
                grant: true,
                ..
            } => {
                debug!(user_id = %user_id, "Granting admin role");
                let row = json!({ "user_id": user_id.as_str(), "role": Role::Admin.as_str() });
                caps.table.insert(TableName::UserRoles, row, move |result| {
                    Event::AdminRoleChanged {
                        user_id,
                        grant: true,
                        result: Box::new(result),
                    }
                });
            }
            PendingAction::SetAdmin {
                user_id,
                grant: false,
                ..
            } => {
                debug!(user_id = %user_id, "Revoking admin role");
                let filters = vec![
                    Filter::eq("user_id", user_id.as_str()),
                    Filter::eq("role", Role::Admin.as_str()),
                ];
                caps.table.delete(TableName::UserRoles, filters, move |result| {
                    Event::AdminRoleChanged {
                        user_id,
                        grant: false,
                        result: Box::new(result),
                    }
                });
            }
        }
    }

    fn complete_dialog(model: &mut Model, panel: Panel) {
        if let Err(e) = model.dialog_mut(panel).complete() {
            debug!(table = %panel.table(), error = %e, "Response without pending dialog");
        }
    }

    fn handle_admin_completed(
        action: AdminAction,
        user_id: Option<UserId>,
        result: Result<(), AdminError>,
        model: &mut Model,
        caps: &Capabilities,
        now: DateTime<Utc>,
    ) {
        if action == AdminAction::Delete {
            Self::complete_dialog(model, Panel::Users);
        } else {
            model.admin_request_pending = false;
        }

        match result {
            Ok(()) => {
                info!(action = action.as_str(), "Admin action succeeded");
                let message = match action {
                    AdminAction::Create => {
                        model.user_form.submit_succeeded();
                        "User created successfully!"
                    }
                    AdminAction::Update => "User updated successfully",
                    AdminAction::Delete => {
                        if let Some(id) = &user_id {
                            model.users.remove(id.as_str());
                        }
                        "User deleted successfully"
                    }
                    AdminAction::ResetPassword => "Password reset successfully",
                };
                model.show_toast(message, ToastKind::Success, now);
                if matches!(action, AdminAction::Create | AdminAction::Update) {
                    Self::load(Panel::Users, model, caps, now);
                }
            }
            Err(e) => {
                warn!(action = action.as_str(), error = %e, "Admin action failed");
                if action == AdminAction::Create {
                    model.user_form.submit_failed();
                }
                model.report(e.into(), now);
            }
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let now = crate::now();
        debug!(event = event.name(), "Handling event");

        match event {
            Event::AppStarted { config } => {
                match config.validate() {
                    Ok(()) => model.apply_config(config),
                    Err(e) => {
                        warn!(error = %e, "Rejected configuration, keeping defaults");
                        model.report(e.into(), now);
                    }
                }
                caps.auth.get_session(|result| Event::SessionRestored(Box::new(result)));
                caps.render.render();
            }

            Event::Tick => {
                let mut changed = model.expire_transients(now);
                let interval = model.config.liveness_interval();
                if model
                    .session
                    .as_ref()
                    .is_some_and(|s| s.needs_role_retry(now, interval))
                {
                    info!("Retrying role lookup");
                    Self::request_roles(model, caps, now);
                    changed = true;
                }
                if model.session.is_some() {
                    for panel in Self::visible_panels(model) {
                        if !model.is_subscribed(panel) {
                            info!(table = %panel.table(), "Reopening change feed");
                            // Close the dead stream so the shell drops it.
                            caps.table.unsubscribe(panel.table());
                            Self::subscribe(panel, model, caps);
                            Self::load(panel, model, caps, now);
                            changed = true;
                        } else if model.needs_liveness_reload(panel, now) {
                            info!(table = %panel.table(), "Liveness reload");
                            Self::load(panel, model, caps, now);
                            changed = true;
                        }
                    }
                }
                if changed {
                    caps.render.render();
                }
            }

            // --- Auth & session ---
            Event::SessionRestored(result) => {
                match *result {
                    Ok(AuthOutput::Session(Some(session))) => {
                        Self::start_session(model, caps, session.user_id, session.email, now);
                    }
                    Ok(_) => debug!("No stored session"),
                    Err(e) => warn!(error = %e, "Session restore failed"),
                }
                caps.render.render();
            }

            Event::SignInRequested { email, password } => {
                if model.auth_pending {
                    return;
                }
                let email = email.trim().to_string();
                if email.is_empty() || password.is_empty() {
                    model.report(
                        AppError::new(ErrorKind::Validation, "Please fill in all fields"),
                        now,
                    );
                } else {
                    debug!("Signing in");
                    model.auth_pending = true;
                    caps.auth.sign_in(email, password, |result| {
                        Event::SignInCompleted(Box::new(result))
                    });
                }
                caps.render.render();
            }

            Event::SignInCompleted(result) => {
                model.auth_pending = false;
                match *result {
                    Ok(AuthOutput::Session(Some(session))) => {
                        Self::start_session(model, caps, session.user_id, session.email, now);
                        model.clear_error();
                        model.show_toast("Logged in successfully!", ToastKind::Success, now);
                    }
                    Ok(_) => {
                        warn!("Sign-in returned no session");
                        model.report(
                            AppError::new(ErrorKind::Authentication, "Invalid email or password"),
                            now,
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, "Sign-in failed");
                        model.report(e.into(), now);
                    }
                }
                caps.render.render();
            }

            Event::SignOutRequested => {
                caps.auth.sign_out(|result| Event::SignOutCompleted(Box::new(result)));
            }

            Event::SignOutCompleted(result) => {
                if let Err(e) = *result {
                    warn!(error = %e, "Sign-out failed, clearing local session anyway");
                }
                Self::end_session(model, caps);
                model.show_toast("Signed out", ToastKind::Info, now);
                caps.render.render();
            }

            Event::SessionStarted { user_id, email } => {
                Self::start_session(model, caps, user_id, email, now);
                caps.render.render();
            }

            Event::SessionEnded => {
                if model.session.is_some() {
                    Self::end_session(model, caps);
                    caps.render.render();
                }
            }

            Event::RolesLoaded { user_id, result } => {
                let Some(session) = model.session.as_mut().filter(|s| s.user_id == user_id) else {
                    debug!(user_id = %user_id, "Roles for a stale session");
                    return;
                };
                session.roles_pending = false;
                match *result {
                    Ok(TableOutput::Rows(rows)) => {
                        let labels = rows
                            .iter()
                            .filter_map(|row| row.get("role").and_then(Value::as_str));
                        session.roles = roles_from_labels(labels);
                        session.roles_loaded = true;
                        let is_admin = session.is_admin();
                        info!(user_id = %user_id, is_admin, "Roles loaded");
                        if is_admin {
                            Self::subscribe(Panel::Users, model, caps);
                            Self::load(Panel::Users, model, caps, now);
                        }
                    }
                    Ok(other) => warn!(?other, "Unexpected roles output"),
                    Err(e) => {
                        warn!(error = %e, "Role lookup failed");
                        model.report(
                            e.into_app_error(ErrorKind::Fetch, "role lookup failed")
                                .with_context("table", "roles"),
                            now,
                        );
                    }
                }
                caps.render.render();
            }

            // --- List sync ---
            Event::RefreshRequested { panel } => {
                // A manual refresh also retries a failed role lookup.
                if model
                    .session
                    .as_ref()
                    .is_some_and(|s| !s.roles_loaded && !s.roles_pending)
                {
                    Self::request_roles(model, caps, now);
                }
                if Self::visible_panels(model).contains(&panel) {
                    Self::load(panel, model, caps, now);
                }
                caps.render.render();
            }

            Event::ListLoaded {
                panel,
                generation,
                result,
            } => {
                match *result {
                    Ok(TableOutput::Rows(rows)) => {
                        let table = panel.table();
                        let outcome = match panel {
                            Panel::Announcements => Self::apply_snapshot(
                                &mut model.announcements,
                                table,
                                generation,
                                rows,
                                now,
                            ),
                            Panel::Flights => Self::apply_snapshot(
                                &mut model.flights,
                                table,
                                generation,
                                rows,
                                now,
                            ),
                            Panel::Users => Self::apply_snapshot(
                                &mut model.users,
                                table,
                                generation,
                                rows,
                                now,
                            ),
                        };
                        match outcome {
                            LoadOutcome::Applied { rows } => {
                                info!(table = %table, generation, rows, "List loaded");
                            }
                            LoadOutcome::Stale => {
                                debug!(table = %table, generation, "Stale snapshot dropped");
                            }
                        }
                    }
                    Ok(other) => {
                        model.fail_load(panel, generation, now);
                        warn!(table = %panel.table(), ?other, "Unexpected select output");
                    }
                    Err(e) => {
                        model.fail_load(panel, generation, now);
                        warn!(table = %panel.table(), error = %e, "List load failed");
                        model.report(
                            e.into_app_error(ErrorKind::Fetch, format!("failed to load {panel}"))
                                .with_context("table", panel.to_string()),
                            now,
                        );
                    }
                }
                caps.render.render();
            }

            Event::RemoteChanged { panel, notice } => match *notice {
                Ok(TableOutput::Change(change)) => {
                    if model.session.is_none() || !model.is_subscribed(panel) {
                        debug!(table = %change.table, "Change after feed closed");
                        return;
                    }
                    debug!(table = %change.table, kind = ?change.kind, "Remote change");
                    Self::load(panel, model, caps, now);
                    caps.render.render();
                }
                Ok(other) => debug!(table = %panel.table(), ?other, "Ignoring feed output"),
                Err(e) => {
                    // Reopened on the next tick.
                    warn!(table = %panel.table(), error = %e, "Change feed failed");
                    model.set_subscribed(panel, false);
                }
            },

            // --- Create forms ---
            Event::FormOpened { panel } => {
                match panel {
                    Panel::Announcements => model.announcement_form.open(),
                    Panel::Flights => model.flight_form.open(),
                    Panel::Users => model.user_form.open(),
                }
                caps.render.render();
            }

            Event::FormClosed { panel } => {
                match panel {
                    Panel::Announcements => model.announcement_form.close(),
                    Panel::Flights => model.flight_form.close(),
                    Panel::Users => model.user_form.close(),
                }
                caps.render.render();
            }

            Event::CreateAnnouncementRequested(draft) => {
                if model.announcement_form.submitting {
                    debug!("Announcement submit already in flight");
                    return;
                }
                if let Some(author) = Self::require_admin(model, now) {
                    match draft.validate() {
                        Ok(mut row) => {
                            row.created_by = Some(author);
                            if Self::send_insert(Panel::Announcements, &row, model, caps, now) {
                                model.announcement_form.begin_submit(draft);
                            }
                        }
                        Err(e) => {
                            debug!(error = %e, "Announcement rejected locally");
                            model.announcement_form.reject(draft, e.clone());
                            model.report(e.into(), now);
                        }
                    }
                }
                caps.render.render();
            }

            Event::CreateFlightRequested(draft) => {
                if model.flight_form.submitting {
                    debug!("Flight submit already in flight");
                    return;
                }
                if Self::require_admin(model, now).is_some() {
                    match draft.validate() {
                        Ok(row) => {
                            if Self::send_insert(Panel::Flights, &row, model, caps, now) {
                                model.flight_form.begin_submit(draft);
                            }
                        }
                        Err(e) => {
                            debug!(error = %e, "Flight rejected locally");
                            model.flight_form.reject(draft, e.clone());
                            model.report(e.into(), now);
                        }
                    }
                }
                caps.render.render();
            }

            Event::CreateUserRequested(draft) => {
                if model.user_form.submitting || model.admin_request_pending {
                    debug!("Admin request already in flight");
                    return;
                }
                if Self::require_admin(model, now).is_some() {
                    match draft.validate() {
                        Ok(user) => {
                            let operation = AdminOperation::Create {
                                email: user.email,
                                password: user.password,
                                full_name: user.full_name,
                                is_admin: user.is_admin,
                            };
                            model.user_form.begin_submit(draft);
                            Self::send_admin(operation, model, caps);
                        }
                        Err(e) => {
                            debug!(error = %e, "New user rejected locally");
                            model.user_form.reject(draft, e.clone());
                            model.report(e.into(), now);
                        }
                    }
                }
                caps.render.render();
            }

            Event::RecordInserted { panel, result } => {
                let table = panel.table();
                match *result {
                    Ok(output) => {
                        info!(table = %table, "Row inserted");
                        let row = match output {
                            TableOutput::Row(row) => row,
                            _ => None,
                        };
                        let merged = match (panel, row) {
                            (Panel::Announcements, Some(row)) => {
                                Self::merge_inserted(&mut model.announcements, table, row, now)
                            }
                            (Panel::Flights, Some(row)) => {
                                Self::merge_inserted(&mut model.flights, table, row, now)
                            }
                            _ => None,
                        };
                        match panel {
                            Panel::Announcements => {
                                model.announcement_form.submit_succeeded();
                                if let Some(id) = &merged {
                                    model.highlighted = Some(Highlight {
                                        id: id.clone(),
                                        until: now + model.config.highlight_duration(),
                                    });
                                }
                                model.show_toast(
                                    "Announcement created successfully!",
                                    ToastKind::Success,
                                    now,
                                );
                            }
                            Panel::Flights => {
                                model.flight_form.submit_succeeded();
                                model.show_toast("Flight added successfully!", ToastKind::Success, now);
                            }
                            Panel::Users => {}
                        }
                        if merged.is_none() {
                            Self::load(panel, model, caps, now);
                        }
                    }
                    Err(e) => {
                        warn!(table = %table, error = %e, "Insert failed");
                        match panel {
                            Panel::Announcements => model.announcement_form.submit_failed(),
                            Panel::Flights => model.flight_form.submit_failed(),
                            Panel::Users => model.user_form.submit_failed(),
                        }
                        model.report(
                            e.into_app_error(
                                ErrorKind::Write,
                                format!("Failed to create {}", panel.noun()),
                            ),
                            now,
                        );
                    }
                }
                caps.render.render();
            }

            // --- Announcements ---
            Event::MarkReadRequested { id } => {
                if model.session.is_none() || model.marking_read.is_some() {
                    return;
                }
                match model.announcements.get(id.as_str()) {
                    None => {
                        warn!(id = %id, "Mark-read for unknown announcement");
                        return;
                    }
                    Some(announcement) if announcement.read => return,
                    Some(_) => {}
                }
                debug!(id = %id, "Marking announcement read");
                model.marking_read = Some(id.clone());
                let filters = vec![Filter::eq("id", id.as_str())];
                caps.table.update(
                    TableName::Announcements,
                    filters,
                    json!({ "read": true }),
                    move |result| Event::MarkReadCompleted {
                        id,
                        result: Box::new(result),
                    },
                );
                caps.render.render();
            }

            Event::MarkReadCompleted { id, result } => {
                model.marking_read = None;
                match *result {
                    Ok(_) => {
                        info!(id = %id, "Announcement marked read");
                        model.announcements.patch(id.as_str(), |a| a.read = true);
                        model.show_toast("Announcement marked as read.", ToastKind::Success, now);
                    }
                    Err(e) => {
                        warn!(id = %id, error = %e, "Mark-read failed");
                        model.report(
                            e.into_app_error(ErrorKind::Write, "Failed to mark announcement as read"),
                            now,
                        );
                    }
                }
                caps.render.render();
            }

            // --- Confirmation dialogs ---
            Event::DeleteRequested { panel, id } => {
                let label = model.record_label(panel, id.as_str());
                let known = label.is_some();
                let action = PendingAction::Delete {
                    panel,
                    label: label.unwrap_or_else(|| id.to_string()),
                    id,
                };
                Self::open_dialog(panel, action, known, model, now);
                caps.render.render();
            }

            Event::AdminRoleToggleRequested { user_id } => {
                let current = model.users.get(user_id.as_str()).map(|u| {
                    (u.is_admin(), u.display_name().to_string())
                });
                let current = current.or_else(|| {
                    model
                        .session
                        .as_ref()
                        .filter(|s| s.user_id == user_id)
                        .map(|s| (s.is_admin(), s.email.clone()))
                });
                let known = current.is_some();
                let (is_admin, label) = current.unwrap_or_else(|| (false, user_id.to_string()));
                let action = PendingAction::SetAdmin {
                    user_id,
                    grant: !is_admin,
                    label,
                };
                Self::open_dialog(Panel::Users, action, known, model, now);
                caps.render.render();
            }

            Event::DialogConfirmed { panel } => {
                match model.dialog_mut(panel).confirm() {
                    Ok(action) => {
                        info!(table = %panel.table(), target_id = action.target(), "Action confirmed");
                        Self::execute(action, caps, model);
                    }
                    Err(e) => debug!(table = %panel.table(), error = %e, "Nothing to confirm"),
                }
                caps.render.render();
            }

            Event::DialogCancelled { panel } => {
                match model.dialog_mut(panel).cancel() {
                    Ok(action) => debug!(target_id = action.target(), "Action cancelled"),
                    Err(e) => debug!(table = %panel.table(), error = %e, "Nothing to cancel"),
                }
                caps.render.render();
            }

            Event::RecordDeleted { panel, id, result } => {
                Self::complete_dialog(model, panel);
                match *result {
                    Ok(_) => {
                        info!(table = %panel.table(), id = %id, "Row deleted");
                        model.remove_record(panel, id.as_str());
                        let message = format!("{} deleted successfully", capitalize(panel.noun()));
                        model.show_toast(message, ToastKind::Success, now);
                    }
                    Err(e) => {
                        warn!(table = %panel.table(), id = %id, error = %e, "Delete failed");
                        model.report(
                            e.into_app_error(
                                ErrorKind::Write,
                                format!("Failed to delete {}", panel.noun()),
                            ),
                            now,
                        );
                    }
                }
                caps.render.render();
            }

            Event::AdminRoleChanged {
                user_id,
                grant,
                result,
            } => {
                Self::complete_dialog(model, Panel::Users);
                match *result {
                    Ok(_) => {
                        info!(user_id = %user_id, grant, "Admin role changed");
                        model.users.patch(user_id.as_str(), |u| {
                            if grant {
                                u.roles.insert(Role::Admin);
                            } else {
                                u.roles.remove(&Role::Admin);
                            }
                        });
                        if let Some(session) =
                            model.session.as_mut().filter(|s| s.user_id == user_id)
                        {
                            if grant {
                                session.roles.insert(Role::Admin);
                            }
                        }
                        let message = if grant {
                            "Admin role granted"
                        } else {
                            "Admin role removed"
                        };
                        model.show_toast(message, ToastKind::Success, now);
                        Self::load(Panel::Users, model, caps, now);
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, grant, error = %e, "Role change failed");
                        model.report(
                            e.into_app_error(ErrorKind::Write, "Failed to update role"),
                            now,
                        );
                    }
                }
                caps.render.render();
            }

            // --- User administration ---
            Event::UpdateUserRequested(draft) => {
                if model.admin_request_pending {
                    debug!("Admin request already in flight");
                    return;
                }
                if Self::require_admin(model, now).is_some() {
                    match draft.validate() {
                        Ok(update) => {
                            let operation = AdminOperation::Update {
                                user_id: update.user_id,
                                email: update.email,
                                password: update.password,
                                full_name: update.full_name,
                            };
                            Self::send_admin(operation, model, caps);
                        }
                        Err(e) => {
                            debug!(error = %e, "User update rejected locally");
                            model.report(e.into(), now);
                        }
                    }
                }
                caps.render.render();
            }

            Event::PasswordResetRequested {
                user_id,
                new_password,
            } => {
                if model.admin_request_pending {
                    debug!("Admin request already in flight");
                    return;
                }
                if Self::require_admin(model, now).is_some() {
                    match validate_password(&new_password) {
                        Ok(()) => Self::send_admin(
                            AdminOperation::ResetPassword {
                                user_id,
                                new_password,
                            },
                            model,
                            caps,
                        ),
                        Err(e) => model.report(e.into(), now),
                    }
                }
                caps.render.render();
            }

            Event::PasswordResetEmailRequested { user_id } => {
                if Self::require_admin(model, now).is_some() {
                    match model.users.get(user_id.as_str()).map(|u| u.email.clone()) {
                        Some(email) => {
                            debug!(user_id = %user_id, "Sending password reset email");
                            let redirect_to = model.config.password_reset_redirect.clone();
                            caps.auth.reset_password_for_email(
                                email.clone(),
                                redirect_to,
                                move |result| Event::PasswordResetEmailSent {
                                    email,
                                    result: Box::new(result),
                                },
                            );
                        }
                        None => warn!(user_id = %user_id, "Reset email for unknown user"),
                    }
                }
                caps.render.render();
            }

            Event::PasswordResetEmailSent { email, result } => {
                match *result {
                    Ok(_) => {
                        info!("Password reset email sent");
                        model.show_toast(
                            format!("Password reset email sent to {email}"),
                            ToastKind::Success,
                            now,
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, "Password reset email failed");
                        model.report(e.into(), now);
                    }
                }
                caps.render.render();
            }

            Event::AdminCompleted {
                action,
                user_id,
                result,
            } => {
                let result = match *result {
                    Ok(response) if response.success => Ok(()),
                    Ok(_) => Err(AdminError::Rejected {
                        message: format!("The {} request was not accepted", action.as_str()),
                    }),
                    Err(e) => Err(e),
                };
                Self::handle_admin_completed(action, user_id, result, model, caps, now);
                caps.render.render();
            }

            // --- Notifications ---
            Event::ErrorDismissed => {
                model.clear_error();
                caps.render.render();
            }

            Event::ToastDismissed => {
                model.clear_toast();
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        view::build(model, crate::now())
    }
}
