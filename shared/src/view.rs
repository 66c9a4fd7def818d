use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dialog::{DialogController, DialogState, PendingAction};
use crate::model::{FlightStatus, Model, Panel, Priority};
use crate::validation::{AnnouncementDraft, FlightDraft, Form};
use crate::{AppError, ErrorSeverity, ToastKind, ToastMessage, MAX_BODY_CHARS, MAX_TITLE_CHARS};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialogView {
    pub open: bool,
    pub in_flight: bool,
    pub title: String,
    pub message: String,
    pub confirm_label: String,
}

impl DialogView {
    fn closed() -> Self {
        Self {
            open: false,
            in_flight: false,
            title: String::new(),
            message: String::new(),
            confirm_label: String::new(),
        }
    }
}

impl From<&DialogController> for DialogView {
    fn from(dialog: &DialogController) -> Self {
        let (action, in_flight) = match dialog.state() {
            DialogState::Idle => return Self::closed(),
            DialogState::Confirming(action) => (action, false),
            DialogState::InFlight(action) => (action, true),
        };
        let (title, message, confirm_label) = match action {
            PendingAction::Delete { panel, label, .. } => (
                format!("Delete {}", capitalize(panel.noun())),
                format!("Are you sure you want to delete {label}? This action cannot be undone."),
                "Delete",
            ),
            PendingAction::SetAdmin {
                grant: true, label, ..
            } => (
                "Grant Admin Role".to_string(),
                format!("Grant admin privileges to {label}?"),
                "Grant",
            ),
            PendingAction::SetAdmin {
                grant: false, label, ..
            } => (
                "Remove Admin Role".to_string(),
                format!("Remove admin privileges from {label}?"),
                "Remove",
            ),
        };
        Self {
            open: true,
            in_flight,
            title,
            message,
            confirm_label: confirm_label.to_string(),
        }
    }
}

pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormView<D> {
    pub open: bool,
    pub submitting: bool,
    pub error: Option<String>,
    pub draft: D,
}

impl<D: Clone> From<&Form<D>> for FormView<D> {
    fn from(form: &Form<D>) -> Self {
        Self {
            open: form.open,
            submitting: form.submitting,
            error: form.error.as_ref().map(ToString::to_string),
            draft: form.draft.clone(),
        }
    }
}

/// User form draft without the password.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserDraftView {
    pub email: String,
    pub full_name: String,
    pub is_admin: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnnouncementItem {
    pub id: String,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub is_high_priority: bool,
    pub posted_at: String,
    pub read: bool,
    pub highlighted: bool,
    pub marking_read: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnnouncementsView {
    pub items: Vec<AnnouncementItem>,
    pub unread_count: usize,
    pub is_loading: bool,
    pub can_manage: bool,
    pub form: FormView<AnnouncementDraft>,
    pub title_chars: usize,
    pub body_chars: usize,
    pub max_title_chars: usize,
    pub max_body_chars: usize,
    pub dialog: DialogView,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlightItem {
    pub id: String,
    pub flight_number: String,
    pub route: String,
    pub departure: String,
    pub arrival: String,
    pub status: FlightStatus,
    pub is_disrupted: bool,
    pub gate: Option<String>,
    pub aircraft_type: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlightsView {
    pub items: Vec<FlightItem>,
    pub is_loading: bool,
    pub can_manage: bool,
    pub form: FormView<FlightDraft>,
    pub dialog: DialogView,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserItem {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub is_admin: bool,
    pub is_you: bool,
    pub can_delete: bool,
    pub can_toggle_admin: bool,
    pub joined: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsersView {
    pub visible: bool,
    pub items: Vec<UserItem>,
    pub is_loading: bool,
    pub request_pending: bool,
    pub form: FormView<UserDraftView>,
    pub dialog: DialogView,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionView {
    pub user_id: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub session: Option<SessionView>,
    pub is_authenticated: bool,
    pub signing_in: bool,
    pub announcements: AnnouncementsView,
    pub flights: FlightsView,
    pub users: UsersView,
    pub error: Option<UserFacingError>,
    pub toast: Option<ToastView>,
}

fn announcements_view(model: &Model, now: DateTime<Utc>, can_manage: bool) -> AnnouncementsView {
    let highlighted = model
        .highlighted
        .as_ref()
        .filter(|h| h.until > now)
        .map(|h| h.id.as_str());
    let items = model
        .announcements
        .items()
        .iter()
        .map(|a| AnnouncementItem {
            id: a.id.to_string(),
            title: a.title.clone(),
            body: a.body.clone(),
            priority: a.priority,
            is_high_priority: a.priority == Priority::High,
            posted_at: a.created_at.format(TIME_FORMAT).to_string(),
            read: a.read,
            highlighted: highlighted == Some(a.id.as_str()),
            marking_read: model.marking_read.as_ref() == Some(&a.id),
        })
        .collect::<Vec<_>>();
    let draft = &model.announcement_form.draft;
    AnnouncementsView {
        unread_count: items.iter().filter(|i| !i.read).count(),
        items,
        is_loading: model.announcements.is_loading(),
        can_manage,
        form: FormView::from(&model.announcement_form),
        title_chars: draft.title.chars().count(),
        body_chars: draft.body.chars().count(),
        max_title_chars: MAX_TITLE_CHARS,
        max_body_chars: MAX_BODY_CHARS,
        dialog: DialogView::from(model.dialog(Panel::Announcements)),
    }
}

fn flights_view(model: &Model, can_manage: bool) -> FlightsView {
    FlightsView {
        items: model
            .flights
            .items()
            .iter()
            .map(|f| FlightItem {
                id: f.id.to_string(),
                flight_number: f.flight_number.clone(),
                route: format!("{} → {}", f.departure_airport, f.arrival_airport),
                departure: f.departure_time.format(TIME_FORMAT).to_string(),
                arrival: f.arrival_time.format(TIME_FORMAT).to_string(),
                status: f.status,
                is_disrupted: f.status.is_disrupted(),
                gate: f.gate.clone(),
                aircraft_type: f.aircraft_type.clone(),
            })
            .collect(),
        is_loading: model.flights.is_loading(),
        can_manage,
        form: FormView::from(&model.flight_form),
        dialog: DialogView::from(model.dialog(Panel::Flights)),
    }
}

fn users_view(model: &Model, is_admin: bool) -> UsersView {
    let session = model.session.as_ref();
    let form = &model.user_form;
    UsersView {
        visible: is_admin,
        items: model
            .users
            .items()
            .iter()
            .map(|u| {
                let is_you = session.is_some_and(|s| s.is_self(u.id.as_str()));
                UserItem {
                    id: u.id.to_string(),
                    display_name: u.full_name.clone().unwrap_or_else(|| "No name".into()),
                    email: u.email.clone(),
                    roles: u.roles.iter().map(|r| r.as_str().to_string()).collect(),
                    is_admin: u.is_admin(),
                    is_you,
                    can_delete: is_admin && !is_you,
                    can_toggle_admin: is_admin && !(is_you && u.is_admin()),
                    joined: u.created_at.format(DATE_FORMAT).to_string(),
                }
            })
            .collect(),
        is_loading: model.users.is_loading(),
        request_pending: model.admin_request_pending,
        form: FormView {
            open: form.open,
            submitting: form.submitting,
            error: form.error.as_ref().map(ToString::to_string),
            draft: UserDraftView {
                email: form.draft.email.clone(),
                full_name: form.draft.full_name.clone(),
                is_admin: form.draft.is_admin,
            },
        },
        dialog: DialogView::from(model.dialog(Panel::Users)),
    }
}

#[must_use]
pub fn build(model: &Model, now: DateTime<Utc>) -> ViewModel {
    let is_admin = model.is_admin();
    ViewModel {
        session: model.session.as_ref().map(|s| SessionView {
            user_id: s.user_id.to_string(),
            email: s.email.clone(),
            is_admin: s.is_admin(),
        }),
        is_authenticated: model.is_authenticated(),
        signing_in: model.auth_pending,
        announcements: announcements_view(model, now, is_admin),
        flights: flights_view(model, is_admin),
        users: users_view(model, is_admin),
        error: model.active_error.as_ref().map(UserFacingError::from),
        toast: model.active_toast.as_ref().map(ToastView::from),
    }
}
