use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;
use zeroize::Zeroize;

use crate::capabilities::TableName;
use crate::config::Config;
use crate::dialog::DialogController;
use crate::sync::{ListSync, SyncedRecord};
use crate::validation::{AnnouncementDraft, FlightDraft, Form, NewUserDraft};
use crate::{AppError, ToastKind, ToastMessage};

// --- Secret wrapper: redacts Debug, zeroizes on Drop ---

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(RecordId);
typed_id!(UserId);

// --- Closed enumerations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    #[default]
    Scheduled,
    Boarding,
    Departed,
    Delayed,
    Cancelled,
}

impl FlightStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Boarding => "boarding",
            Self::Departed => "departed",
            Self::Delayed => "delayed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_disrupted(self) -> bool {
        matches!(self, Self::Delayed | Self::Cancelled)
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

/// Collects role labels into the closed [`Role`] set, dropping labels the
/// dashboard does not know.
pub fn roles_from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> BTreeSet<Role> {
    labels
        .into_iter()
        .filter_map(|label| {
            let role = Role::from_label(label);
            if role.is_none() {
                warn!(label, "Ignoring unknown role label");
            }
            role
        })
        .collect()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// --- Entities ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: RecordId,
    pub title: String,
    #[serde(alias = "content", default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "created_by")]
    pub author: Option<UserId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub read: bool,
}

impl SyncedRecord for Announcement {
    fn record_id(&self) -> &str {
        self.id.as_str()
    }

    fn compare(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.created_at.cmp(&a.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: RecordId,
    pub flight_number: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    #[serde(default)]
    pub status: FlightStatus,
    #[serde(default)]
    pub gate: Option<String>,
    #[serde(default)]
    pub aircraft_type: Option<String>,
}

impl SyncedRecord for Flight {
    fn record_id(&self) -> &str {
        self.id.as_str()
    }

    fn compare(a: &Self, b: &Self) -> std::cmp::Ordering {
        a.departure_time.cmp(&b.departure_time)
    }

    fn in_window(&self, now: DateTime<Utc>) -> bool {
        self.departure_time >= now
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RoleRow {
    role: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ProfileRow {
    id: UserId,
    email: String,
    #[serde(default)]
    full_name: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    user_roles: Vec<RoleRow>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        let roles = roles_from_labels(row.user_roles.iter().map(|r| r.role.as_str()));
        Self {
            id: row.id,
            email: row.email,
            full_name: row.full_name.filter(|n| !n.trim().is_empty()),
            created_at: row.created_at,
            roles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProfileRow")]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub roles: BTreeSet<Role>,
}

impl UserProfile {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

impl SyncedRecord for UserProfile {
    fn record_id(&self) -> &str {
        self.id.as_str()
    }

    fn compare(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.created_at.cmp(&a.created_at)
    }
}

// --- Session context ---

/// The acting user. Created when the auth service reports a session and
/// dropped on sign-out; guards borrow it explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
    pub roles: BTreeSet<Role>,
    pub roles_loaded: bool,
    #[serde(default)]
    pub roles_pending: bool,
    #[serde(default)]
    pub roles_requested_at: Option<DateTime<Utc>>,
}

impl Session {
    #[must_use]
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            roles: BTreeSet::new(),
            roles_loaded: false,
            roles_pending: false,
            roles_requested_at: None,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    #[must_use]
    pub fn is_self(&self, id: &str) -> bool {
        self.user_id.as_str() == id
    }

    /// The role lookup has not succeeded, none is in flight, and the last
    /// attempt is at least `interval` old.
    #[must_use]
    pub fn needs_role_retry(&self, now: DateTime<Utc>, interval: chrono::Duration) -> bool {
        !self.roles_loaded
            && !self.roles_pending
            && self.roles_requested_at.map_or(true, |at| now - at >= interval)
    }
}

// --- Panels ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Announcements,
    Flights,
    Users,
}

impl Panel {
    pub const ALL: [Self; 3] = [Self::Announcements, Self::Flights, Self::Users];

    #[must_use]
    pub const fn table(self) -> TableName {
        match self {
            Self::Announcements => TableName::Announcements,
            Self::Flights => TableName::Flights,
            Self::Users => TableName::Profiles,
        }
    }

    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Announcements => "announcement",
            Self::Flights => "flight",
            Self::Users => "user",
        }
    }

    /// Staff lists are visible to every session; the user list is admin-only.
    #[must_use]
    pub const fn requires_admin(self) -> bool {
        matches!(self, Self::Users)
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Announcements => "announcements",
            Self::Flights => "flights",
            Self::Users => "users",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub id: RecordId,
    pub until: DateTime<Utc>,
}

pub struct Model {
    pub config: Config,
    pub session: Option<Session>,
    pub auth_pending: bool,

    pub announcements: ListSync<Announcement>,
    pub flights: ListSync<Flight>,
    pub users: ListSync<UserProfile>,

    pub announcement_form: Form<AnnouncementDraft>,
    pub flight_form: Form<FlightDraft>,
    pub user_form: Form<NewUserDraft>,

    pub announcement_dialog: DialogController,
    pub flight_dialog: DialogController,
    pub user_dialog: DialogController,

    pub marking_read: Option<RecordId>,
    pub highlighted: Option<Highlight>,
    pub admin_request_pending: bool,

    pub active_error: Option<AppError>,
    pub active_toast: Option<ToastMessage>,
}

impl Default for Model {
    fn default() -> Self {
        let config = Config::default();
        Self {
            announcements: ListSync::new(None),
            flights: ListSync::new(Some(config.flight_window_limit)),
            users: ListSync::new(None),
            config,
            session: None,
            auth_pending: false,
            announcement_form: Form::default(),
            flight_form: Form::default(),
            user_form: Form::default(),
            announcement_dialog: DialogController::default(),
            flight_dialog: DialogController::default(),
            user_dialog: DialogController::default(),
            marking_read: None,
            highlighted: None,
            admin_request_pending: false,
            active_error: None,
            active_toast: None,
        }
    }
}

impl Model {
    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind, now: DateTime<Utc>) {
        self.active_toast = Some(ToastMessage::new(message, kind, now));
    }

    pub fn clear_toast(&mut self) {
        self.active_toast = None;
    }

    /// Surfaces a handled failure: one-line toast plus the structured error.
    pub fn report(&mut self, error: AppError, now: DateTime<Utc>) {
        self.show_toast(error.user_facing_message(), ToastKind::Error, now);
        self.set_error(error);
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_admin)
    }

    pub fn dialog_mut(&mut self, panel: Panel) -> &mut DialogController {
        match panel {
            Panel::Announcements => &mut self.announcement_dialog,
            Panel::Flights => &mut self.flight_dialog,
            Panel::Users => &mut self.user_dialog,
        }
    }

    #[must_use]
    pub fn dialog(&self, panel: Panel) -> &DialogController {
        match panel {
            Panel::Announcements => &self.announcement_dialog,
            Panel::Flights => &self.flight_dialog,
            Panel::Users => &self.user_dialog,
        }
    }

    #[must_use]
    pub fn is_subscribed(&self, panel: Panel) -> bool {
        match panel {
            Panel::Announcements => self.announcements.is_subscribed(),
            Panel::Flights => self.flights.is_subscribed(),
            Panel::Users => self.users.is_subscribed(),
        }
    }

    pub fn set_subscribed(&mut self, panel: Panel, subscribed: bool) {
        match panel {
            Panel::Announcements => self.announcements.set_subscribed(subscribed),
            Panel::Flights => self.flights.set_subscribed(subscribed),
            Panel::Users => self.users.set_subscribed(subscribed),
        }
    }

    pub fn begin_load(&mut self, panel: Panel) -> u64 {
        match panel {
            Panel::Announcements => self.announcements.begin_load(),
            Panel::Flights => self.flights.begin_load(),
            Panel::Users => self.users.begin_load(),
        }
    }

    pub fn fail_load(&mut self, panel: Panel, generation: u64, now: DateTime<Utc>) {
        match panel {
            Panel::Announcements => self.announcements.fail_load(generation, now),
            Panel::Flights => self.flights.fail_load(generation, now),
            Panel::Users => self.users.fail_load(generation, now),
        }
    }

    #[must_use]
    pub fn needs_liveness_reload(&self, panel: Panel, now: DateTime<Utc>) -> bool {
        let interval = self.config.liveness_interval();
        match panel {
            Panel::Announcements => self.announcements.needs_liveness_reload(now, interval),
            Panel::Flights => self.flights.needs_liveness_reload(now, interval),
            Panel::Users => self.users.needs_liveness_reload(now, interval),
        }
    }

    /// Human label for the record a dialog talks about.
    #[must_use]
    pub fn record_label(&self, panel: Panel, id: &str) -> Option<String> {
        match panel {
            Panel::Announcements => self.announcements.get(id).map(|a| a.title.clone()),
            Panel::Flights => self.flights.get(id).map(|f| f.flight_number.clone()),
            Panel::Users => self.users.get(id).map(|u| u.display_name().to_string()),
        }
    }

    pub fn remove_record(&mut self, panel: Panel, id: &str) -> bool {
        match panel {
            Panel::Announcements => self.announcements.remove(id).is_some(),
            Panel::Flights => self.flights.remove(id).is_some(),
            Panel::Users => self.users.remove(id).is_some(),
        }
    }

    /// Drops everything tied to the signed-in user.
    pub fn reset_session_state(&mut self) {
        self.session = None;
        self.auth_pending = false;
        self.announcements.clear();
        self.flights.clear();
        self.users.clear();
        self.announcement_form = Form::default();
        self.flight_form = Form::default();
        self.user_form = Form::default();
        self.announcement_dialog.reset();
        self.flight_dialog.reset();
        self.user_dialog.reset();
        self.marking_read = None;
        self.highlighted = None;
        self.admin_request_pending = false;
    }

    pub fn apply_config(&mut self, config: Config) {
        self.flights.set_limit(Some(config.flight_window_limit));
        self.config = config;
    }

    pub fn expire_transients(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        if self.active_toast.as_ref().is_some_and(|t| t.is_expired(now)) {
            self.active_toast = None;
            changed = true;
        }
        if self.highlighted.as_ref().is_some_and(|h| h.until <= now) {
            self.highlighted = None;
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn secret_debug_is_redacted() {
        let secret = Secret::new("hunter2A1");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(secret.expose(), "hunter2A1");
    }

    #[test]
    fn announcement_decodes_both_schema_variants() {
        let with_content: Announcement = serde_json::from_value(json!({
            "id": "a1",
            "title": "Maintenance",
            "content": "Runway closed",
            "priority": "high",
            "created_at": "2026-10-18T08:00:00Z",
            "created_by": "u1"
        }))
        .unwrap();
        assert_eq!(with_content.body, "Runway closed");
        assert_eq!(with_content.priority, Priority::High);
        assert_eq!(with_content.author, Some(UserId::new("u1")));
        assert!(!with_content.read);

        let with_body: Announcement = serde_json::from_value(json!({
            "id": "a2",
            "title": "Crew briefing",
            "body": null,
            "priority": "normal",
            "created_at": "2026-10-18T09:00:00+02:00",
            "read": true
        }))
        .unwrap();
        assert_eq!(with_body.body, "");
        assert!(with_body.read);
    }

    #[test]
    fn unknown_priority_is_rejected() {
        let result = serde_json::from_value::<Announcement>(json!({
            "id": "a1",
            "title": "x",
            "content": "y",
            "priority": "urgent",
            "created_at": "2026-10-18T08:00:00Z"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn profile_decodes_embedded_roles() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": "u1",
            "email": "ops@example.com",
            "full_name": "Jana Novak",
            "created_at": "2026-01-01T00:00:00Z",
            "user_roles": [{"role": "admin"}, {"role": "auditor"}]
        }))
        .unwrap();
        assert!(profile.is_admin());
        assert_eq!(profile.roles.len(), 1);
        assert_eq!(profile.display_name(), "Jana Novak");
    }

    #[test]
    fn profile_without_name_displays_email() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": "u2",
            "email": "crew@example.com",
            "full_name": "  ",
            "created_at": "2026-01-01T00:00:00Z",
            "user_roles": null
        }))
        .unwrap();
        assert!(!profile.is_admin());
        assert_eq!(profile.display_name(), "crew@example.com");
    }

    #[test]
    fn flight_status_defaults_to_scheduled() {
        let flight: Flight = serde_json::from_value(json!({
            "id": "f1",
            "flight_number": "AA1234",
            "departure_airport": "PRG",
            "arrival_airport": "LHR",
            "departure_time": "2026-10-18T10:00:00Z",
            "arrival_time": "2026-10-18T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(flight.status, FlightStatus::Scheduled);
        assert!(flight.gate.is_none());
    }

    #[test]
    fn failed_role_lookup_is_retried_once_per_interval() {
        let now = crate::now();
        let interval = chrono::Duration::seconds(60);
        let mut session = Session::new(UserId::new("me"), "me@example.com");
        assert!(session.needs_role_retry(now, interval));

        session.roles_pending = true;
        session.roles_requested_at = Some(now);
        assert!(!session.needs_role_retry(now + interval, interval));

        session.roles_pending = false;
        assert!(!session.needs_role_retry(now + chrono::Duration::seconds(10), interval));
        assert!(session.needs_role_retry(now + interval, interval));

        session.roles_loaded = true;
        assert!(!session.needs_role_retry(now + interval, interval));
    }

    #[test]
    fn panel_maps_to_tables() {
        assert_eq!(Panel::Users.table(), TableName::Profiles);
        assert!(Panel::Users.requires_admin());
        assert!(!Panel::Flights.requires_admin());
    }
}
