use serde::{Deserialize, Serialize};

use crate::capabilities::{AdminAction, AdminResult, AuthResult, TableResult};
use crate::config::Config;
use crate::model::{Panel, RecordId, Secret, UserId};
use crate::validation::{AnnouncementDraft, FlightDraft, NewUserDraft, UserUpdateDraft};

// --- Event enum: no None variant, capability results boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle
    AppStarted {
        #[serde(default)]
        config: Config,
    },
    Tick,

    // Auth & session
    SessionRestored(Box<AuthResult>),
    SignInRequested {
        email: String,
        password: Secret,
    },
    SignInCompleted(Box<AuthResult>),
    SignOutRequested,
    SignOutCompleted(Box<AuthResult>),
    SessionStarted {
        user_id: UserId,
        email: String,
    },
    SessionEnded,
    RolesLoaded {
        user_id: UserId,
        result: Box<TableResult>,
    },

    // List sync
    RefreshRequested {
        panel: Panel,
    },
    ListLoaded {
        panel: Panel,
        generation: u64,
        result: Box<TableResult>,
    },
    RemoteChanged {
        panel: Panel,
        notice: Box<TableResult>,
    },

    // Create forms
    FormOpened {
        panel: Panel,
    },
    FormClosed {
        panel: Panel,
    },
    CreateAnnouncementRequested(AnnouncementDraft),
    CreateFlightRequested(FlightDraft),
    CreateUserRequested(NewUserDraft),
    RecordInserted {
        panel: Panel,
        result: Box<TableResult>,
    },

    // Announcements
    MarkReadRequested {
        id: RecordId,
    },
    MarkReadCompleted {
        id: RecordId,
        result: Box<TableResult>,
    },

    // Confirmation dialogs
    DeleteRequested {
        panel: Panel,
        id: RecordId,
    },
    AdminRoleToggleRequested {
        user_id: UserId,
    },
    DialogConfirmed {
        panel: Panel,
    },
    DialogCancelled {
        panel: Panel,
    },
    RecordDeleted {
        panel: Panel,
        id: RecordId,
        result: Box<TableResult>,
    },
    AdminRoleChanged {
        user_id: UserId,
        grant: bool,
        result: Box<TableResult>,
    },

    // User administration
    UpdateUserRequested(UserUpdateDraft),
    PasswordResetRequested {
        user_id: UserId,
        new_password: Secret,
    },
    PasswordResetEmailRequested {
        user_id: UserId,
    },
    PasswordResetEmailSent {
        email: String,
        result: Box<AuthResult>,
    },
    AdminCompleted {
        action: AdminAction,
        user_id: Option<UserId>,
        result: Box<AdminResult>,
    },

    // Notifications
    ErrorDismissed,
    ToastDismissed,
}

impl Event {
    /// Stable name for log fields; never includes payload data.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AppStarted { .. } => "app_started",
            Self::Tick => "tick",
            Self::SessionRestored(_) => "session_restored",
            Self::SignInRequested { .. } => "sign_in_requested",
            Self::SignInCompleted(_) => "sign_in_completed",
            Self::SignOutRequested => "sign_out_requested",
            Self::SignOutCompleted(_) => "sign_out_completed",
            Self::SessionStarted { .. } => "session_started",
            Self::SessionEnded => "session_ended",
            Self::RolesLoaded { .. } => "roles_loaded",
            Self::RefreshRequested { .. } => "refresh_requested",
            Self::ListLoaded { .. } => "list_loaded",
            Self::RemoteChanged { .. } => "remote_changed",
            Self::FormOpened { .. } => "form_opened",
            Self::FormClosed { .. } => "form_closed",
            Self::CreateAnnouncementRequested(_) => "create_announcement_requested",
            Self::CreateFlightRequested(_) => "create_flight_requested",
            Self::CreateUserRequested(_) => "create_user_requested",
            Self::RecordInserted { .. } => "record_inserted",
            Self::MarkReadRequested { .. } => "mark_read_requested",
            Self::MarkReadCompleted { .. } => "mark_read_completed",
            Self::DeleteRequested { .. } => "delete_requested",
            Self::AdminRoleToggleRequested { .. } => "admin_role_toggle_requested",
            Self::DialogConfirmed { .. } => "dialog_confirmed",
            Self::DialogCancelled { .. } => "dialog_cancelled",
            Self::RecordDeleted { .. } => "record_deleted",
            Self::AdminRoleChanged { .. } => "admin_role_changed",
            Self::UpdateUserRequested(_) => "update_user_requested",
            Self::PasswordResetRequested { .. } => "password_reset_requested",
            Self::PasswordResetEmailRequested { .. } => "password_reset_email_requested",
            Self::PasswordResetEmailSent { .. } => "password_reset_email_sent",
            Self::AdminCompleted { .. } => "admin_completed",
            Self::ErrorDismissed => "error_dismissed",
            Self::ToastDismissed => "toast_dismissed",
        }
    }
}
