use crux_core::capability::{CapabilityContext, Operation};
use crux_core::macros::Capability;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::model::{Secret, UserId};
use crate::{AppError, ErrorKind};

/// Body of one call to the privileged user-administration endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum AdminOperation {
    Create {
        email: String,
        password: Secret,
        full_name: String,
        is_admin: bool,
    },
    Update {
        user_id: UserId,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<Secret>,
        #[serde(skip_serializing_if = "Option::is_none")]
        full_name: Option<String>,
    },
    Delete {
        user_id: UserId,
    },
    ResetPassword {
        user_id: UserId,
        new_password: Secret,
    },
}

impl AdminOperation {
    #[must_use]
    pub const fn action(&self) -> AdminAction {
        match self {
            Self::Create { .. } => AdminAction::Create,
            Self::Update { .. } => AdminAction::Update,
            Self::Delete { .. } => AdminAction::Delete,
            Self::ResetPassword { .. } => AdminAction::ResetPassword,
        }
    }

    #[must_use]
    pub fn target(&self) -> Option<&UserId> {
        match self {
            Self::Create { .. } => None,
            Self::Update { user_id, .. }
            | Self::Delete { user_id }
            | Self::ResetPassword { user_id, .. } => Some(user_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdminAction {
    Create,
    Update,
    Delete,
    ResetPassword,
}

impl AdminAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::ResetPassword => "reset-password",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AdminResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdminError {
    #[error("not authenticated")]
    Unauthorized,

    #[error("admin access required")]
    Forbidden,

    #[error("{message}")]
    Rejected { message: String },

    #[error("admin endpoint failed: {message}")]
    Internal { message: String },

    #[error("transport failure: {message}")]
    Transport { message: String },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl AdminError {
    /// Maps a non-2xx status and its `{"error": ...}` body.
    fn from_status(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            400..=499 => Self::Rejected { message },
            _ => Self::Internal { message },
        }
    }
}

pub type AdminResult = Result<AdminResponse, AdminError>;

/// Raw HTTP reply of the admin endpoint, as relayed by the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminReply {
    pub status: u16,
    pub body: String,
}

impl AdminReply {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Interprets the reply: 2xx carries an `AdminResponse`, anything else
    /// an error body.
    pub fn into_result(self) -> AdminResult {
        if !(200..300).contains(&self.status) {
            return Err(AdminError::from_status(self.status, self.body.as_bytes()));
        }
        serde_json::from_str(&self.body).map_err(|e| {
            warn!(status = self.status, error = %e, "Undecodable admin response");
            AdminError::Internal {
                message: format!("undecodable response: {e}"),
            }
        })
    }
}

/// The shell answers `Err` only when no HTTP reply arrived at all.
pub type AdminReplyResult = Result<AdminReply, AdminError>;

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        let error = match &err {
            AdminError::Unauthorized => AppError::new(ErrorKind::Authentication, ""),
            AdminError::Forbidden => AppError::new(ErrorKind::Authorization, "admin role required"),
            AdminError::Rejected { message } => AppError::new(ErrorKind::Write, message.clone()),
            AdminError::Internal { .. } | AdminError::Transport { .. } => AppError::new(
                ErrorKind::Write,
                "The admin service is unavailable. Please try again.",
            ),
        };
        error.with_internal(err.to_string())
    }
}

impl Operation for AdminOperation {
    type Output = AdminReplyResult;
}

#[derive(Capability)]
pub struct Admin<Ev> {
    context: CapabilityContext<AdminOperation, Ev>,
}

impl<Ev> Admin<Ev> {
    #[must_use]
    pub fn new(context: CapabilityContext<AdminOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Admin<Ev>
where
    Ev: Send + 'static,
{
    pub fn execute<F>(&self, operation: AdminOperation, make_event: F)
    where
        F: FnOnce(AdminResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(operation)
                .await
                .and_then(AdminReply::into_result);
            ctx.update_app(make_event(result));
        });
    }
}
