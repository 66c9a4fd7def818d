use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Panel, RecordId, Session, UserId};
use crate::{AppError, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingAction {
    Delete {
        panel: Panel,
        id: RecordId,
        label: String,
    },
    SetAdmin {
        user_id: UserId,
        grant: bool,
        label: String,
    },
}

impl PendingAction {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Delete { label, .. } | Self::SetAdmin { label, .. } => label,
        }
    }

    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Delete { id, .. } => id.as_str(),
            Self::SetAdmin { user_id, .. } => user_id.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DialogState {
    #[default]
    Idle,
    Confirming(PendingAction),
    InFlight(PendingAction),
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SelfActionError {
    #[error("You cannot delete your own account")]
    SelfDeletion,

    #[error("You cannot remove your own admin role")]
    SelfDemotion,
}

impl From<SelfActionError> for AppError {
    fn from(err: SelfActionError) -> Self {
        AppError::new(ErrorKind::SelfAction, err.to_string())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DialogError {
    #[error("another action is already pending")]
    Busy,

    #[error("no action is awaiting confirmation")]
    NotConfirming,

    #[error("no action is in flight")]
    NotInFlight,

    #[error(transparent)]
    SelfAction(#[from] SelfActionError),
}

impl From<DialogError> for AppError {
    fn from(err: DialogError) -> Self {
        match err {
            DialogError::SelfAction(inner) => inner.into(),
            other => AppError::new(ErrorKind::InvalidState, other.to_string()),
        }
    }
}

/// Single-slot state machine: at most one action is confirming or in
/// flight per instance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DialogController {
    state: DialogState,
}

impl DialogController {
    #[must_use]
    pub const fn state(&self) -> &DialogState {
        &self.state
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, DialogState::Idle)
    }

    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self.state, DialogState::InFlight(_))
    }

    #[must_use]
    pub const fn pending(&self) -> Option<&PendingAction> {
        match &self.state {
            DialogState::Idle => None,
            DialogState::Confirming(action) | DialogState::InFlight(action) => Some(action),
        }
    }

    /// Idle -> Confirming. Self-protection guards run here, before any
    /// prompt is shown or remote call issued.
    pub fn request(&mut self, action: PendingAction, session: &Session) -> Result<(), DialogError> {
        if !self.is_idle() {
            return Err(DialogError::Busy);
        }
        check_self_action(&action, session).inspect_err(|err| {
            warn!(target_id = action.target(), error = %err, "Blocked self action");
        })?;
        debug!(target_id = action.target(), "Awaiting confirmation");
        self.state = DialogState::Confirming(action);
        Ok(())
    }

    /// Confirming -> InFlight; hands back the action to execute.
    pub fn confirm(&mut self) -> Result<PendingAction, DialogError> {
        match std::mem::take(&mut self.state) {
            DialogState::Confirming(action) => {
                self.state = DialogState::InFlight(action.clone());
                Ok(action)
            }
            other => {
                self.state = other;
                Err(DialogError::NotConfirming)
            }
        }
    }

    /// Confirming -> Idle with no remote effect.
    pub fn cancel(&mut self) -> Result<PendingAction, DialogError> {
        match std::mem::take(&mut self.state) {
            DialogState::Confirming(action) => Ok(action),
            other => {
                self.state = other;
                Err(DialogError::NotConfirming)
            }
        }
    }

    /// InFlight -> Idle, whatever the outcome.
    pub fn complete(&mut self) -> Result<PendingAction, DialogError> {
        match std::mem::take(&mut self.state) {
            DialogState::InFlight(action) => Ok(action),
            other => {
                self.state = other;
                Err(DialogError::NotInFlight)
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = DialogState::Idle;
    }
}

pub fn check_self_action(action: &PendingAction, session: &Session) -> Result<(), SelfActionError> {
    match action {
        PendingAction::Delete {
            panel: Panel::Users,
            id,
            ..
        } if session.is_self(id.as_str()) => Err(SelfActionError::SelfDeletion),
        PendingAction::SetAdmin {
            user_id,
            grant: false,
            ..
        } if session.is_self(user_id.as_str()) => Err(SelfActionError::SelfDemotion),
        _ => Ok(()),
    }
}
