use crux_core::capability::{CapabilityContext, Operation};
use crux_core::macros::Capability;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Secret, UserId};
use crate::{AppError, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthOperation {
    GetSession,
    SignIn { email: String, password: Secret },
    SignOut,
    ResetPasswordForEmail { email: String, redirect_to: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthOutput {
    Session(Option<AuthSession>),
    SignedOut,
    ResetEmailSent,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("rejected by auth service: {message}")]
    Rejected { message: String },

    #[error("transport failure: {message}")]
    Transport { message: String },
}

pub type AuthResult = Result<AuthOutput, AuthError>;

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = match &err {
            AuthError::InvalidCredentials => "Invalid email or password".to_string(),
            AuthError::Rejected { message } => message.clone(),
            AuthError::Transport { .. } => {
                "Could not reach the sign-in service. Please try again.".to_string()
            }
        };
        AppError::new(ErrorKind::Authentication, message).with_internal(err.to_string())
    }
}

impl Operation for AuthOperation {
    type Output = AuthResult;
}

/// Sessions and password-reset mail from the hosted auth service.
#[derive(Capability)]
pub struct Auth<Ev> {
    context: CapabilityContext<AuthOperation, Ev>,
}

impl<Ev> Auth<Ev> {
    #[must_use]
    pub fn new(context: CapabilityContext<AuthOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Auth<Ev>
where
    Ev: Send + 'static,
{
    pub fn get_session<F>(&self, make_event: F)
    where
        F: FnOnce(AuthResult) -> Ev + Send + 'static,
    {
        self.request(AuthOperation::GetSession, make_event);
    }

    pub fn sign_in<F>(&self, email: String, password: Secret, make_event: F)
    where
        F: FnOnce(AuthResult) -> Ev + Send + 'static,
    {
        self.request(AuthOperation::SignIn { email, password }, make_event);
    }

    pub fn sign_out<F>(&self, make_event: F)
    where
        F: FnOnce(AuthResult) -> Ev + Send + 'static,
    {
        self.request(AuthOperation::SignOut, make_event);
    }

    pub fn reset_password_for_email<F>(&self, email: String, redirect_to: String, make_event: F)
    where
        F: FnOnce(AuthResult) -> Ev + Send + 'static,
    {
        self.request(
            AuthOperation::ResetPasswordForEmail { email, redirect_to },
            make_event,
        );
    }

    fn request<F>(&self, operation: AuthOperation, make_event: F)
    where
        F: FnOnce(AuthResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(result));
        });
    }
}
