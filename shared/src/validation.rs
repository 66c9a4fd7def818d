use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{FlightStatus, Priority, Secret, UserId};
use crate::{
    AppError, ErrorKind, MAX_BODY_CHARS, MAX_EMAIL_CHARS, MAX_FULL_NAME_CHARS, MAX_TITLE_CHARS,
    MIN_PASSWORD_CHARS,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must be at most {max} characters (got {len})")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Password must contain an uppercase letter, a lowercase letter and a number")]
    PasswordTooWeak,

    #[error("{field} is not a valid date and time")]
    InvalidTimestamp { field: &'static str },

    #[error("Arrival time must be after departure time")]
    ArrivalNotAfterDeparture,

    #[error("Nothing to update")]
    NothingToUpdate,
}

impl ValidationError {
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::Required { field }
            | Self::TooLong { field, .. }
            | Self::InvalidTimestamp { field } => Some(field),
            Self::InvalidEmail => Some("Email"),
            Self::PasswordTooShort { .. } | Self::PasswordTooWeak => Some("Password"),
            Self::ArrivalNotAfterDeparture => Some("Arrival time"),
            Self::NothingToUpdate => None,
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let error = AppError::new(ErrorKind::Validation, err.to_string());
        match err.field() {
            Some(field) => error.with_context("field", field),
            None => error,
        }
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Required { field })
    } else {
        Ok(trimmed)
    }
}

fn at_most(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        Err(ValidationError::TooLong { field, max, len })
    } else {
        Ok(())
    }
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Accepts RFC 3339 or the `YYYY-MM-DDTHH:MM[:SS]` shape of a
/// `datetime-local` input, read as UTC.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    let value = required(field, value)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or(ValidationError::InvalidTimestamp { field })
}

pub fn validate_email(value: &str) -> Result<String, ValidationError> {
    let email = required("Email", value)?;
    at_most("Email", email, MAX_EMAIL_CHARS)?;
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ValidationError::InvalidEmail);
    };
    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email.to_string())
}

pub fn validate_password(password: &Secret) -> Result<(), ValidationError> {
    let value = password.expose();
    if value.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_CHARS,
        });
    }
    let upper = value.chars().any(char::is_uppercase);
    let lower = value.chars().any(char::is_lowercase);
    let digit = value.chars().any(|c| c.is_ascii_digit());
    if upper && lower && digit {
        Ok(())
    } else {
        Err(ValidationError::PasswordTooWeak)
    }
}

pub fn validate_full_name(value: &str) -> Result<String, ValidationError> {
    let name = required("Full name", value)?;
    at_most("Full name", name, MAX_FULL_NAME_CHARS)?;
    Ok(name.to_string())
}

// --- Announcements ---

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnnouncementDraft {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub priority: Priority,
}

/// Insert row for the `announcements` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
}

impl AnnouncementDraft {
    pub fn validate(&self) -> Result<NewAnnouncement, ValidationError> {
        // Bounds are checked on the raw input, before trimming.
        at_most("Title", &self.title, MAX_TITLE_CHARS)?;
        at_most("Content", &self.body, MAX_BODY_CHARS)?;
        let title = required("Title", &self.title)?;
        let body = required("Content", &self.body)?;
        Ok(NewAnnouncement {
            title: title.to_string(),
            content: body.to_string(),
            priority: self.priority,
            created_by: None,
        })
    }
}

// --- Flights ---

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightDraft {
    pub flight_number: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub status: FlightStatus,
    pub gate: String,
    pub aircraft_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewFlight {
    pub flight_number: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub status: FlightStatus,
    pub gate: Option<String>,
    pub aircraft_type: Option<String>,
}

impl FlightDraft {
    pub fn validate(&self) -> Result<NewFlight, ValidationError> {
        let flight_number = required("Flight number", &self.flight_number)?.to_uppercase();
        let departure_airport = required("Departure airport", &self.departure_airport)?.to_uppercase();
        let arrival_airport = required("Arrival airport", &self.arrival_airport)?.to_uppercase();
        let departure_time = parse_timestamp("Departure time", &self.departure_time)?;
        let arrival_time = parse_timestamp("Arrival time", &self.arrival_time)?;
        if arrival_time <= departure_time {
            return Err(ValidationError::ArrivalNotAfterDeparture);
        }
        Ok(NewFlight {
            flight_number,
            departure_airport,
            arrival_airport,
            departure_time,
            arrival_time,
            status: self.status,
            gate: optional(&self.gate),
            aircraft_type: optional(&self.aircraft_type),
        })
    }
}

// --- Users ---

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewUserDraft {
    pub email: String,
    pub password: Secret,
    pub full_name: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password: Secret,
    pub full_name: String,
    pub is_admin: bool,
}

impl NewUserDraft {
    pub fn validate(&self) -> Result<NewUser, ValidationError> {
        let email = validate_email(&self.email)?;
        validate_password(&self.password)?;
        let full_name = validate_full_name(&self.full_name)?;
        Ok(NewUser {
            email,
            password: self.password.clone(),
            full_name,
            is_admin: self.is_admin,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdateDraft {
    pub user_id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<Secret>,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdate {
    pub user_id: UserId,
    pub email: Option<String>,
    pub password: Option<Secret>,
    pub full_name: Option<String>,
}

impl UserUpdateDraft {
    /// Blank fields count as absent.
    pub fn validate(&self) -> Result<UserUpdate, ValidationError> {
        let email = match self.email.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Some(validate_email(value)?),
            _ => None,
        };
        let password = match &self.password {
            Some(secret) if !secret.is_empty() => {
                validate_password(secret)?;
                Some(secret.clone())
            }
            _ => None,
        };
        let full_name = match self.full_name.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Some(validate_full_name(value)?),
            _ => None,
        };
        if email.is_none() && password.is_none() && full_name.is_none() {
            return Err(ValidationError::NothingToUpdate);
        }
        Ok(UserUpdate {
            user_id: self.user_id.clone(),
            email,
            password,
            full_name,
        })
    }
}

// --- Form state ---

/// Create-form state of one panel. The draft survives a failed submit so
/// the user can retry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Form<D> {
    pub draft: D,
    pub open: bool,
    pub submitting: bool,
    pub error: Option<ValidationError>,
}

impl<D: Default> Form<D> {
    pub fn open(&mut self) {
        self.open = true;
        self.error = None;
    }

    pub fn close(&mut self) {
        if !self.submitting {
            *self = Self::default();
        }
    }

    pub fn reject(&mut self, draft: D, error: ValidationError) {
        self.draft = draft;
        self.error = Some(error);
    }

    pub fn begin_submit(&mut self, draft: D) {
        self.draft = draft;
        self.error = None;
        self.submitting = true;
    }

    pub fn submit_failed(&mut self) {
        self.submitting = false;
    }

    pub fn submit_succeeded(&mut self) {
        *self = Self::default();
    }
}
