//! Rider accounts: registration, credential checks and profile edits

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

use crate::domain::types::{NewUser, PageRequest, Paginated, User, UserId, UserUpdate};
use crate::error::{RentalError, Result};
use crate::storage::UserRepository;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is a valid regex")
});

const MIN_PASSWORD_CHARS: usize = 8;
const MAX_PASSWORD_CHARS: usize = 100;
const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 50;

fn invalid(field: &str, message: impl Into<String>) -> RentalError {
    RentalError::Validation {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Trimmed, lowercased address.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim();
    if email.is_empty() {
        return Err(invalid("email", "is required"));
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(invalid("email", "is not a valid address"));
    }
    Ok(email.to_ascii_lowercase())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(invalid("password", "is required"));
    }
    let chars = password.chars().count();
    if chars < MIN_PASSWORD_CHARS {
        return Err(invalid(
            "password",
            format!("must be at least {MIN_PASSWORD_CHARS} characters"),
        ));
    }
    if chars > MAX_PASSWORD_CHARS {
        return Err(invalid(
            "password",
            format!("must be at most {MAX_PASSWORD_CHARS} characters"),
        ));
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_letter && has_digit) {
        return Err(invalid(
            "password",
            "must contain at least one letter and one number",
        ));
    }
    Ok(())
}

/// Trimmed name of ASCII letters, spaces and hyphens.
pub fn normalize_name(field: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid(field, "is required"));
    }
    let chars = name.chars().count();
    if chars < MIN_NAME_CHARS {
        return Err(invalid(
            field,
            format!("must be at least {MIN_NAME_CHARS} characters"),
        ));
    }
    if chars > MAX_NAME_CHARS {
        return Err(invalid(
            field,
            format!("must be at most {MAX_NAME_CHARS} characters"),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c == ' ' || c == '-')
    {
        return Err(invalid(
            field,
            "may only contain letters, spaces and hyphens",
        ));
    }
    Ok(name.to_string())
}

fn hashing_failed(err: impl std::fmt::Display) -> RentalError {
    RentalError::PasswordHashing {
        message: err.to_string(),
    }
}

/// Argon2id hashing, run off the async executor.
#[derive(Clone)]
pub struct PasswordHashing {
    params: Params,
}

impl Default for PasswordHashing {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl PasswordHashing {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub async fn hash(&self, password: String) -> Result<String> {
        let argon2 = self.argon2();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(hashing_failed)
        })
        .await
        .map_err(hashing_failed)?
    }

    /// `false` for a wrong password; an unreadable stored hash is an error.
    pub async fn verify(&self, password: String, stored: String) -> Result<bool> {
        let argon2 = self.argon2();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&stored).map_err(hashing_failed)?;
            Ok(argon2.verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await
        .map_err(hashing_failed)?
    }
}

/// Sign-up form, unvalidated.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Requested account edits, unvalidated. Absent fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl AccountChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
    }
}

pub struct UserManager {
    users: Arc<dyn UserRepository>,
    hashing: PasswordHashing,
}

impl UserManager {
    pub fn new(users: Arc<dyn UserRepository>, hashing: PasswordHashing) -> Self {
        Self { users, hashing }
    }

    pub async fn register(&self, registration: Registration) -> Result<User> {
        let email = normalize_email(&registration.email)?;
        validate_password(&registration.password)?;
        let first_name = normalize_name("first_name", &registration.first_name)?;
        let last_name = normalize_name("last_name", &registration.last_name)?;

        if self.users.get_user_by_email(&email).await?.is_some() {
            warn!("Registration rejected: email already in use");
            return Err(RentalError::EmailAlreadyExists { email });
        }

        let password_hash = self.hashing.hash(registration.password).await?;
        let user = self
            .users
            .create_user(&NewUser {
                email,
                password_hash,
                first_name,
                last_name,
            })
            .await?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Check an email and password pair.
    ///
    /// Unknown addresses and wrong passwords fail the same way.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        if password.is_empty() {
            return Err(invalid("password", "is required"));
        }
        let email = normalize_email(email)?;

        let Some(user) = self.users.get_user_by_email(&email).await? else {
            warn!("Login rejected: unknown email");
            return Err(RentalError::InvalidCredentials);
        };

        if !self
            .hashing
            .verify(password.to_string(), user.password_hash.clone())
            .await?
        {
            warn!(user_id = %user.id, "Login rejected: wrong password");
            return Err(RentalError::InvalidCredentials);
        }

        info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<User> {
        self.users
            .get_user(user_id)
            .await?
            .ok_or(RentalError::UserNotFound { user_id })
    }

    /// Validate and apply account edits for riders and admins alike.
    pub async fn update_user(&self, user_id: UserId, changes: AccountChanges) -> Result<User> {
        if changes.is_empty() {
            return Err(invalid("body", "at least one field must be provided"));
        }

        let email = changes.email.as_deref().map(normalize_email).transpose()?;
        if let Some(password) = &changes.password {
            validate_password(password)?;
        }
        let first_name = changes
            .first_name
            .as_deref()
            .map(|n| normalize_name("first_name", n))
            .transpose()?;
        let last_name = changes
            .last_name
            .as_deref()
            .map(|n| normalize_name("last_name", n))
            .transpose()?;

        let password_changed = changes.password.is_some();
        let password_hash = match changes.password {
            Some(password) => Some(self.hashing.hash(password).await?),
            None => None,
        };

        let update = UserUpdate {
            email,
            password_hash,
            first_name,
            last_name,
        };
        let user = self
            .users
            .update_user(user_id, &update)
            .await?
            .ok_or(RentalError::UserNotFound { user_id })?;

        info!(%user_id, password_changed, "User updated");
        Ok(user)
    }

    pub async fn list_users(&self, page: PageRequest) -> Result<Paginated<User>> {
        let items = self.users.list_users(page).await?;
        let total = self.users.count_users().await?;
        Ok(Paginated { items, total, page })
    }
}
