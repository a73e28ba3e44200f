use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;


/// A registered user of the pet world
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// System-generated ID (usr_{random_8chars})
    pub id: String,
    /// Display name shown to other clients
    pub name: String,
    /// Bearer token presented on connect and REST calls (UUID v4)
    pub token: String,
    /// When the user registered
    pub created_at: DateTime<Utc>,
}

/// The identity a verified credential resolves to
#[derive(Debug, Clone, PartialEq)]
pub struct UserIdentity {
    pub user_id: String,
    pub user_name: String,
}

/// User directory: registration and token verification.
///
/// Tokens are opaque credentials minted at registration and held only in
/// memory; a restart invalidates them. This is the identity collaborator the
/// rest of the server consults — everything else treats a token as
/// verify-or-reject.
pub struct UserDirectory {
    /// Primary storage: user_id -> User
    users: Arc<DashMap<String, User>>,
    /// Secondary index: token -> user_id (for auth)
    tokens: Arc<DashMap<String, String>>,
}

impl UserDirectory {
    /// Create new empty directory
    pub fn new() -> Self {
        Self {
            users: Arc::new(DashMap::new()),
            tokens: Arc::new(DashMap::new()),
        }
    }

    /// Register a new user with the given display name.
    ///
    /// Returns the created User with generated ID and token.
    pub fn register(&self, name: &str) -> Result<User, RegistrationError> {
        let name = name.trim();
        Self::validate_name(name)?;

        let user = User {
            id: generate_user_id(),
            name: name.to_string(),
            token: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        };

        self.users.insert(user.id.clone(), user.clone());
        self.tokens.insert(user.token.clone(), user.id.clone());

        Ok(user)
    }

    /// Validate display name format
    ///
    /// Rules: 1-64 characters after trimming, no control characters
    pub fn validate_name(name: &str) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::Empty);
        }
        if name.chars().count() > 64 {
            return Err(ValidationError::TooLong);
        }
        if name.chars().any(char::is_control) {
            return Err(ValidationError::InvalidCharacters);
        }
        Ok(())
    }

    /// Verify a credential token.
    ///
    /// The single identity check the connection handshake and REST
    /// middleware rely on.
    pub fn verify(&self, token: &str) -> Result<UserIdentity, AuthError> {
        let user_id = self.tokens.get(token).ok_or(AuthError::InvalidToken)?;
        let user = self
            .users
            .get(user_id.value())
            .ok_or(AuthError::InvalidToken)?;
        Ok(UserIdentity {
            user_id: user.id.clone(),
            user_name: user.name.clone(),
        })
    }

    /// Look up a user by id
    pub fn get(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).map(|u| u.clone())
    }

    /// Get count of registered users
    pub fn count(&self) -> usize {
        self.users.len()
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate user ID: usr_{random_8chars}
fn generate_user_id() -> String {
    let mut rng = rand::thread_rng();
    let random: String = (0..8)
        .map(|_| {
            let idx = rng.gen_range(0..36);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect();
    format!("usr_{}", random)
}

/// Registration errors
#[derive(Debug, PartialEq)]
pub enum RegistrationError {
    InvalidName(ValidationError),
}

impl From<ValidationError> for RegistrationError {
    fn from(e: ValidationError) -> Self {
        RegistrationError::InvalidName(e)
    }
}

impl std::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationError::InvalidName(e) => write!(f, "invalid name: {}", e),
        }
    }
}

impl std::error::Error for RegistrationError {}

/// Name validation errors
#[derive(Debug, PartialEq)]
pub enum ValidationError {
    Empty,
    TooLong,
    InvalidCharacters,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Empty => write!(f, "name must not be empty"),
            ValidationError::TooLong => write!(f, "name must be at most 64 characters"),
            ValidationError::InvalidCharacters => {
                write!(f, "name must not contain control characters")
            }
        }
    }
}

/// Authorization errors
#[derive(Debug, PartialEq)]
pub enum AuthError {
    InvalidToken,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidToken => write!(f, "invalid or unknown token"),
        }
    }
}

impl std::error::Error for AuthError {}
