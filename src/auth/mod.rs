//! User accounts and authentication
//!
//! Users live in a JSON file guarded by an in-process lock. Passwords
//! are stored as bcrypt hashes. A first login against an empty store
//! seeds three default accounts as a bootstrap convenience.

mod token;

pub use token::{Claims, TokenIssuer};

use crate::error::{ClaimsightError, Result};
use crate::notify::validate_email;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 6;

/// The email that receives the admin flag at signup.
const ADMIN_EMAIL: &str = "admin@example.com";

/// Stored user record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// File-backed user store
pub struct UserStore {
    path: PathBuf,
    users: RwLock<BTreeMap<String, UserRecord>>,
}

impl UserStore {
    /// Open the store, loading any existing users file.
    pub fn open(path: PathBuf) -> Self {
        let users = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(users) => users,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not parse users file, starting empty");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self {
            path,
            users: RwLock::new(users),
        }
    }

    /// Register a new user. Validates email format and password length,
    /// rejects duplicates, and stores a bcrypt hash.
    pub fn signup(&self, email: &str, password: &str) -> Result<UserProfile> {
        validate_email(email)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ClaimsightError::InvalidRequest(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let mut users = self.users.write();
        if users.contains_key(email) {
            return Err(ClaimsightError::InvalidRequest(
                "Email already exists".to_string(),
            ));
        }

        let record = UserRecord {
            password_hash: hash_password(password)?,
            is_admin: email == ADMIN_EMAIL,
            created_at: Utc::now(),
        };
        users.insert(email.to_string(), record.clone());
        self.persist(&users)?;

        Ok(UserProfile {
            email: email.to_string(),
            is_admin: record.is_admin,
            created_at: record.created_at,
        })
    }

    /// Check credentials and return the matching profile.
    ///
    /// An empty store is seeded with the default accounts first, so a
    /// fresh deployment is immediately usable.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<UserProfile> {
        {
            let mut users = self.users.write();
            if users.is_empty() {
                self.seed_defaults(&mut users)?;
            }
        }

        let users = self.users.read();
        let record = users.get(email).ok_or(ClaimsightError::InvalidCredentials)?;

        let valid = bcrypt::verify(password, &record.password_hash)
            .map_err(|e| ClaimsightError::Data(format!("password verification failed: {}", e)))?;
        if !valid {
            return Err(ClaimsightError::InvalidCredentials);
        }

        Ok(UserProfile {
            email: email.to_string(),
            is_admin: record.is_admin,
            created_at: record.created_at,
        })
    }

    /// Look up a profile by email.
    pub fn get(&self, email: &str) -> Option<UserProfile> {
        self.users.read().get(email).map(|record| UserProfile {
            email: email.to_string(),
            is_admin: record.is_admin,
            created_at: record.created_at,
        })
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.users
            .read()
            .get(email)
            .map(|r| r.is_admin)
            .unwrap_or(false)
    }

    fn seed_defaults(&self, users: &mut BTreeMap<String, UserRecord>) -> Result<()> {
        let defaults = [
            (ADMIN_EMAIL, "admin123", true),
            ("user@example.com", "user123", false),
            ("demo@example.com", "demo123", false),
        ];
        for (email, password, is_admin) in defaults {
            users.insert(
                email.to_string(),
                UserRecord {
                    password_hash: hash_password(password)?,
                    is_admin,
                    created_at: Utc::now(),
                },
            );
        }
        self.persist(users)?;
        info!("Seeded default user accounts");
        Ok(())
    }

    fn persist(&self, users: &BTreeMap<String, UserRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(users)?)?;
        Ok(())
    }
}

fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| ClaimsightError::Data(format!("password hashing failed: {}", e)))
}
