use std::collections::HashMap;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Version,
};
use portal_types::{IdentityPayload, Role};
use serde::Deserialize;
use tracing::warn;

pub use argon2::Params as HashParams;

/// Looks up credentials and returns the identity to put in a token.
pub trait AccountDirectory: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> Option<IdentityPayload>;
}

/// One configured login. `password_hash` is an argon2 PHC string as
/// printed by `portal-server --hash-password`.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct AccountEntry {
    pub username: String,
    pub password_hash: String,
    pub user_id: i64,
    pub role: Role,
    #[serde(default)]
    pub display_name: Option<String>,
}

pub struct StaticAccounts {
    accounts: HashMap<String, AccountEntry>,
}

impl StaticAccounts {
    pub fn new(entries: Vec<AccountEntry>) -> Self {
        let mut accounts = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = entry.username.to_ascii_lowercase();
            if accounts.contains_key(&key) {
                warn!("duplicate account {}, keeping the first entry", entry.username);
                continue;
            }
            if PasswordHash::new(&entry.password_hash).is_err() {
                warn!("account {} has an unparseable password hash, it cannot log in", entry.username);
            }
            accounts.insert(key, entry);
        }
        Self { accounts }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccountDirectory for StaticAccounts {
    fn authenticate(&self, username: &str, password: &str) -> Option<IdentityPayload> {
        let entry = self.accounts.get(&username.trim().to_ascii_lowercase())?;

        let parsedHash = PasswordHash::new(&entry.password_hash).ok()?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsedHash)
            .ok()?;

        let mut identity = IdentityPayload::new(entry.user_id, entry.role);
        if let Some(name) = &entry.display_name {
            identity = identity.with_claim("name", name.clone());
        }
        Some(identity)
    }
}

/// Hash a password with argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    hash_with(Argon2::default(), password)
}

/// Same as `hash_password` with explicit cost parameters. Verification
/// reads the parameters back out of the PHC string.
pub fn hash_password_with(
    password: &str,
    params: HashParams,
) -> Result<String, argon2::password_hash::Error> {
    hash_with(Argon2::new(Algorithm::Argon2id, Version::V0x13, params), password)
}

fn hash_with(argon2: Argon2<'_>, password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}
