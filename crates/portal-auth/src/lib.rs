#![allow(non_snake_case)]

pub mod accounts;
pub mod error;
pub mod secret;
pub mod token;

pub use accounts::{
    hash_password, hash_password_with, AccountDirectory, AccountEntry, HashParams, StaticAccounts,
};
pub use error::{SecretError, TokenError};
pub use secret::{resolve_secret, RunMode, TokenSecret};
pub use token::{RawClaims, TokenService, VerifiedIdentity};
