//! Authentication: password hashing, access tokens and request extractors

pub mod extractor;
pub mod jwt;
pub mod password;

pub use extractor::{Admin, AuthUser, MaybeUser, Staff};
pub use jwt::{Claims, JwtError, JwtKeys};
pub use password::{generate_reset_token, hash_password, verify_password, PasswordError};
