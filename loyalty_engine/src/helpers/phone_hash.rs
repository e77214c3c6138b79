use sha2::{Digest, Sha256};

use crate::db_types::PhoneHash;

/// Computes the stable, one-way customer key for a phone number: the lower-case hex SHA-256 digest of the number as
/// supplied. Raw phone numbers never reach storage.
pub fn hash_phone(phone: &str) -> PhoneHash {
    let digest = Sha256::digest(phone.as_bytes());
    PhoneHash(format!("{digest:x}"))
}
