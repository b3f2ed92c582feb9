use crate::core::Result;
use std::fmt;

/// Length of a bcrypt hash in its modular crypt form.
pub const ONE_WAY_HASH_LEN: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    /// Hashed; the clear value can be verified but never read back.
    OneWay,
    /// Encrypted with the configured [`ReversibleCipher`].
    Reversible,
}

/// Symmetric cipher backing reversible encrypted fields.
///
/// Key management lives with whoever provides the implementation; the
/// engine only needs the stored form to be printable text.
pub trait ReversibleCipher: Send + Sync + fmt::Debug {
    fn encrypt(&self, plain: &str) -> Result<String>;

    fn decrypt(&self, stored: &str) -> Result<String>;
}

/// Column width reserved for an encrypted value of `max_len` characters.
pub const fn encrypted_column_len(max_len: usize, mode: EncryptionMode) -> usize {
    match mode {
        EncryptionMode::OneWay => ONE_WAY_HASH_LEN,
        EncryptionMode::Reversible => max_len * 4 + 64,
    }
}

/// Hashes a clear value using bcrypt
pub fn hash_one_way(plain: &str, cost: u32) -> Result<String> {
    Ok(bcrypt::hash(plain, cost)?)
}

/// Verifies a clear value against a bcrypt hash
pub fn verify_one_way(plain: &str, hash: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}
