//! Cryptographic primitives for the relay
//!
//! The relay has exactly one secret: a 256-bit key shared out of band between
//! the server operator and the peers allowed to read uploads. It is fixed for
//! the life of the process, never derived, never rotated.
//!
//! # Blob format
//!
//! Every uploaded file is stored as a `CipherBlob`:
//!
//! ```text
//! IV (16 bytes) || AES-256-CBC( plaintext || PKCS#7 padding )
//! ```
//!
//! The IV is drawn fresh from the OS RNG on every call. Any peer holding the
//! key can decode a blob with a stock AES-256-CBC implementation.

mod cipher;
mod key;

pub use cipher::{CipherError, BLOCK_SIZE, IV_SIZE};
pub use key::{KeyError, SharedKey, KEY_SIZE};
