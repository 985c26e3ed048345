//! IV-prefixed AES-256-CBC codec

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use super::key::SharedKey;

/// Size of the CBC initialisation vector in bytes
pub const IV_SIZE: usize = 16;
/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Errors that can occur during encryption/decryption
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("failed to generate IV: {0}")]
    Rng(String),
    #[error("decryption failed: {0}")]
    Decryption(&'static str),
}

impl SharedKey {
    /// Encrypt a plaintext into a `CipherBlob`
    ///
    /// Output is `iv (16) || ciphertext`, where the ciphertext is always a
    /// whole number of blocks.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut iv = [0u8; IV_SIZE];
        getrandom::getrandom(&mut iv).map_err(|e| CipherError::Rng(e.to_string()))?;
        Ok(self.encrypt_with_iv(&iv, data))
    }

    fn encrypt_with_iv(&self, iv: &[u8; IV_SIZE], data: &[u8]) -> Vec<u8> {
        let ciphertext = Aes256CbcEnc::new(self.as_array().into(), iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(data);

        let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len());
        out.extend_from_slice(iv);
        out.extend_from_slice(&ciphertext);
        out
    }

    /// Decrypt a `CipherBlob` back into its plaintext
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Decryption` if:
    /// - the blob is shorter than one IV, or the remainder is not whole blocks
    /// - the padding is malformed (wrong key, truncated or corrupted blob)
    ///
    /// Padding is the only integrity check, so a wrong key still slips through
    /// whenever the garbage it produces happens to end in valid padding.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CipherError> {
        if blob.len() < IV_SIZE {
            return Err(CipherError::Decryption("blob shorter than IV"));
        }
        let (iv, ciphertext) = blob.split_at(IV_SIZE);
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CipherError::Decryption("ciphertext is not whole blocks"));
        }

        let iv: &[u8; IV_SIZE] = iv
            .try_into()
            .map_err(|_| CipherError::Decryption("blob shorter than IV"))?;
        Aes256CbcDec::new(self.as_array().into(), iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CipherError::Decryption("malformed padding"))
    }
}
