//! Passphrase based AES-256-CBC in the OpenSSL `Salted__` format.
//!
//! The backend writes and expects ciphertexts in the layout produced by `openssl enc -md md5`
//! (and by CryptoJS when it is handed a string key):
//!
//! ```text
//! base64("Salted__" || salt[8] || AES-256-CBC-PKCS7(plaintext))
//! ```
//!
//! Key and IV are derived from the passphrase and salt with `EVP_BytesToKey` using a single MD5
//! round. MD5 is only used for this derivation.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine};
use md5::{Digest, Md5};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::{CryptoError, DecodeError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const SALTED_MAGIC: &[u8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

pub(crate) fn encrypt(
    passphrase: &[u8],
    plaintext: &[u8],
    mut rng: impl RngCore + CryptoRng,
) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    encrypt_with_salt(passphrase, &salt, plaintext)
}

fn encrypt_with_salt(passphrase: &[u8], salt: &[u8; SALT_LEN], plaintext: &[u8]) -> Result<String> {
    let key_iv = evp_bytes_to_key(passphrase, salt);
    let (key, iv) = key_iv.split_at(KEY_LEN);

    let ciphertext = Aes256CbcEnc::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidKey)?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut output = Vec::with_capacity(SALTED_MAGIC.len() + SALT_LEN + ciphertext.len());
    output.extend_from_slice(SALTED_MAGIC);
    output.extend_from_slice(salt);
    output.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(output))
}

pub(crate) fn decrypt(
    passphrase: &[u8],
    encoded: &str,
) -> Result<Zeroizing<Vec<u8>>, DecodeError> {
    let data = STANDARD
        .decode(encoded)
        .map_err(|_| DecodeError::Ciphertext)?;
    let salted = data
        .strip_prefix(SALTED_MAGIC)
        .ok_or(DecodeError::Ciphertext)?;
    if salted.len() < SALT_LEN + BLOCK_LEN {
        return Err(DecodeError::Ciphertext);
    }
    let (salt, ciphertext) = salted.split_at(SALT_LEN);

    let key_iv = evp_bytes_to_key(passphrase, salt);
    let (key, iv) = key_iv.split_at(KEY_LEN);

    let plaintext = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|_| DecodeError::Ciphertext)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DecodeError::Ciphertext)?;

    Ok(Zeroizing::new(plaintext))
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single iteration, producing key and IV back to back.
fn evp_bytes_to_key(passphrase: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_LEN + IV_LEN]> {
    let mut output = Zeroizing::new([0u8; KEY_LEN + IV_LEN]);
    let mut previous: Zeroizing<Vec<u8>> = Zeroizing::new(Vec::new());
    let mut filled = 0;

    while filled < output.len() {
        let mut hasher = Md5::new();
        hasher.update(previous.as_slice());
        hasher.update(passphrase);
        hasher.update(salt);
        let digest = hasher.finalize();

        let take = (output.len() - filled).min(digest.len());
        output[filled..filled + take].copy_from_slice(&digest[..take]);
        filled += take;
        *previous = digest.to_vec();
    }

    output
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    // Generated with `openssl enc -aes-256-cbc -md md5 -S 0102030405060708 -pass pass:test-passphrase`
    const PASSPHRASE: &[u8] = b"test-passphrase";
    const SALT: [u8; SALT_LEN] = [1, 2, 3, 4, 5, 6, 7, 8];
    const PLAINTEXT: &[u8] = br#"{"hello":"world"}"#;
    const CIPHERTEXT: &str = "U2FsdGVkX18BAgMEBQYHCGtMm2zKgyeelR1YzqqvDc4/FcjVa0wC9cL674vaz6Y8";

    #[test]
    fn encrypts_in_openssl_salted_format() {
        let ciphertext = encrypt_with_salt(PASSPHRASE, &SALT, PLAINTEXT).unwrap();

        assert_eq!(ciphertext, CIPHERTEXT);
    }

    #[test]
    fn decrypts_openssl_ciphertext() {
        let plaintext = decrypt(PASSPHRASE, CIPHERTEXT).unwrap();

        assert_eq!(plaintext.as_slice(), PLAINTEXT);
    }

    #[test]
    fn random_salt_is_prepended() {
        let rng = rand_chacha::ChaCha8Rng::from_seed([7u8; 32]);

        let ciphertext = encrypt(PASSPHRASE, PLAINTEXT, rng).unwrap();
        let raw = STANDARD.decode(&ciphertext).unwrap();

        assert!(raw.starts_with(SALTED_MAGIC));
        assert_eq!(decrypt(PASSPHRASE, &ciphertext).unwrap().as_slice(), PLAINTEXT);
    }

    #[test]
    fn rejects_ciphertext_without_salt_header() {
        let raw = STANDARD.decode(CIPHERTEXT).unwrap();
        let headerless = STANDARD.encode(&raw[SALTED_MAGIC.len()..]);

        assert!(matches!(
            decrypt(PASSPHRASE, &headerless),
            Err(DecodeError::Ciphertext)
        ));
    }

    #[test]
    fn rejects_truncated_ciphertext() {
        let raw = STANDARD.decode(CIPHERTEXT).unwrap();
        let truncated = STANDARD.encode(&raw[..SALTED_MAGIC.len() + SALT_LEN + 4]);

        assert!(matches!(
            decrypt(PASSPHRASE, &truncated),
            Err(DecodeError::Ciphertext)
        ));
    }
}
