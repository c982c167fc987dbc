//! NKey credential signing
//!
//! Thin pass-through over the `nkeys` crate for callers that implement
//! custom auth flows: load a seed, sign a server nonce. Connection-level
//! auth normally goes through [`BrokerConfig`](crate::BrokerConfig) instead.

use std::path::Path;

use crate::error::{Error, Status};

/// Sign `nonce` with an NKey seed, returning the raw signature bytes.
///
/// The seed is the `SU...`/`SO...` form produced by nkey tooling. An
/// unparseable seed maps to [`Status::InvalidArg`].
pub fn sign_with_seed(seed: &str, nonce: &[u8]) -> Result<Vec<u8>, Error> {
    let key_pair = nkeys::KeyPair::from_seed(seed)
        .map_err(|e| Error::invalid_arg(format!("invalid nkey seed: {e}")))?;
    key_pair
        .sign(nonce)
        .map_err(|e| Error::new(Status::Failure, format!("nkey signing failed: {e}")))
}

/// Derive the public key from an NKey seed.
pub fn public_key_from_seed(seed: &str) -> Result<String, Error> {
    let key_pair = nkeys::KeyPair::from_seed(seed)
        .map_err(|e| Error::invalid_arg(format!("invalid nkey seed: {e}")))?;
    Ok(key_pair.public_key())
}

/// Read a seed file, trimming surrounding whitespace.
pub fn load_seed_file(path: &Path) -> Result<String, Error> {
    let seed = std::fs::read_to_string(path).map_err(|e| {
        Error::invalid_arg(format!(
            "failed to read nkey seed file '{}': {e}",
            path.display()
        ))
    })?;
    Ok(seed.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sign_with_seed_round_trip() {
        let key_pair = nkeys::KeyPair::new_user();
        let seed = key_pair.seed().unwrap();

        let signature = sign_with_seed(&seed, b"server-nonce").unwrap();
        assert!(key_pair.verify(b"server-nonce", &signature).is_ok());
    }

    #[test]
    fn test_sign_with_invalid_seed_fails() {
        let err = sign_with_seed("not-a-seed", b"nonce").unwrap_err();
        assert_eq!(err.status(), Status::InvalidArg);
    }

    #[test]
    fn test_public_key_from_seed_matches_key_pair() {
        let key_pair = nkeys::KeyPair::new_user();
        let seed = key_pair.seed().unwrap();
        assert_eq!(public_key_from_seed(&seed).unwrap(), key_pair.public_key());
    }

    #[test]
    fn test_load_seed_file_trims_whitespace() {
        let key_pair = nkeys::KeyPair::new_user();
        let seed = key_pair.seed().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{seed}  ").unwrap();

        let loaded = load_seed_file(file.path()).unwrap();
        assert_eq!(loaded, seed);
    }

    #[test]
    fn test_load_seed_file_missing_fails() {
        let err = load_seed_file(Path::new("/nonexistent/user.nk")).unwrap_err();
        assert_eq!(err.status(), Status::InvalidArg);
    }
}
