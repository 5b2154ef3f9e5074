//! Signed-URL issuance and verification.
//!
//! Wire format: `<base>/{download|view}/{uriPath}/f/{filename}/e/{extension}/{fileid}`
//! with query `s=<base64url-no-pad("{expires}:{signatureHex}")>`, where the
//! ed25519 signature covers `"{fileid}:{filename}:{expires}"`. Expiry is
//! embedded in the token; there is no revocation list, only wall-clock
//! comparison at verification time.
//!
//! Verification outcomes are three-way and callers branch on them:
//! malformed tokens and signature mismatches are `UrlInvalidSignature`,
//! a past expiry is `UrlExpired` (both recoverable), while faults inside
//! the crypto layer itself are the fatal `CannotEvaluateSignature`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer};

use stowage_core::{
    FileEntity, KeyManager, Keypair, SignedFileUrl, StorageError, StorageResult, UrlBase,
};

fn payload_for(file: &FileEntity, expires: i64) -> String {
    format!("{}:{}:{}", file.fileid, file.filename, expires)
}

/// Issue download/view URLs expiring `ttl_seconds` after `now`.
pub fn sign(
    keypairs: &dyn KeyManager<Keypair>,
    file: &FileEntity,
    download_url: &UrlBase,
    ttl_seconds: i64,
    now: i64,
) -> StorageResult<SignedFileUrl> {
    let expires = now + ttl_seconds;
    let keypair = keypairs
        .get(None)
        .map_err(|e| StorageError::CannotSignUrl(e.to_string()))?;

    let signature = keypair.signing.sign(payload_for(file, expires).as_bytes());
    let token = URL_SAFE_NO_PAD.encode(format!("{expires}:{}", hex::encode(signature.to_bytes())));
    let query = format!("s={token}");

    let url_for = |mode: &str| {
        download_url.join(
            &[
                mode,
                &file.uri_path,
                "f",
                &file.filename,
                "e",
                &file.extension,
                &file.fileid,
            ],
            Some(&query),
        )
    };

    Ok(SignedFileUrl {
        download: url_for("download"),
        view: url_for("view"),
    })
}

/// Validate a signature token against the entity's current identity.
pub fn check(
    keypairs: &dyn KeyManager<Keypair>,
    file: &FileEntity,
    token: &str,
    now: i64,
) -> StorageResult<()> {
    let decoded = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| StorageError::UrlInvalidSignature)?;
    let decoded = String::from_utf8(decoded).map_err(|_| StorageError::UrlInvalidSignature)?;

    let (expires, signature_hex) = decoded
        .split_once(':')
        .ok_or(StorageError::UrlInvalidSignature)?;
    let expires: i64 = expires.parse().map_err(|_| StorageError::UrlInvalidSignature)?;

    if now > expires {
        return Err(StorageError::UrlExpired);
    }

    // From here on the failure modes belong to the crypto layer, except
    // for a clean verification mismatch.
    let signature_bytes = hex::decode(signature_hex)
        .map_err(|e| StorageError::CannotEvaluateSignature(e.to_string()))?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|e| StorageError::CannotEvaluateSignature(e.to_string()))?;
    let keypair = keypairs
        .get(None)
        .map_err(|e| StorageError::CannotEvaluateSignature(e.to_string()))?;

    keypair
        .verifying
        .verify_strict(payload_for(file, expires).as_bytes(), &signature)
        .map_err(|_| StorageError::UrlInvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::SignerKeyring;

    fn entity() -> FileEntity {
        FileEntity::new(
            "12345",
            "uuid",
            "archive",
            "zip",
            "application/zip",
            "h",
            10,
            "files",
            "local",
            None,
            "/l",
        )
    }

    fn token_of(url: &str) -> &str {
        url.split_once("?s=").unwrap().1
    }

    #[test]
    fn test_url_wire_format() {
        let keys = SignerKeyring::generate("urls");
        let base = UrlBase::parse("http://localhost:3000/").unwrap();

        let signed = sign(&keys, &entity(), &base, 3600, 1_700_000_000).unwrap();

        assert!(signed
            .download
            .starts_with("http://localhost:3000/download/l/f/uuid/e/zip/12345?s="));
        assert!(signed
            .view
            .starts_with("http://localhost:3000/view/l/f/uuid/e/zip/12345?s="));

        // Both links carry the same token and it decodes to expires:hex.
        let token = token_of(&signed.download);
        assert_eq!(token, token_of(&signed.view));

        let decoded = URL_SAFE_NO_PAD.decode(token).unwrap();
        let decoded = String::from_utf8(decoded).unwrap();
        let (expires, signature_hex) = decoded.split_once(':').unwrap();
        assert_eq!(expires, "1700003600");
        assert_eq!(signature_hex.len(), 128);
        assert!(signature_hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_lifecycle() {
        let keys = SignerKeyring::generate("urls");
        let base = UrlBase::parse("http://localhost:3000/").unwrap();
        let file = entity();
        let issue = 1_700_000_000;
        let ttl = 60;

        let signed = sign(&keys, &file, &base, ttl, issue).unwrap();
        let token = token_of(&signed.download);

        assert!(check(&keys, &file, token, issue + ttl - 1).is_ok());
        // Exactly at the boundary the token is still honored.
        assert!(check(&keys, &file, token, issue + ttl).is_ok());

        let err = check(&keys, &file, token, issue + ttl + 1).unwrap_err();
        assert!(matches!(err, StorageError::UrlExpired));
    }

    #[test]
    fn test_tampered_signature_is_invalid_not_expired() {
        let keys = SignerKeyring::generate("urls");
        let base = UrlBase::parse("http://localhost:3000/").unwrap();
        let file = entity();
        let issue = 1_700_000_000;

        let signed = sign(&keys, &file, &base, 3600, issue).unwrap();
        let token = token_of(&signed.download);

        // Flip one signature bit while keeping valid hex.
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(token).unwrap()).unwrap();
        let (expires, signature_hex) = decoded.split_once(':').unwrap();
        let mut chars: Vec<char> = signature_hex.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();
        let tampered_token = URL_SAFE_NO_PAD.encode(format!("{expires}:{tampered}"));

        let err = check(&keys, &file, &tampered_token, issue + 1).unwrap_err();
        assert!(matches!(err, StorageError::UrlInvalidSignature));
    }

    #[test]
    fn test_malformed_tokens_are_invalid() {
        let keys = SignerKeyring::generate("urls");
        let file = entity();

        // Not base64, no separator, unparsable expiry.
        let one_field = URL_SAFE_NO_PAD.encode("justonefield");
        let bad_expiry = URL_SAFE_NO_PAD.encode("abc:def");
        for token in ["%%%", one_field.as_str(), bad_expiry.as_str()] {
            let err = check(&keys, &file, token, 0).unwrap_err();
            assert!(matches!(err, StorageError::UrlInvalidSignature), "{token}");
        }
    }

    #[test]
    fn test_garbage_signature_bytes_are_a_crypto_fault() {
        let keys = SignerKeyring::generate("urls");
        let file = entity();

        // Unexpired, well-formed structure, but the signature field is not
        // decodable into signature bytes at all.
        let token = URL_SAFE_NO_PAD.encode("9999999999:nothex");
        let err = check(&keys, &file, &token, 0).unwrap_err();
        assert!(matches!(err, StorageError::CannotEvaluateSignature(_)));

        let token = URL_SAFE_NO_PAD.encode("9999999999:abcd");
        let err = check(&keys, &file, &token, 0).unwrap_err();
        assert!(matches!(err, StorageError::CannotEvaluateSignature(_)));
    }

    #[test]
    fn test_identity_change_invalidates() {
        let keys = SignerKeyring::generate("urls");
        let base = UrlBase::parse("http://localhost:3000/").unwrap();
        let file = entity();
        let issue = 1_700_000_000;

        let signed = sign(&keys, &file, &base, 3600, issue).unwrap();
        let token = token_of(&signed.download);

        let mut renamed = entity();
        renamed.filename = "other".to_string();

        let err = check(&keys, &renamed, token, issue + 1).unwrap_err();
        assert!(matches!(err, StorageError::UrlInvalidSignature));
    }

    #[test]
    fn test_wrong_keypair_invalidates() {
        let keys = SignerKeyring::generate("urls");
        let other = SignerKeyring::generate("urls");
        let base = UrlBase::parse("http://localhost:3000/").unwrap();
        let file = entity();
        let issue = 1_700_000_000;

        let signed = sign(&keys, &file, &base, 3600, issue).unwrap();
        let token = token_of(&signed.download);

        let err = check(&other, &file, token, issue + 1).unwrap_err();
        assert!(matches!(err, StorageError::UrlInvalidSignature));
    }
}
