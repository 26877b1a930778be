use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// An identity on the ledger: an ed25519 public key in base58 form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Derives an address from a public key.
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        Address(bs58::encode(public_key.as_bytes()).into_string())
    }

    /// Recovers the public key the address encodes.
    pub fn to_public_key(&self) -> Result<VerifyingKey, CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let key_bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey("wrong key length".to_string()))?;

        VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        bs58::decode(s)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        Ok(Address(s.to_string()))
    }
}

/// An ed25519 signature in hex form, as stored on a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(hex::encode(signature.to_bytes()))
    }

    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = hex::decode(&self.0)
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let signature_bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature("wrong signature length".to_string()))?;

        Ok(Signature::from_bytes(&signature_bytes))
    }

    /// An empty signature carries no proof and never verifies.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A signing identity: the secret half stays here, the address is public.
#[derive(Debug, Clone)]
pub struct Keypair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    address: Address,
}

impl Keypair {
    /// Generates a fresh random keypair.
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let address = Address::from_public_key(&verifying_key);

        Keypair {
            signing_key,
            verifying_key,
            address,
        }
    }

    /// Rebuilds a keypair from a 32-byte secret seed.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = secret
            .try_into()
            .map_err(|_| CryptoError::InvalidSecretKey("wrong seed length".to_string()))?;

        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = VerifyingKey::from(&signing_key);
        let address = Address::from_public_key(&verifying_key);

        Ok(Keypair {
            signing_key,
            verifying_key,
            address,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Signs a message with the secret key.
    pub fn sign(&self, message: &[u8]) -> DigitalSignature {
        DigitalSignature::from_signature(&self.signing_key.sign(message))
    }

    /// Exports the secret seed, e.g. for logging a throwaway demo identity.
    pub fn export_secret_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }
}

/// Checks a signature against a message and public key. Decoding problems
/// are errors; a well-formed signature that does not match is `Ok(false)`.
pub fn verify_signature(
    message: &[u8],
    signature: &DigitalSignature,
    public_key: &VerifyingKey,
) -> Result<bool, CryptoError> {
    let signature = signature.to_signature()?;

    Ok(public_key.verify(message, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_keypair() {
        let keypair = Keypair::generate();
        assert!(!keypair.address().0.is_empty());
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::generate();
        let message = b"value transfer";

        let signature = keypair.sign(message);

        let result = verify_signature(message, &signature, keypair.public_key()).unwrap();
        assert!(result);

        let result =
            verify_signature(b"another message", &signature, keypair.public_key()).unwrap();
        assert!(!result);
    }

    #[test]
    fn test_address_roundtrip() {
        let keypair = Keypair::generate();

        let public_key = keypair.address().to_public_key().unwrap();
        assert_eq!(public_key.as_bytes(), keypair.public_key().as_bytes());
    }

    #[test]
    fn test_keypair_from_secret_bytes() {
        let keypair = Keypair::generate();
        let secret = keypair.export_secret_bytes();

        let restored = Keypair::from_secret_bytes(&secret).unwrap();
        assert_eq!(restored.address(), keypair.address());
    }

    #[test]
    fn test_parse_address() {
        let keypair = Keypair::generate();

        let parsed: Address = keypair.address().0.parse().unwrap();
        assert_eq!(&parsed, keypair.address());

        // 0, O, I and l are outside the base58 alphabet
        assert!("0OIl".parse::<Address>().is_err());
    }

    #[test]
    fn test_malformed_signature_is_an_error() {
        let keypair = Keypair::generate();
        let garbage = DigitalSignature("not hex".to_string());

        assert!(verify_signature(b"msg", &garbage, keypair.public_key()).is_err());
    }
}
