//! Transport credentials using Ed25519
//!
//! Credentials are an identity keypair supplied by the embedding process.
//! The exchange negotiation carries the public key and a signature over
//! the protocol tag so both ends attest the identity they dial or accept
//! under. Payload encryption is out of scope for this layer.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use pex_core::{NodeId, PexError, PexResult};
use pex_wire::HelloPayload;

/// Identity keypair used to attest exchange sessions
#[derive(Clone)]
pub struct TransportCredentials {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    node_id: NodeId,
}

impl TransportCredentials {
    /// Generate fresh random credentials
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        let node_id = Self::derive_node_id(&verifying_key);

        TransportCredentials {
            signing_key,
            verifying_key,
            node_id,
        }
    }

    /// Restore credentials from existing signing key bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let verifying_key = signing_key.verifying_key();
        let node_id = Self::derive_node_id(&verifying_key);

        TransportCredentials {
            signing_key,
            verifying_key,
            node_id,
        }
    }

    /// Get the signing key bytes (secret)
    pub fn signing_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Get the verifying key bytes (public)
    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Get the node ID (truncated hash of public key)
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Build the negotiation payload attesting this identity
    pub fn hello_payload(&self) -> HelloPayload {
        let public_key = self.verifying_key.to_bytes();
        let message = HelloPayload::signed_message(&public_key);
        let signature = self.signing_key.sign(&message);

        HelloPayload {
            public_key,
            signature: signature.to_bytes(),
        }
    }

    /// Verify a peer's negotiation payload and derive its node ID
    pub fn verify_hello(payload: &HelloPayload) -> PexResult<NodeId> {
        let verifying_key = VerifyingKey::from_bytes(&payload.public_key)
            .map_err(|_| PexError::HandshakeRejected("Invalid public key".into()))?;

        let message = HelloPayload::signed_message(&payload.public_key);
        let signature = Signature::from_bytes(&payload.signature);
        verifying_key
            .verify(&message, &signature)
            .map_err(|_| PexError::HandshakeRejected("Invalid attestation signature".into()))?;

        Ok(Self::derive_node_id(&verifying_key))
    }

    /// Derive NodeId from public key (first 8 bytes of SHA-256)
    fn derive_node_id(verifying_key: &VerifyingKey) -> NodeId {
        let mut hasher = Sha256::new();
        hasher.update(verifying_key.as_bytes());
        let hash = hasher.finalize();
        let id_bytes: [u8; 8] = hash[0..8].try_into().unwrap();
        NodeId::from_bytes(id_bytes)
    }
}

impl std::fmt::Debug for TransportCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportCredentials")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}
