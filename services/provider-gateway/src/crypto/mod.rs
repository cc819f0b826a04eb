//! Tenant key resolution and payload signing.

pub mod key_service;
pub mod signer;

pub use key_service::{
    InMemoryKeyStore, KeyError, KeyPurpose, KeyService, KeyStore, KeyStoreError, TransportKey,
    VaultKeyService,
};
pub use signer::{KeyServiceSigner, SignatureAlgorithm, Signer};
