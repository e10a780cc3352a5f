//! Encrypted-data vault for patient records.
//!
//! Two layers:
//!
//! - [`KeyManager`] resolves a single 256-bit master key from the
//!   environment, the deployment config or a key file, in that order, and
//!   owns its lifecycle: generation, migration from legacy locations, wipe.
//! - [`EncryptionService`] selects an AEAD backend at construction and
//!   encrypts, decrypts and hashes through the key manager. It never reads
//!   key storage itself.
//!
//! Construct one service per unit of work and pass it (or an
//! `Arc<dyn DataEncryptor>`) to whatever needs it. There is no global key.
//!
//! # Key rotation across processes
//!
//! The key file is shared by every process on the host, but each service
//! caches the key it resolved. After [`EncryptionService::reset_key`] in one
//! process, others keep encrypting with the old key until their cache is
//! cleared or they are restarted. Anything sealed with the old key after the
//! reset cannot be decrypted with the new one. Stop writers before rotating.
//!
//! Concurrent first-time generation is safe: the key file is created
//! exclusively, and a process that loses the race adopts the winner's key.
//!
//! # Memory hygiene
//!
//! Key bytes and file plaintext buffers are zeroized on drop. Copies made by
//! the allocator on reallocation, by the AEAD implementations, or by callers
//! holding returned plaintext are outside that guarantee.

mod config;
mod environment;
mod error;
mod key_manager;
mod service;
mod storage;

pub use carevault_crypto::{Backend, Capabilities, DataEncryptor, EncryptorError};
pub use config::{DEFAULT_KEY_NAME, VaultConfig};
pub use environment::{FixedEnvironment, KeyEnvironment, SystemEnvironment};
pub use error::{VaultError, VaultResult};
pub use key_manager::{KeyManager, KeySource, MigrationOutcome};
pub use service::{Decrypted, EncryptionService, ResetOutcome};
