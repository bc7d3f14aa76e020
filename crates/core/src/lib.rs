//! Cryptographic core of the LockMark bookmark vault.
//!
//! This crate is the only place in the system that ever touches plaintext
//! bookmark data, a master password, a PIN, or any key derived from either.
//! Everything else — the HTTP server that stores the opaque wrapped master
//! key and opaque encrypted manifest, the browser-extension UI, local
//! key-value storage — is reached only through the [`server::ServerClient`]
//! and [`store::SecureStore`] trait boundaries; this crate never assumes a
//! concrete implementation of either beyond the in-memory/recording
//! reference doubles it ships for tests.
//!
//! Start at [`orchestrator::Orchestrator`]: it composes the key hierarchy
//! (`keys`), the wrapped-master-key codec (`wmk`), the manifest sealer
//! (`manifest`), the PIN subsystem (`pin`) and the lock state machine
//! (`lock`) into the four entry points a caller actually calls —
//! `unlock`, `unlock_with_pin`, `setup_pin`/`remove_pin`, and
//! `seal_manifest`/`open_manifest`.
//!
//! No plaintext ever persists. `UEK`, `MK` and `KEK` are zeroized before
//! the function that derived them returns; only `MAK` lives beyond a single
//! call, and only inside [`keystore::Keystore`], which is wiped on every
//! transition out of `Unlocked`.

pub mod aad;
pub mod autolock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod keystore;
pub mod lock;
pub mod manifest;
pub mod orchestrator;
pub mod pin;
pub mod server;
pub mod session;
pub mod store;
pub mod wmk;

pub use crate::error::{LockMarkError, Result};
pub use crate::orchestrator::{Orchestrator, UnlockContext, UnlockOutcome};
