//! Release stages.
//!
//! A release turns a repository reference into a signed, compressed
//! archive and distributes it:
//!
//! 1. [`version`] resolves the reference to a [`version::Version`].
//! 2. [`archive`] writes a deterministic tar of the tree at that reference.
//! 3. [`compress`] compresses it with bzip2.
//! 4. [`inventory`] checks that required paths survived packaging.
//! 5. [`signing`] produces a detached signature.
//! 6. [`publish`] transfers artifact and signature to each destination,
//!    recording progress in a [`ledger`].
//!
//! [`pipeline`] chains the stages together.

pub mod archive;
pub mod compress;
pub mod digest;
pub mod inventory;
pub mod ledger;
pub mod naming;
pub mod pipeline;
pub mod publish;
pub mod signing;
pub mod version;
