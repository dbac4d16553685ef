//! forge
//!
//! Abstraction for remote forges (GitHub, GitLab, Gitea): listing
//! repositories so the Manifest Loader can turn a `workspace: {kind:
//! forge}` block into declared `RepoSpec`s. Commands use the
//! [`create_forge`] factory function rather than importing specific forge
//! implementations directly — this keeps the Manifest Loader independent
//! of any one provider's API shape.
//!
//! # Modules
//!
//! - [`traits`]: the `ForgeClient` trait and `ForgeRepo`/`ForgeError` types
//! - [`github`]: GitHub implementation (always available)
//! - `gitlab`: GitLab implementation (requires the `gitlab` feature)
//! - `gitea`: Gitea implementation (requires the `gitea` feature)
//! - [`mock`]: in-memory implementation for deterministic testing
//! - [`factory`]: provider selection and creation

pub mod factory;
pub mod github;
#[cfg(feature = "gitlab")]
pub mod gitlab;
#[cfg(feature = "gitea")]
pub mod gitea;
pub mod mock;
mod traits;

pub use factory::{create_forge, detect_provider, valid_forge_names, ForgeProvider};
pub use traits::*;
