//! Repositories for persistent state

pub mod credentials;

pub use credentials::{
    CredentialError, CredentialStore, InMemoryCredentialStore, PgCredentialStore,
};
