//! Registry management API interactions
//!
//! This module provides the HTTP client for the registry's management API
//! together with the two components built on it: repository provisioning for
//! push destinations and paginated repository/tag discovery for bulk sync.

pub mod client;
pub mod directory;
pub mod provisioner;

pub use client::{
    ApiResponse, CreateRepositoryRequest, ListingPage, QuayClient, QuayClientBuilder, RegistryApi,
};
pub use directory::{DirectoryClient, Listing, MAX_PAGES};
pub use provisioner::{ProvisionOutcome, RepositoryProvisioner};
