//! # Core Module
//!
//! Shared-ownership primitives used by the stores and sessions that more than one
//! thread touches: the server's world and session table, and the client's chunk cache.
//!
//! ## Usage
//! ```rust
//! use voxel_realm::core::MtResource;
//!
//! let counter = MtResource::new(0);
//! *counter.get_mut() += 1;
//! assert_eq!(*counter.get(), 1);
//! ```

pub mod mt_resource;

pub use mt_resource::MtResource;
