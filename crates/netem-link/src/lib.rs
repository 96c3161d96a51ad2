//! Linux plumbing for emulated network links.
//!
//! Locates the network namespaces and veth pairs that make up an emulation
//! session and shapes individual links with `tc netem` (and optionally
//! `tbf`). Also provides throwaway session construction for integration
//! tests.
//!
//! # Modules
//!
//! - [`ns`]: Namespace handles (owned or attached) and command execution
//! - [`shape`]: `tc netem`/`tbf` parameter sets and application
//! - [`session`]: Discovery of a session's nodes and links by naming convention
//! - [`testnet`]: Privilege checks and throwaway-session builders for tests

pub mod ns;
pub mod session;
pub mod shape;
pub mod testnet;

pub use ns::Namespace;
pub use session::{DEFAULT_NS_PREFIX, EmuLink, Session, node_ns_name};
pub use shape::{LinkShape, apply_shape, clear_shape};
pub use testnet::{build_session, check_privileges, unique_session_id};
