// Verified Contents API - Core
//
// Serves locally stored shop contents (products, blogs, articles) filtered to
// the entities that still exist on the remote commerce platform.
//
// Reconciliation lives in domains/contents; infrastructure traits and shared
// remote-call plumbing live in kernel/.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
