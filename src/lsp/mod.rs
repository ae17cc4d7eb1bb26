//! LSP Protocol Implementation
//!
//! Protocol surface over the core state: lifecycle notifications in,
//! diagnostic publications out.

pub mod backend;
pub mod controller;
pub mod handlers;
pub mod publish;
pub mod server;

pub use backend::Backend;
pub use controller::{SyncController, SyncSettings};
pub use publish::{BackpressurePolicy, DiagnosticSink, PublicationPipeline};
