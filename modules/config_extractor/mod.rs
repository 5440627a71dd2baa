//! Configuration extraction for job config documents
//!
//! Reads the embedded DDL/SQL statement fragments, the pipeline name and the
//! state TTL from a job's `execution-config.user-config` section. Fragments may
//! arrive as JSON-encoded strings; those are decoded when possible and kept
//! verbatim otherwise.

pub mod types;
pub mod ttl;
pub mod extractor;

pub use types::*;
pub use ttl::TtlTable;
pub use extractor::ConfigExtractor;
