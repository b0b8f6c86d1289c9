//! Source and sink adapters.
//!
//! Adapters translate an external store into rows and back. They plug into a
//! pipeline through [`Source`](crate::Source) and report failures with
//! `anyhow` context, surfaced to pipeline callers as
//! [`EtlError::Adapter`](crate::EtlError::Adapter).

pub mod glob;

#[cfg(feature = "io-jsonl")]
pub mod jsonl;

#[cfg(feature = "io-csv")]
pub mod csv;
