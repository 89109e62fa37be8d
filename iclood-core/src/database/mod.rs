//! Local persistence for client state.
//!
//! The client keeps only a handful of small JSON documents (settings and
//! device identity) in a single key/value table.

pub mod schema;

pub use schema::Database;
