//! Fetches a Zotero group library, regenerates a combined Atom feed file,
//! and commits the file back to the enclosing git repository when it changed.

pub mod atom;
pub mod config;
pub mod git;
pub mod pipeline;
pub mod schedule;
pub mod zotero;
