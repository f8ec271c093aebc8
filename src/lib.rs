//! dub-lsp: a language server for the D package manager's `dub.sdl` recipes
//!
//! This crate provides the engines behind the `dub-lsp` binary:
//!
//! - **SDL parsing**: a tolerant parser for the Simple Declarative Language
//! - **Diagnostics**: validation of recipes against the dub package schema
//! - **Autocomplete**: schema-driven completion of tags, attributes and
//!   values, with package names and versions from the dub registry
//! - **Tasks**: build/test/run tasks and `dub` command lines for them
//! - **Hover and outline**: schema descriptions and a document outline
//!
//! # Architecture
//!
//! - [`sdl`]: document model and parser
//! - [`schema`]: declarative schema of `dub.sdl`
//! - [`location`]: what the cursor is on, for completion
//! - [`diagnostics`], [`completion`], [`hover`], [`symbol`]: LSP features
//! - [`registry`]: client for `code.dlang.org`
//! - [`tasks`]: task discovery, binding and resolution
//! - [`server`]: the `tower-lsp` backend
//!
//! # Usage
//!
//! ```ignore
//! use dub_lsp::{diagnostics::validate, schema::DUB_SCHEMA, sdl};
//!
//! let document = sdl::parse("name \"demo\"\ntargetType \"executable\"");
//! assert!(validate(&document, &DUB_SCHEMA).is_empty());
//! ```

// Document model
pub mod location;
pub mod schema;
pub mod sdl;

// LSP feature modules
pub mod completion;
pub mod diagnostics;
pub mod hover;
pub mod symbol;

// Services
pub mod registry;
pub mod server;
pub mod tasks;

// Configuration and utilities
pub mod cli;
pub mod config;
pub mod range;

// Test utilities (only available in test builds)
#[cfg(test)]
pub mod test_utils;
