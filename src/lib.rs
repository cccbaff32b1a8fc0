//! wasm-fs: pluggable filesystem backends for WebAssembly hosts
//!
//! A runtime-neutral filesystem vocabulary with an in-memory backend, an
//! OS-directory backend and a logging decorator, plus the conversions a
//! wasmtime host needs to serve `wasi:filesystem` from any of them.

/// Errors, open flags, stat records and the filesystem/file traits
pub mod sys;

/// Guest path normalization
pub mod path;

/// In-memory backend
pub mod memfs;

/// Host directory backend
pub mod sysfs;

/// Logging decorator over any backend
pub mod logfs;

/// WASI preview 2 type conversions
pub mod wasi;

/// Serializable call scripts and their runner
pub mod script;

/// Utility functions
pub mod util;
