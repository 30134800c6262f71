//! NovaLang runtime contract crate.
//!
//! The stdlib's runtime implementations (collection operations, math,
//! concurrency primitives) are out of scope for the compiler core; this
//! crate holds only what the core and a runtime must agree on:
//!
//! - [`RuntimeError`] for errors raised while executing a compiled program
//! - [`registration::RegistrationCatalog`] and [`registration::Registration`],
//!   the stdlib registration metadata contract

pub mod error;
pub mod registration;

pub use error::{RuntimeError, RuntimeResult};
pub use registration::{Registration, RegistrationCatalog, VARIADIC};
