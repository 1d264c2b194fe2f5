//! Core types and logic for the Patron donor-relationship tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the retention classifier and the donation-recording unit of work; storage
//! backends supply the transaction it runs in.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod donation;
pub mod donor;
pub mod error;
pub mod recorder;
pub mod retention;
pub mod store;

pub use error::{Error, Result};
