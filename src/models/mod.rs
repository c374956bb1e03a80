//! Domain types for the company aggregate.

pub mod company;

pub use company::*;
