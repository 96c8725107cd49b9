//! Document persistence, publishing and the save workflow

pub mod config;
pub mod document;
pub mod error;
pub mod name;
pub mod publish;
pub mod session;
pub mod store;
pub mod surface;
pub mod template;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
