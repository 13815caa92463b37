//! Mock collaborators and fixtures shared by the Wozif test suites.

mod fixtures;
mod mocks;

pub use fixtures::*;
pub use mocks::*;
