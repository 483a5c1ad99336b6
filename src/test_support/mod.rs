//! Shared test doubles, compiled only for tests.

pub mod mocks;
