//! Shared fixtures for the live sync integration tests.

pub mod mock_studio;

pub use mock_studio::MockStudio;
