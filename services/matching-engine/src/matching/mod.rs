//! Matching logic module
//!
//! Implements the first-fit crossing sweep

pub mod crossing;
pub mod sweep;

pub use crossing::can_match;
pub use sweep::cross;
