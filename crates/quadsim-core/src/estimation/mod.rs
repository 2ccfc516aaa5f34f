//! Attitude estimation

pub mod complementary;

pub use complementary::*;
