pub mod config;
pub mod error;
pub mod geometry;
pub mod marker;
pub mod scene;
pub mod sync;
pub mod system;

#[cfg(test)]
mod test_utils;
