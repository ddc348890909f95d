pub mod error;
pub mod problem;
pub mod schedule;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;
