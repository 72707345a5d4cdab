pub mod catalog;
pub mod evaluator;
pub mod statistics;
pub mod units;
