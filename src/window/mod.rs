pub mod day_of_year;
pub mod selector;
