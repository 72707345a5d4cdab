pub mod grid_locator;
pub mod grid_point;
