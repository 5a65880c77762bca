pub mod booking;
pub mod seat_grid;
pub mod selection;
pub mod sessions;
