pub mod coordinate;
pub mod estimate;
pub mod rider;
pub mod tracking;
