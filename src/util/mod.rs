//! Small, dependency-free numeric helpers.

mod pow2;

pub use pow2::{ceil_to_power_of_two, floor_to_power_of_two, is_power_of_two};
