pub mod crusher;
pub mod effect;
pub mod params;
