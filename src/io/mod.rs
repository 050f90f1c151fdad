pub mod alphaimpute;
pub mod params;

pub use alphaimpute::{LocusWindow, Record};
