pub mod decode;
pub mod emission;
pub mod hmm;
pub mod io;
pub mod library;
pub mod model;
pub mod observation;
pub mod progress;
pub mod sample;
pub mod utils;

pub use library::HaplotypeLibrary;
pub use model::{CallingMethod, Decoder, DiploidHmm, HmmOutput};
pub use observation::{Observation, Rate};
