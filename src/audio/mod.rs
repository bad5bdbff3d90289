pub mod analysis;
pub mod features;
pub mod framer;
pub mod onset;
pub mod pitch;
pub mod spectrum;
pub mod tempo;
