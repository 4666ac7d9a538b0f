//! Domain models for the Hyperlocal Air Quality platform

mod forecast;
mod grid;
mod hotspot;
mod sensor;
mod stream;
mod symptom;

pub use forecast::*;
pub use grid::*;
pub use hotspot::*;
pub use sensor::*;
pub use stream::*;
pub use symptom::*;
