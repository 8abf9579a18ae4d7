//! Seasonal-trend decomposition.

mod stl;

pub use stl::{Decomposition, Stl, StlComponents};
