mod padded;

pub use padded::*;
