mod generator;
mod layout;
mod status;
#[cfg(test)]
mod tests;

pub use generator::*;
pub use layout::*;
pub use status::*;
