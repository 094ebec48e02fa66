pub mod context;
pub mod drug;
pub mod enums;

pub use context::*;
pub use drug::*;
pub use enums::*;
