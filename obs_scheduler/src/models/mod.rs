pub mod coordinates;
pub mod location;
pub mod time;

pub use coordinates::*;
pub use location::*;
pub use time::*;
