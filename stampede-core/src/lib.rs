mod assertion;
mod config;
mod outcome;
mod session;
mod stats;
mod value;

pub use assertion::*;
pub use config::*;
pub use outcome::*;
pub use session::*;
pub use stats::*;
pub use value::*;
