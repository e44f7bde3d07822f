pub mod eval;
pub mod exec;
pub mod types;

pub use eval::*;
pub use exec::*;
pub use types::*;
