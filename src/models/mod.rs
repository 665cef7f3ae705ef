pub mod call;
pub mod number;

pub use call::*;
pub use number::*;
