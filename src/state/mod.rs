pub mod calls;
pub mod ui;

pub use calls::*;
pub use ui::*;
