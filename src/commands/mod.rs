pub mod diary;
pub mod permissions;

pub use diary::*;
pub use permissions::*;
