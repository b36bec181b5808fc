pub mod certificate;
pub mod entity;
pub mod key;

pub use certificate::*;
pub use entity::*;
pub use key::*;
