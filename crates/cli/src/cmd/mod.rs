pub mod trigger;
pub mod validate;
