pub mod design;
pub mod validate;
