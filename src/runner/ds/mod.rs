pub mod env_record;
pub mod error;
pub mod function_object;
pub mod guid;
pub mod object;
pub mod object_property;
pub mod value;
