pub mod dates;
pub mod json;
pub mod money;
