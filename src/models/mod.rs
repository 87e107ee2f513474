pub mod data_file;
pub mod enums;
pub mod filters;
pub mod prescription;
pub mod user;

pub use data_file::*;
pub use filters::*;
pub use prescription::*;
pub use user::*;
