pub mod api;
pub mod checkout;
pub mod config;
pub mod course;
pub mod errors;
pub mod flags;
pub mod models;
pub mod upload;

pub use api::*;
pub use checkout::*;
pub use config::*;
pub use course::*;
pub use errors::*;
pub use flags::*;
pub use models::*;
pub use upload::*;
