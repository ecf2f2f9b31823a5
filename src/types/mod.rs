//! Type definitions

pub mod plan;
pub mod request;
pub mod site;

pub use plan::*;
pub use request::*;
pub use site::*;
