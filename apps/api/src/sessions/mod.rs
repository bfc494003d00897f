pub mod handlers;
pub mod scope;
