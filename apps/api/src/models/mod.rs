pub mod allotment;
pub mod preference;
pub mod session;
pub mod subject;
pub mod user;
