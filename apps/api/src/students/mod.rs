pub mod handlers;
pub mod import;
pub mod prefs;
