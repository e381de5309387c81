pub mod ask;
pub mod config;
pub mod doctor;
pub mod templates;
