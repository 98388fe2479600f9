pub mod cloud;
pub mod config;
pub mod geometry;
pub mod io;
pub mod output;
pub mod registration;
pub mod system;
pub mod tracking;
