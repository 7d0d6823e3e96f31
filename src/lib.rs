pub mod api;
pub mod blocks;
pub mod config;
pub mod consts;
pub mod edit;
pub mod error;
pub mod merit;
pub mod objective;
pub mod optics;
pub mod surface;
pub mod system;
pub mod value;
pub mod variables;
// cmd and reports belong to the binary (see main.rs).
