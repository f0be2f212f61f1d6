pub mod annotate;
pub mod camera;
pub mod cascade;
pub mod cli;
pub mod display;
pub mod error;
pub mod session;
pub mod webcam;
