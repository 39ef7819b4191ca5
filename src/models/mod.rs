pub mod api;
pub mod image;
pub mod style;
pub mod upload;
pub mod video;
