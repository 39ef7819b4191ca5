pub mod export;
pub mod generation;
pub mod image_batch;
pub mod key_gate;
pub mod studio;
pub mod video_job;
