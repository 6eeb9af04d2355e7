pub mod access;
pub mod health;
pub mod media;
pub mod metrics;
pub mod video;
