pub mod analyze;
pub mod channels;
pub mod config;
pub mod insight;
pub mod serve;
pub mod status;
