pub mod clock_service;
pub mod config;
pub mod device_ops;
pub mod pull_scheduler;
pub mod pull_sync;
pub mod push_receiver;
