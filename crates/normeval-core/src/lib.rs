pub mod annotation;
pub mod config;
pub mod engine;
pub mod errors;
pub mod judge;
pub mod model;
pub mod providers;
pub mod report;
pub mod scoring;
pub mod seed;
pub mod selector;
pub mod storage;
