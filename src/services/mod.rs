// src/services/mod.rs

pub mod offline_sync;
pub mod preflight;
pub mod review;
