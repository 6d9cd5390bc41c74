// src/utils/mod.rs

pub mod grade;
pub mod layout;
pub mod time;
