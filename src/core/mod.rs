// src/core/mod.rs

pub mod cache;
pub mod command_builder;
pub mod paths;
pub mod registry;
