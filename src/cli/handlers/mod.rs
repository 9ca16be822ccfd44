// src/cli/handlers/mod.rs

pub mod askpass;
pub mod cat;
pub mod commons;
pub mod config;
pub mod dialects;
pub mod exec;
pub mod info;
pub mod ls;
pub mod mkdir;
pub mod put;
pub mod rm;
pub mod roots;
pub mod script;
