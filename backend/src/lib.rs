pub mod config;
pub mod domain;
pub mod rest;
pub mod storage;
