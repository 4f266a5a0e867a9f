//! LearnHub - An e-learning marketplace
//!
//! Courses with modules and lessons, purchase and enrollment, instructor
//! dashboards, a community blog, and user sync from an external auth provider.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
