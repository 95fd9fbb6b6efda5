//! Library exports for the book-rental application
//!
//! This module exposes internal components for testing and potential library usage.

pub mod catalog;
pub mod database;
pub mod error;
pub mod fee;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod route;
