#![cfg(not(doctest))]

#[macro_use]
extern crate diesel;

pub mod billing;
pub mod db;
pub mod email;
pub mod erasure;
pub mod jobs;
pub mod models;
pub mod registry;
pub mod schema;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
