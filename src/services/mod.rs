//! Application services between the HTTP routes and the repository

pub mod auth;
pub mod catalog;
pub mod movies;
pub mod search;
pub mod session;
pub mod simulation;
pub mod stats;
pub mod watchlist;

pub use session::SessionStore;
