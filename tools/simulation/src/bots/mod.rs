//! Simulated market participants

pub mod taker;
