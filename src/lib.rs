//! gstrun - batch front-end for the gst subtitle translator
//!
//! Pairs subtitle and video files, builds `gst translate` invocations,
//! runs them one at a time with streamed output and cooperative
//! cancellation, and inserts a "Translated by" caption into the results.

pub mod batch;
pub mod cancel;
pub mod cli;
pub mod command;
pub mod config;
pub mod console;
pub mod error;
pub mod metadata;
pub mod pairing;
pub mod runner;
pub mod subtitle;
pub mod workflow;
