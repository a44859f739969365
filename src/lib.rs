#![forbid(unsafe_code)]

//! Resolve a bilibili.tv page link, download the chosen video quality and the
//! audio track, and mux both into one mp4 with ffmpeg.

pub mod bilibili;
pub mod config;
pub mod cookies;
pub mod download;
pub mod ffmpeg;
pub mod link;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod traits;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use pipeline::{Pipeline, PipelineFailure, Stage};
