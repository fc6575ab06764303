//! Image transformations (resize, grayscale, blur) executed on a fixed size
//! worker pool with a bounded queue.
//!
//! | Module | Role |
//! |--------|------|
//! | [`processing`] | Pixel buffers, operations, jobs, image store, filters and the worker pool |
//! | [`engine`] | Caller side: uploads, request decoding, submission, waiting with a timeout |
//! | [`config`] | Environment driven settings, pool sizing |
//! | [`validation`] | Upload checks and generated file names / job ids |

pub mod config;
pub mod engine;
pub mod processing;
pub mod validation;

#[cfg(test)]
pub(crate) mod tests_common;
