//! Data structures for band samples.
//!
//! This module contains the decoded sample type, the per-session sequencer
//! that rebases and deduplicates readings, and the session value itself.

pub mod sample;
pub mod sequencer;
pub mod session;

pub use sample::Sample;
pub use sequencer::{Rejected, SampleSequencer};
pub use session::{Session, SessionStats};
