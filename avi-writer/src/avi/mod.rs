//! AVI 1.0 container sink.
//!
//! ```text
//! RIFF 'AVI '
//!   LIST 'hdrl'
//!     avih
//!     LIST 'strl' (per stream)  strh strf [strn]
//!   LIST 'movi'
//!     NNdc | NNdb | NNwb ...
//!   idx1
//! ```
//!
//! Counters in `avih` and every `strh` are rewritten on close.

mod file;
mod headers;
mod riff;
mod stream;
mod writer;

pub use writer::AviWriter;
