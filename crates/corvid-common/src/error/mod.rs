//! Error classification

mod kind;

pub use kind::{Classify, ErrorKind};
