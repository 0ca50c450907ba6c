//! Network layer: the document fetch primitive and its error type.

pub mod fetch;
