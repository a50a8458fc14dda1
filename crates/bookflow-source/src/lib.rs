//! `bookflow-source` — OpenLibrary search client and record normalizer.

pub mod client;
pub mod normalize;

pub use client::{BookSource, OpenLibraryClient};
pub use normalize::{normalize, RawDocument};
