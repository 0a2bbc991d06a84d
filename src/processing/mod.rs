//! Processing module serializing access to the generator

mod queue;

pub use queue::GenerationQueue;
