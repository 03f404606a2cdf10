pub mod generator;
pub mod pool;
pub mod ring;

// Re-export for stable paths
pub use generator::PressureGenerator;
pub use pool::{BufferPool, PoolStats};
pub use ring::Ring;

/// Fixed-size opaque payload cycled through the ring.
pub type Message = Vec<u8>;
