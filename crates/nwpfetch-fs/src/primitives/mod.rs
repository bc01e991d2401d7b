pub mod atomic_write;

pub use atomic_write::{AtomicWriteOptions, atomic_write, remove_if_exists};
