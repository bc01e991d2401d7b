//! Pure rules shared by every fetch: backoff timing and the size heuristic.

mod integrity;
mod retry;

pub use integrity::check_min_size;
pub use retry::backoff_delay;
