pub mod rescan;

pub use rescan::RescanJob;
