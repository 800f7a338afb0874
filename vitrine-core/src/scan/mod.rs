//! Media discovery and change detection.

#[cfg(feature = "watch")]
pub mod fs_watch;
pub mod scanner;

pub use scanner::{
    DirectoryScanner, FileSystem, InMemoryFs, NoopScanObserver, RealFs, ScanObserver, ScanOutcome,
    ScanProgress,
};
