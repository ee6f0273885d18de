pub mod probe;
pub mod run;
pub mod scan;

// Re-export command functions for convenience
pub use probe::probe;
pub use run::{run, RunArgs};
pub use scan::scan;
