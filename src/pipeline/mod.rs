pub mod executor;
pub mod parser;

pub use executor::{run_step, run_step_file};
pub use parser::{load_step_file, validate_step, validate_step_file, StepFile};
