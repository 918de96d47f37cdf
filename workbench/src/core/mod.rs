pub mod outcome;

pub use outcome::{Classification, ExecutionOutcome, Panel, RuntimeHint};
