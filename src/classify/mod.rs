pub mod classify_reads;
pub mod output;
pub mod score;

pub use classify_reads::ClassifyPipeline;
pub use output::ResumeState;
pub use score::{ReadScorer, ScoringParams};
