//! Public types for the Cuecard API.

mod context;
mod options;
mod result;

pub use context::{ProblemContext, StructuredContext};
pub use options::AnalyzeOptions;
pub use result::{AnalysisKind, AnalysisResult};
