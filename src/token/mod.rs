//! Core token decision data structures

mod metadata;
mod merge;
mod stability;
mod waterfall;


pub use metadata::{ByteRange, DecisionType, PathLogic, SemanticEntropy, TokenDecisionMetadata};
pub(crate) use metadata::{is_byte_escape, is_unknown_marker};
pub use merge::{DiscardedAlternative, MergeOperation, MergePart};
pub use stability::{StabilityLevel, StabilityMetrics};
pub use waterfall::{LogicWaterfallData, StageLevel, WaterfallStage};
