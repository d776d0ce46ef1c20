//! Tokenscope: Tokenizer Decision Analysis Middleware
//!
//! An instrumentation layer that replays tokenization as an observable
//! four-stage waterfall and scores the result for density, knowledge
//! coverage, retrieval alignment and cross-model agreement.
//!
//! # Core Concepts
//!
//! - **Waterfall**: byte, character, subword and fullword views of one text
//! - **Decisions**: per-token metadata with merge provenance and stability
//! - **Traces**: one immutable aggregate per analyzed query
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokenscope::{AnalysisMiddleware, AnalysisOptions, HeuristicProvider};
//!
//! # async fn run() -> Result<(), tokenscope::AnalysisError> {
//! let mut middleware = AnalysisMiddleware::new(Arc::new(HeuristicProvider::new()));
//! middleware.init("default").await?;
//! let trace = middleware.analyze("hello world", AnalysisOptions::new()).await?;
//! println!("{} tokens", trace.stats.token_count);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod capture;
pub mod compare;
pub mod density;
pub mod middleware;
pub mod retrieval;
pub mod token;

pub use adapter::{
    ChunkToken, EmbeddingError, EmbeddingProvider, HeuristicProvider, HeuristicTokenizer,
    RetrievedChunk, TokenizerAdapter, TokenizerError, TokenizerProvider,
};
pub use capture::{CaptureResult, DecisionCaptureEngine};
pub use compare::{
    ModelComparisonResult, ModelCrossValidator, ModelRecommendation, TokenizationDifference,
};
pub use density::{DensityCalculator, DensityResult, KnowledgeCoverage};
pub use middleware::{
    AnalysisConfig, AnalysisError, AnalysisMiddleware, AnalysisOptions, AnalysisResult,
    ProgressCallback, ProgressEvent, ProgressKind, QuickAnalysis, TraceContext, TraceStats,
    TraceWarning, WarningKind,
};
pub use retrieval::{RetrievalAlignment, RetrievalAlignmentMapper};
pub use token::{
    ByteRange, DecisionType, LogicWaterfallData, MergeOperation, StabilityLevel, StabilityMetrics,
    StageLevel, TokenDecisionMetadata, WaterfallStage,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
