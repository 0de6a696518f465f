pub mod ast;
pub mod config;
pub mod errors;
pub mod optimizer;

pub use ast::{Expression, Literal, Program, Statement};
pub use config::{OptimizationLevel, OptimizerOptions, PassSetting};
pub use errors::{OptimizeError, Result};
pub use optimizer::{
    OptimizationContext, OptimizationPass, OptimizationPipeline, Optimizer, PassOutcome,
    PassReport, PassType, PipelineOutcome,
};
