//! Source-to-source optimizer. Passes rewrite the AST without changing
//! observable behavior; the pipeline schedules them by declared
//! dependencies and shares analysis results through a typed context.

pub mod context;
pub mod control_flow;
pub mod pass;
pub mod passes;
pub mod pipeline;

use tracing::debug;

use crate::ast::{Program, Statement};
use crate::config::{OptimizationLevel, OptimizerOptions};
use crate::errors::OptimizeError;

pub use context::{AnalysisKey, OptimizationContext};
pub use control_flow::{
    ControlFlowAnalysisPass, ControlFlowGraph, LoopInfo, ReachabilityInfo,
};
pub use pass::{OptimizationPass, PassOutcome, PassReport, PassType};
pub use passes::{
    BranchOptimizationPass, CommonSubexpressionEliminationPass, ConstantFoldingPass,
    DeadCodeEliminationPass, FunctionInliningPass, TailCallOptimizationPass,
    UnreachableCodeEliminationPass,
};
pub use pipeline::{OptimizationPipeline, PassStatistics, PipelineOutcome};

/// High-level entry point: builds the standard pipeline once and runs it
/// with a fresh context per program.
pub struct Optimizer {
    options: OptimizerOptions,
    pipeline: OptimizationPipeline,
}

impl Optimizer {
    pub fn new(options: OptimizerOptions) -> Self {
        Optimizer {
            options,
            pipeline: default_pipeline(),
        }
    }

    pub fn with_level(level: OptimizationLevel) -> Self {
        Self::new(OptimizerOptions::with_level(level))
    }

    pub fn options(&self) -> &OptimizerOptions {
        &self.options
    }

    pub fn pipeline_mut(&mut self) -> &mut OptimizationPipeline {
        &mut self.pipeline
    }

    /// Optimize a whole program. At O0 the input comes back untouched and
    /// no pass is consulted.
    pub fn optimize(&self, program: Program) -> Result<Program, OptimizeError> {
        if self.options.level == OptimizationLevel::O0 {
            return Ok(program);
        }

        let outcome = self.optimize_statements(program.statements)?;
        Ok(Program {
            statements: outcome.statements,
        })
    }

    /// Same as [`optimize`](Self::optimize) but exposes per-pass statistics.
    pub fn optimize_statements(
        &self,
        statements: Vec<Statement>,
    ) -> Result<PipelineOutcome, OptimizeError> {
        if self.options.level == OptimizationLevel::O0 {
            return Ok(PipelineOutcome {
                statements,
                statistics: Vec::new(),
            });
        }

        let mut context = self.options.build_context();
        let outcome = self.pipeline.optimize(statements, &mut context)?;
        if self.options.debug {
            debug!(
                level = %self.options.level,
                passes_run = outcome.passes_run(),
                "optimizer finished"
            );
        }
        Ok(outcome)
    }
}

/// The standard pass set. Callers can add or replace passes through
/// [`Optimizer::pipeline_mut`].
pub fn default_pipeline() -> OptimizationPipeline {
    let mut pipeline = OptimizationPipeline::new();
    pipeline.register_pass(Box::new(ControlFlowAnalysisPass));
    pipeline.register_pass(Box::new(ConstantFoldingPass));
    pipeline.register_pass(Box::new(BranchOptimizationPass));
    pipeline.register_pass(Box::new(CommonSubexpressionEliminationPass));
    pipeline.register_pass(Box::new(TailCallOptimizationPass));
    pipeline.register_pass(Box::new(FunctionInliningPass));
    pipeline.register_pass(Box::new(UnreachableCodeEliminationPass));
    pipeline.register_pass(Box::new(DeadCodeEliminationPass));
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Expression};

    #[test]
    fn test_default_pipeline_registers_all_passes() {
        let pipeline = default_pipeline();
        assert_eq!(pipeline.pass_count(), 8);
        assert!(pipeline.has_pass("control-flow-analysis"));
        assert!(pipeline.has_pass("constant-folding"));
        assert!(pipeline.has_pass("branch-optimization"));
        assert!(pipeline.has_pass("common-subexpression-elimination"));
        assert!(pipeline.has_pass("tail-call-optimization"));
        assert!(pipeline.has_pass("function-inlining"));
        assert!(pipeline.has_pass("unreachable-code-elimination"));
        assert!(pipeline.has_pass("dead-code-elimination"));
    }

    #[test]
    fn test_o0_returns_input_unchanged() {
        let program = Program {
            statements: vec![Statement::Expression(Expression::binary(
                Expression::number(1.0),
                BinaryOp::Add,
                Expression::number(2.0),
            ))],
        };
        let optimizer = Optimizer::with_level(OptimizationLevel::O0);
        let result = optimizer.optimize(program.clone()).unwrap();
        assert_eq!(result.statements, program.statements);
    }

    #[test]
    fn test_o1_folds_constants() {
        let program = Program {
            statements: vec![
                Statement::var(
                    "x",
                    Expression::binary(
                        Expression::number(1.0),
                        BinaryOp::Add,
                        Expression::number(2.0),
                    ),
                ),
                Statement::Return(Some(Expression::variable("x"))),
            ],
        };
        let optimizer = Optimizer::with_level(OptimizationLevel::O1);
        let result = optimizer.optimize(program).unwrap();
        assert_eq!(
            result.statements[0],
            Statement::var("x", Expression::number(3.0))
        );
    }
}
