use crate::ast::Statement;
use crate::config::OptimizationLevel;
use crate::errors::OptimizeError;
use crate::optimizer::context::OptimizationContext;

/// Scheduling category. The pipeline prefers running analyses before
/// transformations and transformations before cleanups whenever the
/// dependency graph leaves it a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PassType {
    Analysis,
    Transformation,
    Cleanup,
}

/// Per-invocation metrics a pass hands back alongside its output. Passes
/// hold no mutable state of their own, so one instance can serve any number
/// of sequential runs.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub changed: bool,
    metrics: Vec<(&'static str, u64)>,
}

impl PassReport {
    pub fn new() -> Self {
        PassReport::default()
    }

    pub fn record(&mut self, metric: &'static str, count: u64) {
        if count > 0 {
            self.changed = true;
        }
        match self.metrics.iter_mut().find(|(name, _)| *name == metric) {
            Some((_, existing)) => *existing += count,
            None => self.metrics.push((metric, count)),
        }
    }

    pub fn bump(&mut self, metric: &'static str) {
        self.record(metric, 1);
    }

    pub fn metric(&self, metric: &str) -> u64 {
        self.metrics
            .iter()
            .find(|(name, _)| *name == metric)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn metrics(&self) -> &[(&'static str, u64)] {
        &self.metrics
    }
}

/// What a pass returns: the rebuilt statement list plus its report.
#[derive(Debug)]
pub struct PassOutcome {
    pub statements: Vec<Statement>,
    pub report: PassReport,
}

impl PassOutcome {
    pub fn new(statements: Vec<Statement>, report: PassReport) -> Self {
        PassOutcome { statements, report }
    }

    /// An outcome that carries the input through unchanged.
    pub fn unchanged(statements: Vec<Statement>) -> Self {
        PassOutcome {
            statements,
            report: PassReport::new(),
        }
    }
}

pub trait OptimizationPass {
    /// Stable kebab-case identifier, also used in dependency declarations.
    fn name(&self) -> &'static str;

    fn pass_type(&self) -> PassType;

    fn minimum_level(&self) -> OptimizationLevel {
        OptimizationLevel::O1
    }

    /// Names of passes that must run before this one.
    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    /// Relative weight used to break scheduling ties (cheaper first).
    fn estimated_cost(&self) -> u32 {
        1
    }

    fn description(&self) -> &'static str {
        ""
    }

    /// Disabling always wins; force-enabling lifts the level gate.
    fn should_run(&self, context: &OptimizationContext) -> bool {
        if context.is_pass_disabled(self.name()) {
            return false;
        }
        context.level().includes(self.minimum_level()) || context.is_pass_enabled(self.name())
    }

    /// Rebuild the statement list. Total: a pass that finds nothing to do
    /// returns the input (rebuilt) with an empty report.
    fn transform(
        &self,
        statements: &[Statement],
        context: &mut OptimizationContext,
    ) -> Result<PassOutcome, OptimizeError>;

    /// Cheap structural sanity check on the pass's own output, consulted
    /// only when validation is enabled.
    fn validate(
        &self,
        _original: &[Statement],
        _optimized: &[Statement],
        _context: &OptimizationContext,
    ) -> bool {
        true
    }
}
