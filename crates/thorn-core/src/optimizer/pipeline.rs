use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::ast::Statement;
use crate::errors::OptimizeError;
use crate::optimizer::context::OptimizationContext;
use crate::optimizer::pass::{OptimizationPass, PassReport, PassType};

/// What happened to one registered pass during a run.
#[derive(Debug, Clone)]
pub struct PassStatistics {
    pub name: &'static str,
    pub ran: bool,
    pub report: PassReport,
}

/// Result of a pipeline run: the final statements plus per-pass statistics
/// in execution order.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub statements: Vec<Statement>,
    pub statistics: Vec<PassStatistics>,
}

impl PipelineOutcome {
    pub fn passes_run(&self) -> usize {
        self.statistics.iter().filter(|s| s.ran).count()
    }
}

/// Runs registered passes in dependency order. Ordering is deterministic:
/// among passes whose dependencies are satisfied, analyses run before
/// transformations before cleanups, then cheaper before costlier, then by
/// name.
pub struct OptimizationPipeline {
    passes: IndexMap<&'static str, Box<dyn OptimizationPass>>,
}

impl OptimizationPipeline {
    pub fn new() -> Self {
        OptimizationPipeline {
            passes: IndexMap::new(),
        }
    }

    /// Register a pass. Registering a second pass with the same name
    /// replaces the first.
    pub fn register_pass(&mut self, pass: Box<dyn OptimizationPass>) {
        self.passes.insert(pass.name(), pass);
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn has_pass(&self, name: &str) -> bool {
        self.passes.contains_key(name)
    }

    /// Run every enabled pass over `statements` in dependency order.
    pub fn optimize(
        &self,
        statements: Vec<Statement>,
        context: &mut OptimizationContext,
    ) -> Result<PipelineOutcome, OptimizeError> {
        let order = self.execution_order()?;

        let mut current = statements;
        let mut statistics = Vec::with_capacity(order.len());

        for name in order {
            let pass = &self.passes[name];
            if !pass.should_run(context) {
                debug!(pass = name, "skipping pass");
                statistics.push(PassStatistics {
                    name,
                    ran: false,
                    report: PassReport::new(),
                });
                continue;
            }

            debug!(pass = name, "running pass");
            let outcome = pass.transform(&current, context)?;

            if context.validation_enabled()
                && !pass.validate(&current, &outcome.statements, context)
            {
                warn!(pass = name, "pass output failed validation");
            }

            if context.debug_mode() {
                for (metric, count) in outcome.report.metrics() {
                    debug!(pass = name, metric, count, "pass metric");
                }
            }

            current = outcome.statements;
            statistics.push(PassStatistics {
                name,
                ran: true,
                report: outcome.report,
            });
        }

        if context.debug_mode() {
            let run = statistics.iter().filter(|s| s.ran).count();
            let changed = statistics.iter().filter(|s| s.report.changed).count();
            debug!(
                passes_registered = self.passes.len(),
                passes_run = run,
                passes_changed = changed,
                "optimization pipeline finished"
            );
        }

        Ok(PipelineOutcome {
            statements: current,
            statistics,
        })
    }

    /// Topological order over the registered passes (Kahn's algorithm).
    /// Every declared dependency must itself be registered; a cycle or an
    /// unknown dependency is an error before any pass runs.
    fn execution_order(&self) -> Result<Vec<&'static str>, OptimizeError> {
        for pass in self.passes.values() {
            for dep in pass.dependencies() {
                if !self.passes.contains_key(dep) {
                    return Err(OptimizeError::UnknownDependency {
                        pass: pass.name().to_string(),
                        dependency: dep.to_string(),
                    });
                }
            }
        }

        let mut in_degree: FxHashMap<&'static str, usize> = self
            .passes
            .keys()
            .map(|name| (*name, 0usize))
            .collect();
        // dependents[d] lists the passes that declared a dependency on d.
        let mut dependents: FxHashMap<&'static str, Vec<&'static str>> = FxHashMap::default();
        for pass in self.passes.values() {
            for &dep in pass.dependencies() {
                if let Some(degree) = in_degree.get_mut(pass.name()) {
                    *degree += 1;
                }
                dependents.entry(dep).or_default().push(pass.name());
            }
        }

        let mut order = Vec::with_capacity(self.passes.len());
        let mut ready: Vec<&'static str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();

        while !ready.is_empty() {
            // Smallest scheduling key runs next.
            let next_index = ready
                .iter()
                .enumerate()
                .min_by_key(|(_, name)| self.schedule_key(name))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let name = ready.swap_remove(next_index);
            order.push(name);

            if let Some(deps) = dependents.get(name) {
                for &dependent in deps {
                    let degree = in_degree
                        .get_mut(dependent)
                        .ok_or_else(|| OptimizeError::DependencyCycle(dependent.to_string()))?;
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(dependent);
                    }
                }
            }
        }

        if order.len() != self.passes.len() {
            let stuck: Vec<&str> = self
                .passes
                .keys()
                .filter(|name| !order.contains(*name))
                .copied()
                .collect();
            return Err(OptimizeError::DependencyCycle(stuck.join(", ")));
        }

        Ok(order)
    }

    fn schedule_key(&self, name: &str) -> (PassType, u32, &str) {
        let pass = &self.passes[name];
        (pass.pass_type(), pass.estimated_cost(), pass.name())
    }
}

impl Default for OptimizationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expression;
    use crate::config::OptimizationLevel;
    use crate::errors::OptimizeError;
    use crate::optimizer::context::AnalysisKey;
    use crate::optimizer::pass::PassOutcome;

    static MARKS: AnalysisKey<Vec<&'static str>> = AnalysisKey::new("test-marks");

    struct MarkerPass {
        name: &'static str,
        pass_type: PassType,
        deps: &'static [&'static str],
        cost: u32,
    }

    impl OptimizationPass for MarkerPass {
        fn name(&self) -> &'static str {
            self.name
        }

        fn pass_type(&self) -> PassType {
            self.pass_type
        }

        fn dependencies(&self) -> &[&'static str] {
            self.deps
        }

        fn estimated_cost(&self) -> u32 {
            self.cost
        }

        fn transform(
            &self,
            statements: &[Statement],
            context: &mut OptimizationContext,
        ) -> Result<PassOutcome, OptimizeError> {
            let mut marks = context.cached_analysis(&MARKS).cloned().unwrap_or_default();
            marks.push(self.name);
            context.cache_analysis(&MARKS, marks);
            Ok(PassOutcome::unchanged(statements.to_vec()))
        }
    }

    fn marker(
        name: &'static str,
        pass_type: PassType,
        deps: &'static [&'static str],
    ) -> Box<MarkerPass> {
        Box::new(MarkerPass {
            name,
            pass_type,
            deps,
            cost: 1,
        })
    }

    fn run_order(pipeline: &OptimizationPipeline) -> Vec<&'static str> {
        let mut context = OptimizationContext::new(OptimizationLevel::O3);
        let outcome = pipeline.optimize(Vec::new(), &mut context).unwrap();
        assert!(outcome.statements.is_empty());
        context.cached_analysis(&MARKS).cloned().unwrap_or_default()
    }

    #[test]
    fn test_dependency_before_dependent() {
        let mut pipeline = OptimizationPipeline::new();
        pipeline.register_pass(marker("b", PassType::Transformation, &["a"]));
        pipeline.register_pass(marker("a", PassType::Transformation, &[]));
        assert_eq!(run_order(&pipeline), vec!["a", "b"]);
    }

    #[test]
    fn test_analysis_preferred_over_transformation() {
        let mut pipeline = OptimizationPipeline::new();
        pipeline.register_pass(marker("fold", PassType::Transformation, &[]));
        pipeline.register_pass(marker("cfg", PassType::Analysis, &[]));
        pipeline.register_pass(marker("sweep", PassType::Cleanup, &[]));
        assert_eq!(run_order(&pipeline), vec!["cfg", "fold", "sweep"]);
    }

    #[test]
    fn test_dependency_on_cleanup_outranks_type_grouping() {
        // A transformation that depends on a cleanup must still run after it.
        let mut pipeline = OptimizationPipeline::new();
        pipeline.register_pass(marker("inline", PassType::Transformation, &["sweep"]));
        pipeline.register_pass(marker("sweep", PassType::Cleanup, &[]));
        assert_eq!(run_order(&pipeline), vec!["sweep", "inline"]);
    }

    #[test]
    fn test_order_independent_of_registration() {
        let mut forward = OptimizationPipeline::new();
        forward.register_pass(marker("a", PassType::Transformation, &[]));
        forward.register_pass(marker("b", PassType::Transformation, &[]));
        forward.register_pass(marker("c", PassType::Analysis, &[]));

        let mut backward = OptimizationPipeline::new();
        backward.register_pass(marker("c", PassType::Analysis, &[]));
        backward.register_pass(marker("b", PassType::Transformation, &[]));
        backward.register_pass(marker("a", PassType::Transformation, &[]));

        assert_eq!(run_order(&forward), run_order(&backward));
    }

    #[test]
    fn test_unknown_dependency_fails_fast() {
        let mut pipeline = OptimizationPipeline::new();
        pipeline.register_pass(marker("b", PassType::Transformation, &["missing"]));
        let mut context = OptimizationContext::new(OptimizationLevel::O1);
        let err = pipeline.optimize(Vec::new(), &mut context).unwrap_err();
        match err {
            OptimizeError::UnknownDependency { pass, dependency } => {
                assert_eq!(pass, "b");
                assert_eq!(dependency, "missing");
            }
            other => panic!("expected UnknownDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_detected() {
        let mut pipeline = OptimizationPipeline::new();
        pipeline.register_pass(marker("a", PassType::Transformation, &["b"]));
        pipeline.register_pass(marker("b", PassType::Transformation, &["a"]));
        let mut context = OptimizationContext::new(OptimizationLevel::O1);
        let err = pipeline.optimize(Vec::new(), &mut context).unwrap_err();
        assert!(matches!(err, OptimizeError::DependencyCycle(_)));
    }

    #[test]
    fn test_last_registration_wins() {
        struct RenamingPass;
        impl OptimizationPass for RenamingPass {
            fn name(&self) -> &'static str {
                "a"
            }
            fn pass_type(&self) -> PassType {
                PassType::Transformation
            }
            fn transform(
                &self,
                _statements: &[Statement],
                _context: &mut OptimizationContext,
            ) -> Result<PassOutcome, OptimizeError> {
                Ok(PassOutcome::unchanged(vec![Statement::Expression(
                    Expression::number(1.0),
                )]))
            }
        }

        let mut pipeline = OptimizationPipeline::new();
        pipeline.register_pass(marker("a", PassType::Transformation, &[]));
        pipeline.register_pass(Box::new(RenamingPass));
        assert_eq!(pipeline.pass_count(), 1);

        let mut context = OptimizationContext::new(OptimizationLevel::O1);
        let outcome = pipeline.optimize(Vec::new(), &mut context).unwrap();
        assert_eq!(
            outcome.statements,
            vec![Statement::Expression(Expression::number(1.0))]
        );
    }

    #[test]
    fn test_disabled_pass_is_skipped() {
        let mut pipeline = OptimizationPipeline::new();
        pipeline.register_pass(marker("a", PassType::Transformation, &[]));
        pipeline.register_pass(marker("b", PassType::Transformation, &[]));
        let mut context = OptimizationContext::new(OptimizationLevel::O1);
        context.disable_pass("a");
        let outcome = pipeline.optimize(Vec::new(), &mut context).unwrap();
        assert_eq!(outcome.passes_run(), 1);
        assert_eq!(
            context.cached_analysis(&MARKS).cloned().unwrap(),
            vec!["b"]
        );
    }
}
