use rustc_hash::FxHashSet;

use crate::ast::{IfStmt, Statement, WhileStmt};
use crate::errors::OptimizeError;
use crate::optimizer::context::{AnalysisKey, OptimizationContext};
use crate::optimizer::pass::{OptimizationPass, PassOutcome, PassReport, PassType};

pub static CONTROL_FLOW_GRAPH: AnalysisKey<ControlFlowGraph> =
    AnalysisKey::new("control-flow-graph");
pub static REACHABILITY: AnalysisKey<ReachabilityInfo> = AnalysisKey::new("reachability-info");
pub static LOOPS: AnalysisKey<LoopInfo> = AnalysisKey::new("loop-info");

pub type BlockId = usize;

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub statements: Vec<Statement>,
    pub successors: Vec<BlockId>,
    pub predecessors: Vec<BlockId>,
}

/// Statement-granularity control flow graph. Block 0 is the entry and block
/// 1 the exit; both are empty. A block with no predecessors (other than the
/// entry itself) is unreachable.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    pub blocks: Vec<BasicBlock>,
    pub entry: BlockId,
    pub exit: BlockId,
    /// (latch, header) pairs recorded while lowering loops.
    pub back_edges: Vec<(BlockId, BlockId)>,
}

impl ControlFlowGraph {
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

#[derive(Debug, Clone)]
pub struct ReachabilityInfo {
    pub reachable: FxHashSet<BlockId>,
    pub unreachable: FxHashSet<BlockId>,
}

impl ReachabilityInfo {
    pub fn is_reachable(&self, id: BlockId) -> bool {
        self.reachable.contains(&id)
    }
}

#[derive(Debug, Clone)]
pub struct NaturalLoop {
    pub header: BlockId,
    pub body: FxHashSet<BlockId>,
}

#[derive(Debug, Clone, Default)]
pub struct LoopInfo {
    pub loops: Vec<NaturalLoop>,
}

struct CfgBuilder {
    blocks: Vec<BasicBlock>,
    back_edges: Vec<(BlockId, BlockId)>,
}

impl CfgBuilder {
    fn new() -> Self {
        CfgBuilder {
            blocks: Vec::new(),
            back_edges: Vec::new(),
        }
    }

    fn new_block(&mut self) -> BlockId {
        let id = self.blocks.len();
        self.blocks.push(BasicBlock {
            id,
            statements: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
        });
        id
    }

    fn add_edge(&mut self, from: BlockId, to: BlockId) {
        if !self.blocks[from].successors.contains(&to) {
            self.blocks[from].successors.push(to);
        }
        if !self.blocks[to].predecessors.contains(&from) {
            self.blocks[to].predecessors.push(from);
        }
    }

    /// Lowers a statement sequence starting in `current`. Returns the block
    /// control falls out of, or `None` when every path has already left the
    /// sequence (returned or thrown).
    fn lower_sequence(
        &mut self,
        statements: &[Statement],
        exit: BlockId,
        mut current: BlockId,
    ) -> Option<BlockId> {
        let mut live = true;
        for stmt in statements {
            if !live {
                // Statements after a terminator land in a fresh block that
                // nothing points at; reachability marks it dead.
                current = self.new_block();
                live = true;
            }
            match stmt {
                Statement::Return(_) | Statement::Throw(_) => {
                    self.blocks[current].statements.push(stmt.clone());
                    self.add_edge(current, exit);
                    live = false;
                }
                Statement::If(IfStmt {
                    condition: _,
                    then_branch,
                    else_branch,
                }) => {
                    self.blocks[current].statements.push(stmt.clone());
                    let join = self.new_block();

                    let then_entry = self.new_block();
                    self.add_edge(current, then_entry);
                    let then_stmts = std::slice::from_ref(then_branch.as_ref());
                    if let Some(out) = self.lower_sequence(then_stmts, exit, then_entry) {
                        self.add_edge(out, join);
                    }

                    match else_branch {
                        Some(else_branch) => {
                            let else_entry = self.new_block();
                            self.add_edge(current, else_entry);
                            let else_stmts = std::slice::from_ref(else_branch.as_ref());
                            if let Some(out) = self.lower_sequence(else_stmts, exit, else_entry)
                            {
                                self.add_edge(out, join);
                            }
                        }
                        None => self.add_edge(current, join),
                    }
                    current = join;
                }
                Statement::While(WhileStmt { condition: _, body }) => {
                    let header = self.new_block();
                    self.blocks[header].statements.push(stmt.clone());
                    self.add_edge(current, header);

                    let body_entry = self.new_block();
                    self.add_edge(header, body_entry);
                    let body_stmts = std::slice::from_ref(body.as_ref());
                    if let Some(out) = self.lower_sequence(body_stmts, exit, body_entry) {
                        self.add_edge(out, header);
                        self.back_edges.push((out, header));
                    }

                    let after = self.new_block();
                    self.add_edge(header, after);
                    current = after;
                }
                Statement::Block(inner) => {
                    match self.lower_sequence(inner, exit, current) {
                        Some(out) => current = out,
                        None => live = false,
                    }
                }
                other => {
                    self.blocks[current].statements.push(other.clone());
                }
            }
        }
        if live {
            Some(current)
        } else {
            None
        }
    }
}

/// Build the CFG for a statement sequence.
pub fn build_cfg(statements: &[Statement]) -> ControlFlowGraph {
    let mut builder = CfgBuilder::new();
    let entry = builder.new_block();
    let exit = builder.new_block();
    let first = builder.new_block();
    builder.add_edge(entry, first);
    if let Some(out) = builder.lower_sequence(statements, exit, first) {
        builder.add_edge(out, exit);
    }
    ControlFlowGraph {
        blocks: builder.blocks,
        entry,
        exit,
        back_edges: builder.back_edges,
    }
}

/// Depth-first reachability from the entry block.
pub fn compute_reachability(cfg: &ControlFlowGraph) -> ReachabilityInfo {
    let mut reachable = FxHashSet::default();
    let mut stack = vec![cfg.entry];
    while let Some(id) = stack.pop() {
        if !reachable.insert(id) {
            continue;
        }
        for &succ in &cfg.blocks[id].successors {
            if !reachable.contains(&succ) {
                stack.push(succ);
            }
        }
    }
    let unreachable = cfg
        .blocks
        .iter()
        .map(|b| b.id)
        .filter(|id| !reachable.contains(id))
        .collect();
    ReachabilityInfo {
        reachable,
        unreachable,
    }
}

/// Natural loop detection. Loops only arise from `while` lowering, so the
/// recorded back edges name every (latch, header) pair; the body is the set
/// of blocks that can reach the latch without passing through the header.
pub fn detect_loops(cfg: &ControlFlowGraph) -> LoopInfo {
    let mut loops = Vec::new();
    for &(latch, header) in &cfg.back_edges {
        let mut body: FxHashSet<BlockId> = FxHashSet::default();
        body.insert(header);
        let mut stack = vec![latch];
        while let Some(id) = stack.pop() {
            if !body.insert(id) {
                continue;
            }
            for &pred in &cfg.blocks[id].predecessors {
                if !body.contains(&pred) {
                    stack.push(pred);
                }
            }
        }
        loops.push(NaturalLoop { header, body });
    }
    LoopInfo { loops }
}

/// Publishes the control flow graph, reachability sets, and loop inventory
/// for downstream passes. The statement list passes through unchanged.
pub struct ControlFlowAnalysisPass;

impl OptimizationPass for ControlFlowAnalysisPass {
    fn name(&self) -> &'static str {
        "control-flow-analysis"
    }

    fn pass_type(&self) -> PassType {
        PassType::Analysis
    }

    fn estimated_cost(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "Builds a control flow graph with reachability and loop information"
    }

    fn transform(
        &self,
        statements: &[Statement],
        context: &mut OptimizationContext,
    ) -> Result<PassOutcome, OptimizeError> {
        let cfg = build_cfg(statements);
        let reachability = compute_reachability(&cfg);
        let loops = detect_loops(&cfg);

        let mut report = PassReport::new();
        report.record("basic blocks", cfg.block_count() as u64);
        report.record("unreachable blocks", reachability.unreachable.len() as u64);
        report.record("loops detected", loops.loops.len() as u64);
        // Analysis output is new information, not a tree change.
        report.changed = false;

        context.cache_analysis(&CONTROL_FLOW_GRAPH, cfg);
        context.cache_analysis(&REACHABILITY, reachability);
        context.cache_analysis(&LOOPS, loops);

        Ok(PassOutcome::new(statements.to_vec(), report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expression;

    #[test]
    fn test_straight_line_graph() {
        let statements = vec![
            Statement::var("x", Expression::number(1.0)),
            Statement::var("y", Expression::number(2.0)),
        ];
        let cfg = build_cfg(&statements);
        let reach = compute_reachability(&cfg);
        assert!(reach.unreachable.is_empty());
        assert!(detect_loops(&cfg).loops.is_empty());
    }

    #[test]
    fn test_code_after_return_is_unreachable() {
        let statements = vec![
            Statement::Return(Some(Expression::number(1.0))),
            Statement::var("dead", Expression::number(2.0)),
        ];
        let cfg = build_cfg(&statements);
        let reach = compute_reachability(&cfg);
        assert!(!reach.unreachable.is_empty());
    }

    #[test]
    fn test_while_produces_loop() {
        let statements = vec![Statement::while_stmt(
            Expression::variable("go"),
            Statement::Expression(Expression::call(Expression::variable("step"), vec![])),
        )];
        let cfg = build_cfg(&statements);
        let loops = detect_loops(&cfg);
        assert_eq!(loops.loops.len(), 1);
        assert!(loops.loops[0].body.len() >= 2);
    }

    #[test]
    fn test_if_branches_join() {
        let statements = vec![
            Statement::if_stmt(
                Expression::variable("flag"),
                Statement::Expression(Expression::assign("x", Expression::number(1.0))),
                Some(Statement::Expression(Expression::assign(
                    "x",
                    Expression::number(2.0),
                ))),
            ),
            Statement::Return(Some(Expression::variable("x"))),
        ];
        let cfg = build_cfg(&statements);
        let reach = compute_reachability(&cfg);
        assert!(reach.unreachable.is_empty());
    }

    #[test]
    fn test_pass_caches_analyses() {
        use crate::config::OptimizationLevel;

        let mut context = OptimizationContext::new(OptimizationLevel::O1);
        let statements = vec![Statement::Return(None)];
        let pass = ControlFlowAnalysisPass;
        let outcome = pass.transform(&statements, &mut context).unwrap();
        assert_eq!(outcome.statements, statements);
        assert!(!outcome.report.changed);
        assert!(context.has_analysis(&CONTROL_FLOW_GRAPH));
        assert!(context.has_analysis(&REACHABILITY));
        assert!(context.has_analysis(&LOOPS));
    }
}
