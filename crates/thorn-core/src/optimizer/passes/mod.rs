pub mod branch_optimization;
pub mod common_subexpression;
pub mod constant_folding;
pub mod dead_code;
pub mod function_inlining;
pub mod tail_call;
pub mod unreachable_code;

pub use branch_optimization::BranchOptimizationPass;
pub use common_subexpression::CommonSubexpressionEliminationPass;
pub use constant_folding::ConstantFoldingPass;
pub use dead_code::DeadCodeEliminationPass;
pub use function_inlining::FunctionInliningPass;
pub use tail_call::TailCallOptimizationPass;
pub use unreachable_code::UnreachableCodeEliminationPass;
