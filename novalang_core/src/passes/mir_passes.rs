//! The default MIR-level pass (§4.6): dead-block elimination.

use crate::mir::{MirClass, MirFunction, MirProgram};

use super::{Analysis, ControlFlowGraph, MirPass};

/// Drops every basic block not reachable from a function's entry block.
/// Lowering never emits unreachable blocks on its own, but a pass earlier
/// in the pipeline (constant-folding turning `if (false) { ... }` into a
/// single branch, say) can leave one behind; this is the generic cleanup
/// for that, grounded on the same worklist-over-CFG shape the rest of the
/// pass framework uses for analysis.
pub struct DeadBlockElimination;

impl MirPass for DeadBlockElimination {
    fn name(&self) -> &'static str {
        "dead-block-elimination"
    }

    fn mutates_in_place(&self) -> bool {
        false
    }

    fn invalidates(&self) -> &'static [Analysis] {
        &[Analysis::ControlFlowGraph, Analysis::DominatorTree]
    }

    fn run(&self, program: MirProgram) -> MirProgram {
        MirProgram {
            functions: program.functions.into_iter().map(prune_function).collect(),
            classes: program.classes,
        }
    }
}

fn prune_function(mut function: MirFunction) -> MirFunction {
    let cfg = ControlFlowGraph::build(&function);
    let reachable = cfg.reachable_from(function.entry);
    function.blocks.retain(|b| reachable.contains(&b.id));
    function
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::{BasicBlock, BlockId, LocalId, MirSignature, Terminator};
    use crate::types::NovaType;

    fn block(id: u32, terminator: Terminator) -> BasicBlock {
        BasicBlock { id: BlockId(id), instructions: Vec::new(), terminator, landing_pad: None }
    }

    fn function_with(blocks: Vec<BasicBlock>) -> MirFunction {
        MirFunction {
            signature: MirSignature {
                name: "f".to_string(),
                param_types: Vec::new(),
                return_type: NovaType::unit(),
            },
            locals: Vec::new(),
            blocks,
            entry: BlockId(0),
        }
    }

    #[test]
    fn drops_a_block_unreachable_from_entry() {
        let function = function_with(vec![
            block(0, Terminator::Return(None)),
            block(1, Terminator::Return(Some(LocalId(0)))),
        ]);
        let program = MirProgram { functions: vec![function], classes: Vec::<MirClass>::new() };
        let pruned = DeadBlockElimination.run(program);
        assert_eq!(pruned.functions[0].blocks.len(), 1);
        assert_eq!(pruned.functions[0].blocks[0].id, BlockId(0));
    }

    #[test]
    fn keeps_every_block_reachable_through_a_branch() {
        let function = function_with(vec![
            block(0, Terminator::Branch { cond: LocalId(0), then_block: BlockId(1), else_block: BlockId(2) }),
            block(1, Terminator::Jump(BlockId(3))),
            block(2, Terminator::Jump(BlockId(3))),
            block(3, Terminator::Return(None)),
        ]);
        let program = MirProgram { functions: vec![function], classes: Vec::new() };
        let pruned = DeadBlockElimination.run(program);
        assert_eq!(pruned.functions[0].blocks.len(), 4);
    }
}
