//! The pass framework (§4.6): two ordered registries — one for HIR, one
//! for MIR — plus a query interface so a pass can ask for a lazily
//! computed analysis (a function's CFG successor map, say) without
//! recomputing it on every query.
//!
//! Grounded on the teacher's `compile/ipo/{worklist,call_graph}.rs`: a
//! worklist-style driver that keeps its own cache rather than trusting
//! every caller to recompute from scratch.

pub mod hir_passes;
pub mod mir_passes;

use std::collections::{HashMap, HashSet};

use crate::hir::HirProgram;
use crate::mir::{BlockId, MirFunction, MirProgram, Terminator};

/// A cached analysis a pass may invalidate (§9 Open Question 2: "each
/// pass declares its invalidates() set explicitly").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Analysis {
    ControlFlowGraph,
    DominatorTree,
    FreeVariableSets,
}

/// A single HIR-level pass (§4.6): named, declares whether it mutates its
/// input in place or produces a new tree, and which cached analyses it
/// invalidates.
pub trait HirPass {
    fn name(&self) -> &'static str;
    fn mutates_in_place(&self) -> bool;
    fn invalidates(&self) -> &'static [Analysis];
    fn run(&self, program: HirProgram) -> HirProgram;
}

pub trait MirPass {
    fn name(&self) -> &'static str;
    fn mutates_in_place(&self) -> bool;
    fn invalidates(&self) -> &'static [Analysis];
    fn run(&self, program: MirProgram) -> MirProgram;
}

/// Tracks which cached analyses are still valid after the passes run so
/// far (§4.6 "exposes a query interface ... without recomputing it each
/// time"). A pass's declared `invalidates()` set is applied after it
/// runs; a query that finds its analysis invalid recomputes and
/// revalidates it.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    valid: HashSet<Analysis>,
    cfgs: HashMap<String, ControlFlowGraph>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn invalidate(&mut self, analyses: &[Analysis]) {
        for a in analyses {
            self.valid.remove(a);
            if matches!(a, Analysis::ControlFlowGraph | Analysis::DominatorTree) {
                self.cfgs.clear();
            }
        }
    }

    /// The CFG successor map for `function`, computing and caching it on
    /// first request (§4.6).
    pub fn cfg_of<'a>(&'a mut self, function: &MirFunction) -> &'a ControlFlowGraph {
        if !self.valid.contains(&Analysis::ControlFlowGraph) {
            self.cfgs.clear();
            self.valid.insert(Analysis::ControlFlowGraph);
        }
        self.cfgs
            .entry(function.signature.name.clone())
            .or_insert_with(|| ControlFlowGraph::build(function))
    }
}

/// A function's successor map, built once per [`AnalysisCache`]
/// invalidation cycle rather than walked ad hoc by every consumer.
#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    successors: HashMap<BlockId, Vec<BlockId>>,
}

impl ControlFlowGraph {
    pub fn build(function: &MirFunction) -> Self {
        let mut successors = HashMap::new();
        for block in &function.blocks {
            successors.insert(block.id, terminator_successors(&block.terminator));
        }
        Self { successors }
    }

    pub fn successors(&self, block: BlockId) -> &[BlockId] {
        self.successors.get(&block).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Every block reachable from `entry`, including `entry` itself.
    pub fn reachable_from(&self, entry: BlockId) -> HashSet<BlockId> {
        let mut seen = HashSet::new();
        let mut stack = vec![entry];
        while let Some(b) = stack.pop() {
            if seen.insert(b) {
                stack.extend(self.successors(b).iter().copied());
            }
        }
        seen
    }
}

fn terminator_successors(term: &Terminator) -> Vec<BlockId> {
    match term {
        Terminator::Return(_) | Terminator::Throw(_) => Vec::new(),
        Terminator::Jump(b) => vec![*b],
        Terminator::Branch { then_block, else_block, .. } => vec![*then_block, *else_block],
        Terminator::Switch { cases, default, .. } => {
            let mut targets: Vec<BlockId> = cases.iter().map(|(_, b)| *b).collect();
            targets.push(*default);
            targets
        }
        Terminator::Unwind { landing_pad } => vec![*landing_pad],
    }
}

/// Runs a fixed, declared-order sequence of HIR passes over a program,
/// invalidating the shared [`AnalysisCache`] after each one per its
/// declared `invalidates()` set.
pub struct HirPassManager {
    passes: Vec<Box<dyn HirPass>>,
}

impl Default for HirPassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HirPassManager {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    pub fn register(&mut self, pass: Box<dyn HirPass>) -> &mut Self {
        self.passes.push(pass);
        self
    }

    /// Names in declared-run order, for tests that assert the registry's
    /// shape (§4.6 "observable through a testable registry").
    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn run_all(&self, mut program: HirProgram, cache: &mut AnalysisCache) -> HirProgram {
        for pass in &self.passes {
            program = pass.run(program);
            cache.invalidate(pass.invalidates());
        }
        program
    }
}

pub struct MirPassManager {
    passes: Vec<Box<dyn MirPass>>,
}

impl Default for MirPassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MirPassManager {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    pub fn register(&mut self, pass: Box<dyn MirPass>) -> &mut Self {
        self.passes.push(pass);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn run_all(&self, mut program: MirProgram, cache: &mut AnalysisCache) -> MirProgram {
        for pass in &self.passes {
            program = pass.run(program);
            cache.invalidate(pass.invalidates());
        }
        program
    }
}

/// The default pipeline (§4.6): HIR — inline-expansion, constant-folding,
/// dead-code-elimination, in that order; MIR — dead-block elimination.
pub fn default_hir_pipeline() -> HirPassManager {
    let mut mgr = HirPassManager::new();
    mgr.register(Box::new(hir_passes::InlineExpansion))
        .register(Box::new(hir_passes::ConstantFolding))
        .register(Box::new(hir_passes::DeadCodeElimination));
    mgr
}

pub fn default_mir_pipeline() -> MirPassManager {
    let mut mgr = MirPassManager::new();
    mgr.register(Box::new(mir_passes::DeadBlockElimination));
    mgr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_hir_pipeline_runs_in_declared_order() {
        let mgr = default_hir_pipeline();
        assert_eq!(
            mgr.names(),
            vec!["inline-expansion", "constant-folding", "dead-code-elimination"]
        );
    }

    #[test]
    fn default_mir_pipeline_runs_dead_block_elimination() {
        let mgr = default_mir_pipeline();
        assert_eq!(mgr.names(), vec!["dead-block-elimination"]);
    }
}
