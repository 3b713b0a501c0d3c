// ir.rs — Arena-based mutable IR
//
// A small MLIR-shaped IR: operations with typed results, ordered attributes
// and nested regions of blocks. `IrContext` owns every entity and keeps use
// lists current across create / replace / erase, which is what the rewrite
// driver needs to swap an op for its replacement in place.
//
// Preconditions: ids passed in were produced by the same context.
// Postconditions: use lists reflect exactly the operands of live operations.
// Failure modes: structural misuse (erasing a used op, touching an erased
//   op) panics; these are invariant violations, not input errors.
// Side effects: none.

use crate::attr::{Attribute, NamedAttribute};
use crate::id::{BlockId, OpId, RegionId, ValueId};
use crate::location::Location;
use crate::types::Type;

// ── Use-chain ────────────────────────────────────────────────────────────

/// A single use of a value: the using operation and the operand slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: OpId,
    pub operand_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    OpResult(OpId, u32),
    BlockArg(BlockId, u32),
}

// ── Entity data ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ValueData {
    pub def: ValueDef,
    pub ty: Type,
    uses: Vec<Use>,
}

#[derive(Debug, Clone)]
pub struct OperationData {
    pub name: String,
    pub location: Location,
    pub operands: Vec<ValueId>,
    pub results: Vec<ValueId>,
    pub attributes: Vec<NamedAttribute>,
    pub regions: Vec<RegionId>,
    pub parent_block: Option<BlockId>,
}

impl OperationData {
    /// Dialect namespace: the text before the first `.` of the op name.
    pub fn dialect(&self) -> &str {
        self.name
            .split_once('.')
            .map_or(self.name.as_str(), |(dialect, _)| dialect)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlockData {
    pub args: Vec<ValueId>,
    pub ops: Vec<OpId>,
    pub parent_region: Option<RegionId>,
}

#[derive(Debug, Clone, Default)]
pub struct RegionData {
    pub blocks: Vec<BlockId>,
    pub parent_op: Option<OpId>,
}

// ── OperationState ───────────────────────────────────────────────────────

/// Everything needed to create an operation, collected builder-style.
#[derive(Debug, Clone)]
pub struct OperationState {
    pub name: String,
    pub location: Location,
    pub operands: Vec<ValueId>,
    pub result_types: Vec<Type>,
    pub attributes: Vec<NamedAttribute>,
    pub regions: Vec<RegionId>,
}

impl OperationState {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            location,
            operands: Vec::new(),
            result_types: Vec::new(),
            attributes: Vec::new(),
            regions: Vec::new(),
        }
    }

    pub fn operands(mut self, operands: impl IntoIterator<Item = ValueId>) -> Self {
        self.operands.extend(operands);
        self
    }

    pub fn results(mut self, types: impl IntoIterator<Item = Type>) -> Self {
        self.result_types.extend(types);
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: Attribute) -> Self {
        self.attributes.push(NamedAttribute::new(name, value));
        self
    }

    pub fn attributes(mut self, attrs: impl IntoIterator<Item = NamedAttribute>) -> Self {
        self.attributes.extend(attrs);
        self
    }

    pub fn regions(mut self, regions: impl IntoIterator<Item = RegionId>) -> Self {
        self.regions.extend(regions);
        self
    }
}

// ── IrContext ────────────────────────────────────────────────────────────

/// Owns all IR entities. Erased operations leave a tombstone so ids are
/// never reused.
#[derive(Debug, Clone, Default)]
pub struct IrContext {
    ops: Vec<Option<OperationData>>,
    values: Vec<ValueData>,
    blocks: Vec<BlockData>,
    regions: Vec<RegionData>,
}

impl IrContext {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Creation ──

    /// Create a detached block with one argument per type.
    pub fn create_block(&mut self, arg_types: impl IntoIterator<Item = Type>) -> BlockId {
        let block = BlockId::from_index(self.blocks.len());
        self.blocks.push(BlockData::default());
        let args: Vec<ValueId> = arg_types
            .into_iter()
            .enumerate()
            .map(|(i, ty)| self.push_value(ValueDef::BlockArg(block, i as u32), ty))
            .collect();
        self.blocks[block.index()].args = args;
        block
    }

    /// Create a region owning `blocks`.
    ///
    /// # Panics
    ///
    /// Panics if a block already belongs to another region.
    pub fn create_region(&mut self, blocks: Vec<BlockId>) -> RegionId {
        let region = RegionId::from_index(self.regions.len());
        for &b in &blocks {
            let data = &mut self.blocks[b.index()];
            assert!(
                data.parent_region.is_none(),
                "create_region: block {b:?} already belongs to a region"
            );
            data.parent_region = Some(region);
        }
        self.regions.push(RegionData {
            blocks,
            parent_op: None,
        });
        region
    }

    /// Create a detached operation, allocating its results and registering
    /// its operand uses. Attach it with `append_op` or `insert_op_before`.
    pub fn create_op(&mut self, state: OperationState) -> OpId {
        let op = OpId::from_index(self.ops.len());
        for &r in &state.regions {
            let data = &mut self.regions[r.index()];
            if let Some(existing) = data.parent_op {
                panic!("create_op: region {r:?} already belongs to operation {existing:?}");
            }
            data.parent_op = Some(op);
        }
        for (idx, &v) in state.operands.iter().enumerate() {
            self.values[v.index()].uses.push(Use {
                user: op,
                operand_index: idx as u32,
            });
        }
        let results = state
            .result_types
            .into_iter()
            .enumerate()
            .map(|(idx, ty)| self.push_value(ValueDef::OpResult(op, idx as u32), ty))
            .collect();
        self.ops.push(Some(OperationData {
            name: state.name,
            location: state.location,
            operands: state.operands,
            results,
            attributes: state.attributes,
            regions: state.regions,
            parent_block: None,
        }));
        op
    }

    fn push_value(&mut self, def: ValueDef, ty: Type) -> ValueId {
        let id = ValueId::from_index(self.values.len());
        self.values.push(ValueData {
            def,
            ty,
            uses: Vec::new(),
        });
        id
    }

    // ── Queries ──

    pub fn op(&self, op: OpId) -> &OperationData {
        match self.ops.get(op.index()) {
            Some(Some(data)) => data,
            Some(None) => panic!("operation {op:?} has been erased"),
            None => panic!("operation {op:?} does not exist"),
        }
    }

    fn op_mut(&mut self, op: OpId) -> &mut OperationData {
        match self.ops.get_mut(op.index()) {
            Some(Some(data)) => data,
            _ => panic!("operation {op:?} is not live"),
        }
    }

    pub fn is_live(&self, op: OpId) -> bool {
        matches!(self.ops.get(op.index()), Some(Some(_)))
    }

    pub fn value(&self, v: ValueId) -> &ValueData {
        &self.values[v.index()]
    }

    pub fn value_type(&self, v: ValueId) -> &Type {
        &self.values[v.index()].ty
    }

    pub fn uses(&self, v: ValueId) -> &[Use] {
        &self.values[v.index()].uses
    }

    pub fn block(&self, b: BlockId) -> &BlockData {
        &self.blocks[b.index()]
    }

    pub fn region(&self, r: RegionId) -> &RegionData {
        &self.regions[r.index()]
    }

    /// Number of live operations.
    pub fn num_ops(&self) -> usize {
        self.ops.iter().filter(|op| op.is_some()).count()
    }

    // ── Placement ──

    pub fn append_op(&mut self, block: BlockId, op: OpId) {
        self.attach(op, block);
        self.blocks[block.index()].ops.push(op);
    }

    /// Insert the detached `op` right before `anchor` in `anchor`'s block.
    pub fn insert_op_before(&mut self, anchor: OpId, op: OpId) {
        let block = self
            .op(anchor)
            .parent_block
            .unwrap_or_else(|| panic!("insert_op_before: anchor {anchor:?} is detached"));
        self.attach(op, block);
        let ops = &mut self.blocks[block.index()].ops;
        let pos = ops
            .iter()
            .position(|&o| o == anchor)
            .unwrap_or_else(|| panic!("insert_op_before: {anchor:?} missing from its block"));
        ops.insert(pos, op);
    }

    fn attach(&mut self, op: OpId, block: BlockId) {
        let data = self.op_mut(op);
        assert!(
            data.parent_block.is_none(),
            "operation {op:?} is already attached to a block"
        );
        data.parent_block = Some(block);
    }

    // ── Mutation ──

    /// Redirect every use of `from` to `to`.
    pub fn replace_all_uses(&mut self, from: ValueId, to: ValueId) {
        if from == to {
            return;
        }
        let uses = std::mem::take(&mut self.values[from.index()].uses);
        for u in &uses {
            self.op_mut(u.user).operands[u.operand_index as usize] = to;
        }
        self.values[to.index()].uses.extend(uses);
    }

    /// Replace each result of `op` with the matching result of `replacement`,
    /// then erase `op`.
    pub fn replace_op(&mut self, op: OpId, replacement: OpId) {
        let old = self.op(op).results.clone();
        let new = self.op(replacement).results.clone();
        assert_eq!(
            old.len(),
            new.len(),
            "replace_op: result count mismatch between {op:?} and {replacement:?}"
        );
        for (from, to) in old.into_iter().zip(new) {
            self.replace_all_uses(from, to);
        }
        self.erase_op(op);
    }

    /// Detach and delete `op` together with everything nested in its regions.
    ///
    /// # Panics
    ///
    /// Panics if a result of `op` or of a nested op is still used by an
    /// operation outside the erased subtree.
    pub fn erase_op(&mut self, op: OpId) {
        let mut subtree = Vec::new();
        self.collect_subtree(op, &mut subtree);

        for &o in &subtree {
            let operands = self.op(o).operands.clone();
            for (idx, v) in operands.into_iter().enumerate() {
                self.values[v.index()]
                    .uses
                    .retain(|u| !(u.user == o && u.operand_index == idx as u32));
            }
        }
        for &o in &subtree {
            for &r in &self.op(o).results {
                assert!(
                    self.values[r.index()].uses.is_empty(),
                    "erase_op: result {r:?} of {o:?} still has uses"
                );
            }
        }

        if let Some(block) = self.op(op).parent_block {
            self.blocks[block.index()].ops.retain(|&o| o != op);
        }
        for o in subtree {
            self.ops[o.index()] = None;
        }
    }

    fn collect_subtree(&self, op: OpId, out: &mut Vec<OpId>) {
        out.push(op);
        for &r in &self.op(op).regions {
            for &b in &self.regions[r.index()].blocks {
                for &nested in &self.blocks[b.index()].ops {
                    self.collect_subtree(nested, out);
                }
            }
        }
    }

    // ── Traversal ──

    /// All operations under `region` in post-order: an op's nested regions
    /// are visited before the op itself. The result is a snapshot, so the
    /// caller may mutate the IR while iterating it.
    pub fn walk_post_order(&self, region: RegionId) -> Vec<OpId> {
        let mut out = Vec::new();
        self.walk_region(region, &mut out);
        out
    }

    fn walk_region(&self, region: RegionId, out: &mut Vec<OpId>) {
        for &b in &self.regions[region.index()].blocks {
            for &op in &self.blocks[b.index()].ops {
                for &r in &self.op(op).regions {
                    self.walk_region(r, out);
                }
                out.push(op);
            }
        }
    }
}

// ── Module ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Func {
    pub name: String,
    pub result_types: Vec<Type>,
    /// Single-block region whose entry block arguments are the parameters.
    pub body: RegionId,
    pub location: Location,
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub ctx: IrContext,
    pub funcs: Vec<Func>,
}

impl Module {
    pub fn func(&self, name: &str) -> Option<&Func> {
        self.funcs.iter().find(|f| f.name == name)
    }

    /// Every live operation of every function, post-order per function.
    pub fn all_ops(&self) -> Vec<OpId> {
        self.funcs
            .iter()
            .flat_map(|f| self.ctx.walk_post_order(f.body))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ElementType, TensorType};

    fn f32_tensor() -> Type {
        Type::Tensor(TensorType::new(vec![Some(2)], "f32".parse::<ElementType>().unwrap()))
    }

    /// func(%arg0) { %0 = a(%arg0); %1 = b(%0); return(%1) }
    fn chain(ctx: &mut IrContext) -> (BlockId, OpId, OpId, OpId) {
        let block = ctx.create_block([f32_tensor()]);
        let arg = ctx.block(block).args[0];
        let a = ctx.create_op(
            OperationState::new("stablehlo.abs", Location::new(2, 5))
                .operands([arg])
                .results([f32_tensor()]),
        );
        ctx.append_op(block, a);
        let a_out = ctx.op(a).results[0];
        let b = ctx.create_op(
            OperationState::new("stablehlo.negate", Location::new(3, 5))
                .operands([a_out])
                .results([f32_tensor()]),
        );
        ctx.append_op(block, b);
        let b_out = ctx.op(b).results[0];
        let ret = ctx.create_op(OperationState::new("func.return", Location::new(4, 5)).operands([b_out]));
        ctx.append_op(block, ret);
        (block, a, b, ret)
    }

    #[test]
    fn create_op_registers_uses() {
        let mut ctx = IrContext::new();
        let (block, a, b, _) = chain(&mut ctx);
        let arg = ctx.block(block).args[0];
        assert_eq!(ctx.uses(arg), &[Use { user: a, operand_index: 0 }]);
        let a_out = ctx.op(a).results[0];
        assert_eq!(ctx.uses(a_out), &[Use { user: b, operand_index: 0 }]);
        assert_eq!(ctx.value(a_out).def, ValueDef::OpResult(a, 0));
    }

    #[test]
    fn dialect_is_prefix_before_first_dot() {
        let mut ctx = IrContext::new();
        let op = ctx.create_op(OperationState::new("stablehlo.custom.thing", Location::unknown()));
        assert_eq!(ctx.op(op).dialect(), "stablehlo");
        let bare = ctx.create_op(OperationState::new("nodot", Location::unknown()));
        assert_eq!(ctx.op(bare).dialect(), "nodot");
    }

    #[test]
    fn replace_op_moves_uses_and_erases() {
        let mut ctx = IrContext::new();
        let (block, a, b, _) = chain(&mut ctx);
        let arg = ctx.block(block).args[0];
        let replacement = ctx.create_op(
            OperationState::new("tfl.custom", Location::new(2, 5))
                .operands([arg])
                .results([f32_tensor()]),
        );
        ctx.insert_op_before(a, replacement);
        ctx.replace_op(a, replacement);

        assert!(!ctx.is_live(a));
        assert_eq!(ctx.block(block).ops[0], replacement);
        assert_eq!(ctx.block(block).ops.len(), 3);
        let new_out = ctx.op(replacement).results[0];
        assert_eq!(ctx.op(b).operands, vec![new_out]);
        // The erased op's use of %arg0 is gone; only the replacement's remains.
        assert_eq!(ctx.uses(arg), &[Use { user: replacement, operand_index: 0 }]);
    }

    #[test]
    #[should_panic(expected = "still has uses")]
    fn erasing_a_used_op_panics() {
        let mut ctx = IrContext::new();
        let (_, a, _, _) = chain(&mut ctx);
        ctx.erase_op(a);
    }

    #[test]
    fn erase_op_removes_nested_regions() {
        let mut ctx = IrContext::new();
        let outer = ctx.create_block([]);
        let inner = ctx.create_block([f32_tensor()]);
        let inner_arg = ctx.block(inner).args[0];
        let nested = ctx.create_op(OperationState::new("stablehlo.return", Location::unknown()).operands([inner_arg]));
        ctx.append_op(inner, nested);
        let region = ctx.create_region(vec![inner]);
        let parent = ctx.create_op(OperationState::new("stablehlo.reduce", Location::unknown()).regions([region]));
        ctx.append_op(outer, parent);

        ctx.erase_op(parent);
        assert!(!ctx.is_live(parent));
        assert!(!ctx.is_live(nested));
        assert!(ctx.uses(inner_arg).is_empty());
        assert!(ctx.block(outer).ops.is_empty());
        assert_eq!(ctx.num_ops(), 0);
    }

    #[test]
    fn walk_visits_nested_ops_first() {
        let mut ctx = IrContext::new();
        let outer = ctx.create_block([]);
        let inner = ctx.create_block([]);
        let nested = ctx.create_op(OperationState::new("stablehlo.return", Location::unknown()));
        ctx.append_op(inner, nested);
        let region = ctx.create_region(vec![inner]);
        let parent = ctx.create_op(OperationState::new("stablehlo.reduce", Location::unknown()).regions([region]));
        ctx.append_op(outer, parent);
        let after = ctx.create_op(OperationState::new("func.return", Location::unknown()));
        ctx.append_op(outer, after);
        let body = ctx.create_region(vec![outer]);

        assert_eq!(ctx.walk_post_order(body), vec![nested, parent, after]);
        assert_eq!(ctx.region(region).parent_op, Some(parent));
    }
}
