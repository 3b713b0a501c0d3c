// pass.rs — Pass table for the legalizer: descriptors, dependency edges, artifacts
//
// Declares the two passes run after parsing (parse is outside the runner),
// their dependency edges, and the artifacts they produce. The pipeline runner
// uses this to run the minimal pass subset for each --emit target.

use std::collections::HashSet;

use crate::legalize::{PASS_ARGUMENT, PASS_DESCRIPTION};

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Passes the runner knows about. Parsing happens before the runner starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Resolve,
    Legalize,
}

impl PassId {
    pub fn name(self) -> &'static str {
        descriptor(self).name
    }
}

/// Machine-readable artifact identifiers. Each maps to a field of the
/// compilation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Module,   // Module
    Rewrites, // Vec<RewriteRecord>
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a pass.
pub struct PassDescriptor {
    /// Pass argument, used in log output.
    pub name: &'static str,
    pub description: &'static str,
    /// Passes whose outputs this pass consumes.
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// What invalidates this pass's output.
    pub invalidation_key: &'static str,
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Resolve => PassDescriptor {
            name: "resolve",
            description: "Resolve SSA names and build the IR.",
            inputs: &[],
            outputs: &[ArtifactId::Module],
            invalidation_key: "source",
            invariants: "every operand bound to one definition, types agree",
        },
        PassId::Legalize => PassDescriptor {
            name: PASS_ARGUMENT,
            description: PASS_DESCRIPTION,
            inputs: &[PassId::Resolve],
            outputs: &[ArtifactId::Module, ArtifactId::Rewrites],
            invalidation_key: "module + legalize config",
            invariants: "no live source-dialect op remains",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 2] = [PassId::Resolve, PassId::Legalize];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_passes_legalize_includes_resolve() {
        assert_eq!(
            required_passes(PassId::Legalize),
            vec![PassId::Resolve, PassId::Legalize]
        );
    }

    #[test]
    fn required_passes_resolve_is_minimal() {
        assert_eq!(required_passes(PassId::Resolve), vec![PassId::Resolve]);
    }

    #[test]
    fn legalize_pass_registration() {
        let desc = descriptor(PassId::Legalize);
        assert_eq!(desc.name, "stablehlo-tfl");
        assert_eq!(desc.description, "Legalize StableHLO ops to TFLite custom ops.");
    }

    #[test]
    fn all_descriptors_have_outputs() {
        for pass in &ALL_PASSES {
            assert!(
                !descriptor(*pass).outputs.is_empty(),
                "pass {:?} has no outputs declared",
                pass
            );
        }
    }

    #[test]
    fn dependency_edges_are_consistent() {
        for pass in &ALL_PASSES {
            let order = required_passes(*pass);
            for dep in descriptor(*pass).inputs {
                let dep_pos = order.iter().position(|p| p == dep);
                let self_pos = order.iter().position(|p| p == pass);
                assert!(
                    dep_pos.unwrap() < self_pos.unwrap(),
                    "{:?} depends on {:?} but it comes later in topological order",
                    pass,
                    dep
                );
            }
        }
    }
}
