//! Size estimate used by the inline decision.

use super::expr::{ExprId, ExprKind};
use super::graph::IrGraph;
use crate::core::options::InlinePolicy;

/// Cost of expanding `e` at a call site, or `None` when it cannot be
/// expanded at all.
///
/// Only literals, runtime calls, field accesses and references to argument
/// or global cells qualify. Locals and captured cells belong to the callee's
/// frame, and anything sharing, storing or calling a procedure is rejected.
pub fn inline_cost(graph: &IrGraph<'_>, e: ExprId, policy: &InlinePolicy) -> Option<u32> {
    let node = graph.node(e);
    let children = || {
        node.args.iter().try_fold(0u32, |acc, &arg| {
            Some(acc.saturating_add(inline_cost(graph, arg, policy)?))
        })
    };

    match node.kind {
        ExprKind::NumberLiteral(_) => Some(policy.number_literal),
        ExprKind::PointerLiteral(_) => Some(policy.pointer_literal),
        ExprKind::RuntimeCall(_) => Some(children()?.saturating_add(policy.runtime_call)),
        ExprKind::CellRef(cell) => {
            let cell = graph.cell(cell);
            if cell.is_arg() || cell.is_global() {
                Some(policy.cell_ref)
            } else {
                None
            }
        }
        ExprKind::FieldAccess(info) => {
            let mut cost = children()?.saturating_add(policy.field_access);
            if info.checked {
                cost = cost.saturating_add(policy.field_check);
            }
            Some(cost)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::TargetKind;
    use crate::ir::cell::{Cell, CellRole, Declaration, VariableInfo};
    use crate::ir::expr::FieldAccessInfo;

    fn arg_cell(g: &mut IrGraph<'static>) -> crate::ir::cell::CellId {
        g.add_cell(Cell::new(
            0,
            CellRole::Arg,
            Some(Declaration { name: "a", node_id: 1 }),
            VariableInfo::default(),
        ))
    }

    #[test]
    fn test_add_one_cost() {
        let mut g = IrGraph::new(TargetKind::Native);
        let policy = InlinePolicy::default();
        let a = arg_cell(&mut g);
        let r = g.cell_ref(a);
        let one = g.numlit(1);
        let add = g.rtcall("numops::adds", vec![r, one]);

        // 8 + 2 + 2
        assert_eq!(inline_cost(&g, add, &policy), Some(12));
        assert!(12 <= policy.budget(1, TargetKind::Native));
    }

    #[test]
    fn test_checked_field_costs_more() {
        let mut g = IrGraph::new(TargetKind::Native);
        let policy = InlinePolicy::default();
        let a = arg_cell(&mut g);
        let r = g.cell_ref(a);
        let plain = g.field_access(r, FieldAccessInfo { name: "x", index: 0, checked: false });
        let r2 = g.cell_ref(a);
        let checked = g.field_access(r2, FieldAccessInfo { name: "x", index: 0, checked: true });

        assert_eq!(inline_cost(&g, plain, &policy), Some(4));
        assert_eq!(inline_cost(&g, checked, &policy), Some(8));
    }

    #[test]
    fn test_rejected_shapes() {
        let mut g = IrGraph::new(TargetKind::Native);
        let policy = InlinePolicy::default();
        let local = g.add_cell(Cell::new(
            0,
            CellRole::Local,
            Some(Declaration { name: "t", node_id: 2 }),
            VariableInfo::default(),
        ));
        let r = g.cell_ref(local);
        assert_eq!(inline_cost(&g, r, &policy), None);

        let call = g.rtcall("f", vec![]);
        let shared = g.shared(call);
        let outer = g.rtcall("g", vec![shared]);
        assert_eq!(inline_cost(&g, outer, &policy), None);

        let one = g.numlit(1);
        let seq = g.sequence(vec![one]);
        assert_eq!(inline_cost(&g, seq, &policy), None);
    }
}
