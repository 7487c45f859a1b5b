//! Dependency scheduler.
//!
//! Orders equations so that each one comes after every equation it reads
//! combinationally. Registers and memories break cycles: a `REG` reads the
//! value captured on the previous step, and a `RAM` output depends only on
//! its read address. The operands feeding their state updates are still
//! scheduled, as extra roots after the outputs.
//!
//! Edges of the dependency graph point from an equation's destination to
//! the variables it reads.

use std::collections::HashMap;

use indexmap::IndexSet;
use log::{debug, info};
use petgraph::algo::{astar, kosaraju_scc};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::DfsPostOrder;

use crate::error::CoreError;
use crate::netlist::Netlist;
use crate::symbols::{BusId, SymbolTable};
use crate::typecheck::{Equation, Expression};
use crate::types::Opcode;

/// Variables an expression reads within the current step.
pub fn combinational_inputs(expr: &Expression, symbols: &SymbolTable) -> Vec<BusId> {
    let candidates = match expr.opcode() {
        Opcode::Reg => &expr.args()[..0],
        Opcode::Ram => &expr.args()[..1],
        _ => expr.args(),
    };
    let mut deps: Vec<BusId> = Vec::with_capacity(candidates.len());
    for &id in candidates {
        if symbols.is_var(id) && !deps.contains(&id) {
            deps.push(id);
        }
    }
    deps
}

/// Operands that only feed a state update: the `REG` operand and the `RAM`
/// write enable, write address and write data.
pub fn state_inputs(expr: &Expression) -> &[BusId] {
    match expr.opcode() {
        Opcode::Reg => &expr.args()[..1],
        Opcode::Ram => &expr.args()[1..],
        _ => &[],
    }
}

/// Returns the equations in a valid single-pass evaluation order.
///
/// Equations that neither an output nor a state update needs are left out.
pub fn schedule(netlist: &Netlist) -> Result<Vec<&Equation>, CoreError> {
    let symbols = netlist.symbols();

    let mut drivers = HashMap::with_capacity(netlist.equations().len());
    let mut graph: DiGraphMap<BusId, ()> = DiGraphMap::new();
    let mut forced = IndexSet::new();
    for (index, eq) in netlist.equations().iter().enumerate() {
        if netlist.is_input(eq.dest()) || drivers.insert(eq.dest(), index).is_some() {
            return Err(CoreError::Redefinition(netlist.name(eq.dest())));
        }
        graph.add_node(eq.dest());
        for dep in combinational_inputs(eq.expr(), symbols) {
            graph.add_edge(eq.dest(), dep, ());
        }
        forced.extend(
            state_inputs(eq.expr())
                .iter()
                .copied()
                .filter(|&id| symbols.is_var(id)),
        );
    }

    let roots: Vec<BusId> = netlist.outputs().iter().chain(&forced).copied().collect();
    for &root in &roots {
        graph.add_node(root);
    }

    let mut postorder = Vec::with_capacity(graph.node_count());
    let mut dfs = DfsPostOrder::empty(&graph);
    for &root in &roots {
        dfs.move_to(root);
        while let Some(bus) = dfs.next(&graph) {
            if !netlist.is_input(bus) && !drivers.contains_key(&bus) {
                return Err(CoreError::UndeclaredVariable(netlist.name(bus)));
            }
            postorder.push(bus);
        }
    }

    let position: HashMap<BusId, usize> = postorder
        .iter()
        .enumerate()
        .map(|(index, &bus)| (bus, index))
        .collect();
    let cycle = kosaraju_scc(&graph)
        .into_iter()
        .filter(|component| position.contains_key(&component[0]))
        .filter(|component| {
            component.len() > 1 || graph.contains_edge(component[0], component[0])
        })
        .min_by_key(|component| {
            component
                .iter()
                .filter_map(|bus| position.get(bus))
                .min()
                .copied()
        });
    if let Some(component) = cycle {
        return Err(cycle_error(netlist, &graph, &component, &position));
    }

    let mut order = Vec::with_capacity(drivers.len());
    for bus in postorder {
        if let Some(&index) = drivers.get(&bus) {
            order.push(&netlist.equations()[index]);
            debug!(
                "{}/{} scheduled `{}`",
                order.len(),
                drivers.len(),
                netlist.name(bus)
            );
        }
    }

    info!(
        "scheduled {} of {} equation(s)",
        order.len(),
        netlist.equations().len()
    );
    Ok(order)
}

/// Names the loop through `component`, starting from the member the
/// traversal entered first. That member finishes last in postorder.
fn cycle_error(
    netlist: &Netlist,
    graph: &DiGraphMap<BusId, ()>,
    component: &[BusId],
    position: &HashMap<BusId, usize>,
) -> CoreError {
    let Some(&entry) = component.iter().max_by_key(|&&bus| position.get(&bus)) else {
        return CoreError::CyclicDependency(Vec::new());
    };

    let mut path = vec![netlist.name(entry)];
    if graph.contains_edge(entry, entry) {
        path.push(netlist.name(entry));
    } else {
        let back = graph
            .neighbors(entry)
            .filter(|next| component.contains(next))
            .filter_map(|next| astar(graph, next, |bus| bus == entry, |_| 1usize, |_| 0))
            .min_by_key(|(cost, _)| *cost)
            .map(|(_, back)| back)
            .unwrap_or_default();
        path.extend(back.into_iter().map(|bus| netlist.name(bus)));
    }
    CoreError::CyclicDependency(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::build;
    use crate::parser::parse;

    fn netlist(source: &str) -> Netlist {
        build(&parse(source).expect("parse")).expect("build")
    }

    fn order(netlist: &Netlist) -> Vec<String> {
        schedule(netlist)
            .expect("schedule")
            .into_iter()
            .map(|eq| netlist.name(eq.dest()))
            .collect()
    }

    fn position(order: &[String], name: &str) -> usize {
        order
            .iter()
            .position(|n| n == name)
            .unwrap_or_else(|| panic!("`{name}` not scheduled in {order:?}"))
    }

    #[test]
    fn orders_forward_references() {
        let n = netlist(
            "INPUT a, b OUTPUT o VAR a, b, o, t, u IN o = OR u t u = AND t b t = NOT a",
        );
        let order = order(&n);
        assert_eq!(order.len(), 3);
        assert!(position(&order, "t") < position(&order, "u"));
        assert!(position(&order, "u") < position(&order, "o"));
    }

    #[test]
    fn self_loop_is_cyclic() {
        let n = netlist("INPUT y OUTPUT x VAR x, y IN x = AND x y");
        assert_eq!(
            schedule(&n).unwrap_err(),
            CoreError::CyclicDependency(vec!["x".into(), "x".into()])
        );
    }

    #[test]
    fn reports_the_full_cycle_path() {
        let n = netlist("INPUT i OUTPUT o VAR i, o, a, b IN o = NOT a a = AND b i b = NOT a");
        assert_eq!(
            schedule(&n).unwrap_err(),
            CoreError::CyclicDependency(vec!["a".into(), "b".into(), "a".into()])
        );
    }

    #[test]
    fn cycles_behind_a_register_are_found() {
        let n = netlist("INPUT OUTPUT q VAR q, d, e IN q = REG d d = NOT e e = NOT d");
        assert_eq!(
            schedule(&n).unwrap_err(),
            CoreError::CyclicDependency(vec!["d".into(), "e".into(), "d".into()])
        );
    }

    #[test]
    fn cycles_behind_a_ram_write_are_found() {
        let n = netlist(
            "INPUT ra, we, wa OUTPUT o VAR ra:2, we, wa:2, wd:8, o:8, x:8 \
             IN o = RAM 2 8 ra we wa wd wd = NOT x x = NOT wd",
        );
        assert_eq!(
            schedule(&n).unwrap_err(),
            CoreError::CyclicDependency(vec!["wd".into(), "x".into(), "wd".into()])
        );
    }

    #[test]
    fn unreachable_cycles_are_ignored() {
        let n = netlist("INPUT a OUTPUT o VAR a, o, x, y IN o = NOT a x = NOT y y = NOT x");
        assert_eq!(order(&n), vec!["o"]);
    }

    #[test]
    fn register_breaks_the_cycle() {
        let n = netlist("INPUT y OUTPUT x VAR r, x, y IN r = REG x x = AND r y");
        let order = order(&n);
        assert_eq!(order, vec!["r", "x"]);
    }

    #[test]
    fn register_operand_is_forced() {
        let n = netlist("INPUT a OUTPUT o VAR a, o, d IN o = REG d d = NOT a");
        let order = order(&n);
        assert_eq!(order, vec!["o", "d"]);
    }

    #[test]
    fn ram_depends_only_on_its_read_address() {
        let n = netlist(
            "INPUT ra OUTPUT o VAR ra:2, we, wa:2, wd:8, o:8 \
             IN o = RAM 2 8 ra we wa wd we = SELECT 0 o wa = SLICE 0 1 o wd = NOT o",
        );
        let order = order(&n);
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], "o");
        for forced in ["we", "wa", "wd"] {
            assert!(position(&order, forced) > 0);
        }
    }

    #[test]
    fn ram_read_address_is_combinational() {
        let n = netlist("INPUT d OUTPUT o VAR d:8, o:8, a:2 IN o = RAM 2 8 a 0 a d a = SLICE 0 1 o");
        assert!(matches!(
            schedule(&n),
            Err(CoreError::CyclicDependency(_))
        ));
    }

    #[test]
    fn missing_equation_is_undeclared() {
        let n = netlist("INPUT a OUTPUT o VAR a, o, ghost IN o = AND a ghost");
        assert_eq!(
            schedule(&n).unwrap_err(),
            CoreError::UndeclaredVariable("ghost".into())
        );
    }

    #[test]
    fn output_without_equation_is_undeclared() {
        let n = netlist("INPUT a OUTPUT o, p VAR a, o, p IN o = NOT a");
        assert_eq!(
            schedule(&n).unwrap_err(),
            CoreError::UndeclaredVariable("p".into())
        );
    }

    #[test]
    fn shared_dependencies_are_scheduled_once() {
        let n = netlist("INPUT a OUTPUT o, p VAR a, o, p, t IN o = NOT t p = AND t a t = NOT a");
        let order = order(&n);
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], "t");
    }

    #[test]
    fn outputs_may_be_inputs() {
        let n = netlist("INPUT a OUTPUT a VAR a IN unused = NOT a");
        assert!(order(&n).is_empty());
    }

    #[test]
    fn double_definition_is_rejected() {
        let n = netlist("INPUT a OUTPUT o VAR a, o IN o = NOT a o = COPY a");
        assert_eq!(schedule(&n).unwrap_err(), CoreError::Redefinition("o".into()));
        let n = netlist("INPUT a OUTPUT o VAR a, o IN a = 1 o = NOT a");
        assert_eq!(schedule(&n).unwrap_err(), CoreError::Redefinition("a".into()));
    }

    #[test]
    fn deep_chains_do_not_recurse() {
        let depth = 20_000;
        let mut source = String::from("INPUT a OUTPUT o VAR a, o IN o = NOT t0 ");
        for i in 0..depth - 1 {
            source.push_str(&format!("t{i} = NOT t{} ", i + 1));
        }
        source.push_str(&format!("t{} = NOT a", depth - 1));
        let n = netlist(&source);
        assert_eq!(schedule(&n).expect("schedule").len(), depth + 1);
    }
}
