//! Netlist model: declared inputs, outputs, variables and typed equations.
//!
//! A [`Netlist`] is immutable once [`build`] returns. It owns the symbol
//! table that every expression refers into.

use indexmap::IndexSet;
use log::{debug, info};

use crate::ast::{Operand, RawNetlist};
use crate::error::CoreError;
use crate::symbols::{BusId, SymbolTable};
use crate::typecheck::{Equation, Expression};

#[derive(Debug, Clone)]
pub struct Netlist {
    symbols: SymbolTable,
    inputs: IndexSet<BusId>,
    outputs: IndexSet<BusId>,
    vars: IndexSet<BusId>,
    equations: Vec<Equation>,
}

impl Netlist {
    pub fn new(
        symbols: SymbolTable,
        inputs: IndexSet<BusId>,
        outputs: IndexSet<BusId>,
        vars: IndexSet<BusId>,
        equations: Vec<Equation>,
    ) -> Self {
        Self {
            symbols,
            inputs,
            outputs,
            vars,
            equations,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn inputs(&self) -> &IndexSet<BusId> {
        &self.inputs
    }

    pub fn outputs(&self) -> &IndexSet<BusId> {
        &self.outputs
    }

    pub fn vars(&self) -> &IndexSet<BusId> {
        &self.vars
    }

    /// Equations in source order. Evaluation order comes from the scheduler.
    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn is_input(&self, id: BusId) -> bool {
        self.inputs.contains(&id)
    }

    pub fn name(&self, id: BusId) -> String {
        self.symbols.label(id)
    }
}

/// Types a raw parse tree into a [`Netlist`].
///
/// Equations are checked in source order; each one may fix widths that
/// later equations rely on.
pub fn build(raw: &RawNetlist) -> Result<Netlist, CoreError> {
    let mut symbols = SymbolTable::new();

    let inputs: IndexSet<BusId> = raw.inputs.iter().map(|name| symbols.resolve(name)).collect();
    let outputs: IndexSet<BusId> = raw
        .outputs
        .iter()
        .map(|name| symbols.resolve(name))
        .collect();

    let mut vars = IndexSet::new();
    for var in &raw.vars {
        vars.insert(symbols.declare_width(&var.name, var.width.unwrap_or(1))?);
    }

    let mut equations = Vec::with_capacity(raw.equations.len());
    for raw_eq in &raw.equations {
        let opcode = raw_eq.opcode();
        let statics = opcode.signature().statics.min(raw_eq.operands.len());
        let (static_operands, bus_operands) = raw_eq.operands.split_at(statics);

        let mut static_args = Vec::with_capacity(static_operands.len());
        for (index, operand) in static_operands.iter().enumerate() {
            match operand {
                Operand::Literal { value, .. } => {
                    let value = u32::try_from(*value).map_err(|_| CoreError::StaticOutOfRange {
                        opcode,
                        message: format!("static argument #{index} ({value}) is too large"),
                    })?;
                    static_args.push(value);
                }
                Operand::Name(name) => {
                    return Err(CoreError::StaticArgument {
                        opcode,
                        index,
                        found: name.clone(),
                    });
                }
            }
        }

        let mut args = Vec::with_capacity(bus_operands.len());
        for operand in bus_operands {
            let id = match operand {
                Operand::Name(name) => symbols.resolve(name),
                Operand::Literal { value, width } => symbols.constant(*value, *width)?,
            };
            args.push(id);
        }

        debug!("generating node for `{}` (line {})", raw_eq.target, raw_eq.line);
        let dest = symbols.resolve(&raw_eq.target);
        let expr = Expression::new(opcode, args, static_args, &mut symbols)?;
        equations.push(Equation::new(dest, expr, &mut symbols)?);
    }

    let netlist = Netlist::new(symbols, inputs, outputs, vars, equations);
    check_resolved(&netlist)?;
    info!(
        "netlist typed: {} input(s), {} output(s), {} declared variable(s), {} equation(s)",
        netlist.inputs().len(),
        netlist.outputs().len(),
        netlist.vars().len(),
        netlist.equations().len()
    );
    Ok(netlist)
}

/// Every bus must have a width once all equations are typed.
fn check_resolved(netlist: &Netlist) -> Result<(), CoreError> {
    let symbols = netlist.symbols();
    for (name, id) in symbols.vars() {
        if symbols.width(id).is_none() {
            return Err(CoreError::CannotInferWidth(format!(
                "nothing gives `{name}` a width, declare it in VAR"
            )));
        }
    }
    for eq in netlist.equations() {
        for &arg in eq.expr().args() {
            if symbols.width(arg).is_none() {
                return Err(CoreError::CannotInferWidth(format!(
                    "operand `{}` of `{}` has no width",
                    symbols.label(arg),
                    symbols.label(eq.dest())
                )));
            }
        }
    }
    Ok(())
}
