//! Expression type system.
//!
//! Every [`Expression`] is checked when it is built: argument counts first,
//! then the opcode's width rule. Widths that cannot be decided from the
//! operands alone are left unresolved and finished by [`Equation::new`],
//! which propagates the destination width back into the operands.

use log::debug;

use crate::error::CoreError;
use crate::symbols::{BusId, BusKind, SymbolTable, check_width, natural_width};
use crate::types::Opcode;

/// Memories hold at most `2^32` cells.
pub const MAX_ADDRESS_WIDTH: u32 = 32;

/// A typed instruction: opcode, bus operands and static integer operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    opcode: Opcode,
    args: Vec<BusId>,
    static_args: Vec<u32>,
    width: Option<u32>,
}

impl Expression {
    /// Builds and type-checks an expression.
    ///
    /// Operand widths that the rule pins down (equal-width operands, memory
    /// addresses) are fixed in `symbols` as a side effect.
    pub fn new(
        opcode: Opcode,
        args: Vec<BusId>,
        static_args: Vec<u32>,
        symbols: &mut SymbolTable,
    ) -> Result<Self, CoreError> {
        let signature = opcode.signature();
        if args.len() != signature.buses {
            return Err(CoreError::ArityMismatch {
                opcode,
                what: "bus",
                expected: signature.buses,
                found: args.len(),
            });
        }
        if static_args.len() != signature.statics {
            return Err(CoreError::ArityMismatch {
                opcode,
                what: "static",
                expected: signature.statics,
                found: static_args.len(),
            });
        }

        let width = match opcode {
            Opcode::Not | Opcode::Reg | Opcode::Copy => symbols.width(args[0]),
            Opcode::And | Opcode::Or | Opcode::Xor | Opcode::Nand | Opcode::Nxor => {
                equal_widths(symbols, opcode, args[0], args[1])?
            }
            Opcode::Mux => {
                settle_free_width(symbols, args[0])?;
                equal_widths(symbols, opcode, args[1], args[2])?
            }
            Opcode::Concat => match (symbols.width(args[0]), symbols.width(args[1])) {
                (Some(high), Some(low)) => Some(high + low),
                (None, None) => {
                    return Err(CoreError::CannotInferWidth(format!(
                        "CONCAT needs at least one operand of known width ({} and {} are both unresolved)",
                        symbols.label(args[0]),
                        symbols.label(args[1])
                    )));
                }
                _ => None,
            },
            Opcode::Rom => {
                let (address_width, data_width) = memory_shape(opcode, &static_args)?;
                require_width(symbols, args[0], address_width, "ROM read address")?;
                Some(data_width)
            }
            Opcode::Ram => {
                let (address_width, data_width) = memory_shape(opcode, &static_args)?;
                require_width(symbols, args[0], address_width, "RAM read address")?;
                settle_free_width(symbols, args[1])?;
                require_width(symbols, args[2], address_width, "RAM write address")?;
                require_width(symbols, args[3], data_width, "RAM write data")?;
                Some(data_width)
            }
            Opcode::Snip => {
                let (lo, hi) = ordered_bounds(opcode, &static_args)?;
                let source = source_width(symbols, opcode, args[0])?;
                if hi > source {
                    return Err(CoreError::StaticOutOfRange {
                        opcode,
                        message: format!(
                            "upper bound must be at most {source} for `{}`, found {hi}",
                            symbols.label(args[0])
                        ),
                    });
                }
                Some(hi - lo)
            }
            Opcode::Slice => {
                let (lo, hi) = ordered_bounds(opcode, &static_args)?;
                let source = source_width(symbols, opcode, args[0])?;
                if hi >= source {
                    return Err(CoreError::StaticOutOfRange {
                        opcode,
                        message: format!(
                            "upper bound must be below {source} for `{}`, found {hi}",
                            symbols.label(args[0])
                        ),
                    });
                }
                Some(hi - lo + 1)
            }
            Opcode::Select => {
                let bit = static_args[0];
                let source = source_width(symbols, opcode, args[0])?;
                if bit >= source {
                    return Err(CoreError::StaticOutOfRange {
                        opcode,
                        message: format!(
                            "bit {bit} is out of range for `{}` ({source} bit(s))",
                            symbols.label(args[0])
                        ),
                    });
                }
                Some(1)
            }
        };

        Ok(Self {
            opcode,
            args,
            static_args,
            width,
        })
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn args(&self) -> &[BusId] {
        &self.args
    }

    pub fn static_args(&self) -> &[u32] {
        &self.static_args
    }

    /// Output width, `None` while inference is pending.
    pub fn width(&self) -> Option<u32> {
        self.width
    }
}

/// `var = expression`, with destination and expression widths agreeing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equation {
    dest: BusId,
    expr: Expression,
}

impl Equation {
    pub fn new(
        dest: BusId,
        mut expr: Expression,
        symbols: &mut SymbolTable,
    ) -> Result<Self, CoreError> {
        if expr.width.is_none() {
            let dest_width = symbols.width(dest).ok_or_else(|| {
                CoreError::CannotInferWidth(format!(
                    "neither `{}` nor its {} expression has a known width",
                    symbols.label(dest),
                    expr.opcode
                ))
            })?;
            infer_operands(symbols, &expr, dest_width)?;
            expr.width = Some(dest_width);
            debug!(
                "inferred {} operands of `{}` from its {dest_width}-bit destination",
                expr.opcode,
                symbols.label(dest)
            );
        }

        let width = expr.width.unwrap_or_default();
        match symbols.width(dest) {
            None => symbols.fix_width(dest, width)?,
            Some(dest_width) if dest_width != width => {
                return Err(CoreError::BusWidthMismatch(format!(
                    "left-hand side `{}` is a {dest_width}-bit bus whereas a {width}-bit {} expression was provided",
                    symbols.label(dest),
                    expr.opcode
                )));
            }
            Some(_) => {}
        }

        Ok(Self { dest, expr })
    }

    pub fn dest(&self) -> BusId {
        self.dest
    }

    pub fn expr(&self) -> &Expression {
        &self.expr
    }

    /// Resolved output width. Always known once the equation is built.
    pub fn width(&self) -> u32 {
        self.expr.width.unwrap_or_default()
    }
}

/// Back-propagates a known destination width into unresolved operands.
fn infer_operands(
    symbols: &mut SymbolTable,
    expr: &Expression,
    dest_width: u32,
) -> Result<(), CoreError> {
    let args = &expr.args;
    match expr.opcode {
        Opcode::Concat => {
            let (known, unknown) = match symbols.width(args[0]) {
                Some(_) => (args[0], args[1]),
                None => (args[1], args[0]),
            };
            let known_width = symbols.width(known).unwrap_or_default();
            if dest_width <= known_width {
                return Err(CoreError::BusWidthMismatch(format!(
                    "CONCAT into a {dest_width}-bit bus leaves no room for `{}` next to the {known_width}-bit `{}`",
                    symbols.label(unknown),
                    symbols.label(known)
                )));
            }
            symbols.fix_width(unknown, dest_width - known_width)
        }
        Opcode::And | Opcode::Or | Opcode::Xor | Opcode::Nand | Opcode::Nxor => {
            symbols.fix_width(args[0], dest_width)?;
            symbols.fix_width(args[1], dest_width)
        }
        Opcode::Mux => {
            symbols.fix_width(args[1], dest_width)?;
            symbols.fix_width(args[2], dest_width)
        }
        Opcode::Not | Opcode::Reg | Opcode::Copy => symbols.fix_width(args[0], dest_width),
        Opcode::Ram | Opcode::Rom | Opcode::Snip | Opcode::Slice | Opcode::Select => {
            Err(CoreError::CannotInferWidth(format!(
                "{} output width depends only on its operands",
                expr.opcode
            )))
        }
    }
}

/// Makes two operands agree on their width, fixing whichever side is unknown.
fn equal_widths(
    symbols: &mut SymbolTable,
    opcode: Opcode,
    a: BusId,
    b: BusId,
) -> Result<Option<u32>, CoreError> {
    match (symbols.width(a), symbols.width(b)) {
        (Some(wa), Some(wb)) if wa != wb => Err(CoreError::BusWidthMismatch(format!(
            "{opcode} takes two buses of the same size (provided: {}[{wa}] and {}[{wb}])",
            symbols.label(a),
            symbols.label(b)
        ))),
        (Some(wa), Some(_)) => Ok(Some(wa)),
        (Some(wa), None) => {
            symbols.fix_width(b, wa)?;
            Ok(Some(wa))
        }
        (None, Some(wb)) => {
            symbols.fix_width(a, wb)?;
            Ok(Some(wb))
        }
        (None, None) => Ok(None),
    }
}

/// Operands of any width (selectors, write enables): literals take their
/// natural width.
fn settle_free_width(symbols: &mut SymbolTable, id: BusId) -> Result<(), CoreError> {
    if symbols.width(id).is_some() {
        return Ok(());
    }
    if let BusKind::Const(value) = *symbols.bus(id).kind() {
        symbols.fix_width(id, natural_width(value))?;
    }
    Ok(())
}

fn require_width(
    symbols: &mut SymbolTable,
    id: BusId,
    expected: u32,
    role: &str,
) -> Result<(), CoreError> {
    match symbols.width(id) {
        None => symbols.fix_width(id, expected),
        Some(width) if width == expected => Ok(()),
        Some(width) => Err(CoreError::BusWidthMismatch(format!(
            "{role} `{}` should be {expected} bit(s) wide, provided a {width}-bit bus",
            symbols.label(id)
        ))),
    }
}

fn source_width(symbols: &SymbolTable, opcode: Opcode, id: BusId) -> Result<u32, CoreError> {
    symbols.width(id).ok_or_else(|| {
        CoreError::CannotInferWidth(format!(
            "{opcode} source `{}` must have a known width",
            symbols.label(id)
        ))
    })
}

fn ordered_bounds(opcode: Opcode, static_args: &[u32]) -> Result<(u32, u32), CoreError> {
    let (lo, hi) = (static_args[0], static_args[1]);
    if lo > hi {
        return Err(CoreError::StaticOutOfRange {
            opcode,
            message: format!("bounds are not in order ({lo} > {hi})"),
        });
    }
    Ok((lo, hi))
}

fn memory_shape(opcode: Opcode, static_args: &[u32]) -> Result<(u32, u32), CoreError> {
    let (address_width, data_width) = (static_args[0], static_args[1]);
    if address_width == 0 || address_width > MAX_ADDRESS_WIDTH {
        return Err(CoreError::StaticOutOfRange {
            opcode,
            message: format!(
                "address width must be between 1 and {MAX_ADDRESS_WIDTH}, found {address_width}"
            ),
        });
    }
    let data_width = check_width(&format!("{opcode} data"), u64::from(data_width))?;
    Ok((address_width, data_width))
}
