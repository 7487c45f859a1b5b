//! Step IR: one simulation step as a flat list of typed statements.
//!
//! Lowering settles every native type, mask and shift amount, so the C
//! renderer only lays text out. Each local holds its value masked to its
//! bus width, which lets `CONCAT` add shifted operands without cleanup.

use log::debug;

use crate::error::CoreError;
use crate::netlist::Netlist;
use crate::symbols::{BusId, BusKind};
use crate::typecheck::Equation;
use crate::types::Opcode;

/// Native unsigned integer types used by generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CType {
    U8,
    U16,
    U32,
    U64,
}

impl CType {
    /// Smallest native type holding `width` bits.
    pub fn for_width(width: u32) -> CType {
        match width {
            0..=8 => CType::U8,
            9..=16 => CType::U16,
            17..=32 => CType::U32,
            _ => CType::U64,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            CType::U8 => 8,
            CType::U16 => 16,
            CType::U32 => 32,
            CType::U64 => 64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CType::U8 => "uint8_t",
            CType::U16 => "uint16_t",
            CType::U32 => "uint32_t",
            CType::U64 => "uint64_t",
        }
    }
}

/// All-ones mask of `width` bits.
pub fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// A record field mirrored by a local of the same bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub width: u32,
    pub ty: CType,
}

/// Operand of a statement: a local wire or a literal already masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Wire(String),
    Literal(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rvalue {
    Copy(Value),
    /// `~operand & mask`
    Not { operand: Value, mask: u64 },
    /// `lhs op rhs`, inverted and masked when `invert` is set.
    Bitwise {
        op: BitOp,
        lhs: Value,
        rhs: Value,
        invert: bool,
        mask: u64,
    },
    /// `(select & select_mask) == 0 ? when_zero : otherwise`
    Mux {
        select: Value,
        select_mask: u64,
        when_zero: Value,
        otherwise: Value,
    },
    /// `((ty) high << shift) + low`
    Concat {
        high: Value,
        low: Value,
        shift: u32,
        ty: CType,
    },
    /// `(ty) ((source & mask) >> shift)`; `mask` is already shifted.
    Extract {
        source: Value,
        mask: u64,
        shift: u32,
        ty: CType,
    },
    RegisterRead { cell: String },
    RamRead {
        array: String,
        address: Value,
        address_mask: u64,
    },
    /// Read from the caller-provided memory bank.
    RomRead {
        bank: String,
        address: Value,
        address_mask: u64,
        data_mask: u64,
    },
}

/// `ty target = value;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assign {
    pub target: String,
    pub ty: CType,
    pub value: Rvalue,
}

/// Storage persisting from one step to the next, zero-initialised once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateCell {
    Register { cell: String, ty: CType },
    Ram {
        array: String,
        ty: CType,
        address_width: u32,
    },
}

/// State updates run after every assignment of the step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    Register { cell: String, source: Value },
    RamWrite {
        array: String,
        enable: Value,
        enable_mask: u64,
        address: Value,
        address_mask: u64,
        data: Value,
    },
}

/// A ROM threaded in through the memory bank record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomBank {
    pub name: String,
    pub ty: CType,
    pub address_width: u32,
    pub data_width: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepProgram {
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
    /// Sorted by name.
    pub roms: Vec<RomBank>,
    pub state: Vec<StateCell>,
    pub body: Vec<Assign>,
    pub commits: Vec<Commit>,
}

/// Lowers scheduled equations into a [`StepProgram`].
pub fn lower(netlist: &Netlist, order: &[&Equation]) -> Result<StepProgram, CoreError> {
    let lowering = Lowering { netlist };
    let mut program = StepProgram {
        inputs: lowering.ports(netlist.inputs())?,
        outputs: lowering.ports(netlist.outputs())?,
        ..StepProgram::default()
    };

    for eq in order {
        lowering.equation(eq, &mut program)?;
    }
    program.roms.sort_by(|a, b| a.name.cmp(&b.name));

    debug!(
        "lowered {} statement(s), {} state cell(s), {} ROM(s)",
        program.body.len(),
        program.state.len(),
        program.roms.len()
    );
    Ok(program)
}

struct Lowering<'n> {
    netlist: &'n Netlist,
}

impl<'n> Lowering<'n> {
    fn ports<'a>(&self, ids: impl IntoIterator<Item = &'a BusId>) -> Result<Vec<Port>, CoreError> {
        ids.into_iter()
            .map(|&id| {
                let width = self.width(id)?;
                Ok(Port {
                    name: self.netlist.name(id),
                    width,
                    ty: CType::for_width(width),
                })
            })
            .collect()
    }

    fn width(&self, id: BusId) -> Result<u32, CoreError> {
        self.netlist
            .symbols()
            .width(id)
            .ok_or_else(|| CoreError::UnresolvedWidth(self.netlist.name(id)))
    }

    fn value(&self, id: BusId) -> Result<Value, CoreError> {
        let symbols = self.netlist.symbols();
        match symbols.bus(id).kind() {
            BusKind::Var(name) => Ok(Value::Wire(name.clone())),
            BusKind::Const(value) => Ok(Value::Literal(value & mask(self.width(id)?))),
        }
    }

    fn equation(&self, eq: &Equation, program: &mut StepProgram) -> Result<(), CoreError> {
        let expr = eq.expr();
        let args = expr.args();
        let statics = expr.static_args();
        let target = self.netlist.name(eq.dest());
        let width = eq.width();
        let ty = CType::for_width(width);

        let value = match expr.opcode() {
            Opcode::Copy => Rvalue::Copy(self.value(args[0])?),
            Opcode::Not => Rvalue::Not {
                operand: self.value(args[0])?,
                mask: mask(width),
            },
            Opcode::And | Opcode::Or | Opcode::Xor | Opcode::Nand | Opcode::Nxor => {
                let (op, invert) = match expr.opcode() {
                    Opcode::And => (BitOp::And, false),
                    Opcode::Or => (BitOp::Or, false),
                    Opcode::Xor => (BitOp::Xor, false),
                    Opcode::Nand => (BitOp::And, true),
                    _ => (BitOp::Xor, true),
                };
                Rvalue::Bitwise {
                    op,
                    lhs: self.value(args[0])?,
                    rhs: self.value(args[1])?,
                    invert,
                    mask: mask(width),
                }
            }
            Opcode::Mux => Rvalue::Mux {
                select: self.value(args[0])?,
                select_mask: mask(self.width(args[0])?),
                when_zero: self.value(args[1])?,
                otherwise: self.value(args[2])?,
            },
            Opcode::Concat => Rvalue::Concat {
                high: self.value(args[0])?,
                low: self.value(args[1])?,
                shift: self.width(args[1])?,
                ty,
            },
            Opcode::Snip => Rvalue::Extract {
                source: self.value(args[0])?,
                mask: mask(statics[1] - statics[0]) << statics[0],
                shift: statics[0],
                ty,
            },
            Opcode::Slice => Rvalue::Extract {
                source: self.value(args[0])?,
                mask: mask(statics[1] - statics[0] + 1) << statics[0],
                shift: statics[0],
                ty,
            },
            Opcode::Select => Rvalue::Extract {
                source: self.value(args[0])?,
                mask: 1u64 << statics[0],
                shift: statics[0],
                ty,
            },
            Opcode::Reg => {
                let cell = format!("reg_{target}");
                program.state.push(StateCell::Register {
                    cell: cell.clone(),
                    ty,
                });
                program.commits.push(Commit::Register {
                    cell: cell.clone(),
                    source: self.value(args[0])?,
                });
                Rvalue::RegisterRead { cell }
            }
            Opcode::Ram => {
                let array = format!("ram_{target}");
                let address_width = statics[0];
                program.state.push(StateCell::Ram {
                    array: array.clone(),
                    ty,
                    address_width,
                });
                program.commits.push(Commit::RamWrite {
                    array: array.clone(),
                    enable: self.value(args[1])?,
                    enable_mask: mask(self.width(args[1])?),
                    address: self.value(args[2])?,
                    address_mask: mask(address_width),
                    data: self.value(args[3])?,
                });
                Rvalue::RamRead {
                    array,
                    address: self.value(args[0])?,
                    address_mask: mask(address_width),
                }
            }
            Opcode::Rom => {
                program.roms.push(RomBank {
                    name: target.clone(),
                    ty,
                    address_width: statics[0],
                    data_width: statics[1],
                });
                Rvalue::RomRead {
                    bank: target.clone(),
                    address: self.value(args[0])?,
                    address_mask: mask(statics[0]),
                    data_mask: mask(statics[1]),
                }
            }
        };

        program.body.push(Assign { target, ty, value });
        Ok(())
    }
}
