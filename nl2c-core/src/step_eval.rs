//! Reference interpreter for [`StepProgram`], used by tests to check what
//! the generated C computes without a C toolchain.
//!
//! Every assignment is truncated to its native type, like a C assignment.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::step_ir::{BitOp, Commit, Rvalue, StateCell, StepProgram, Value, mask};

pub struct StepMachine<'p> {
    program: &'p StepProgram,
    registers: HashMap<String, u64>,
    rams: HashMap<String, Vec<u64>>,
    roms: HashMap<String, Vec<u64>>,
}

impl<'p> StepMachine<'p> {
    pub fn new(program: &'p StepProgram) -> Self {
        let mut registers = HashMap::new();
        let mut rams = HashMap::new();
        for cell in &program.state {
            match cell {
                StateCell::Register { cell, .. } => {
                    registers.insert(cell.clone(), 0);
                }
                StateCell::Ram {
                    array,
                    address_width,
                    ..
                } => {
                    rams.insert(array.clone(), vec![0; 1usize << address_width]);
                }
            }
        }
        Self {
            program,
            registers,
            rams,
            roms: HashMap::new(),
        }
    }

    pub fn load_rom(&mut self, name: &str, cells: Vec<u64>) {
        self.roms.insert(name.to_string(), cells);
    }

    pub fn ram(&self, array: &str) -> &[u64] {
        &self.rams[array]
    }

    /// Runs one step. Missing inputs read as zero.
    pub fn step(&mut self, inputs: &[(&str, u64)]) -> IndexMap<String, u64> {
        let mut wires: HashMap<String, u64> = HashMap::new();
        for port in &self.program.inputs {
            let value = inputs
                .iter()
                .find(|(name, _)| *name == port.name)
                .map_or(0, |&(_, value)| value);
            wires.insert(port.name.clone(), value & mask(port.width));
        }

        for assign in &self.program.body {
            let value = self.eval(&assign.value, &wires) & mask(assign.ty.bits());
            wires.insert(assign.target.clone(), value);
        }

        for commit in &self.program.commits {
            match commit {
                Commit::Register { cell, source } => {
                    let value = read(&wires, source);
                    self.registers.insert(cell.clone(), value);
                }
                Commit::RamWrite {
                    array,
                    enable,
                    enable_mask,
                    address,
                    address_mask,
                    data,
                } => {
                    if read(&wires, enable) & enable_mask != 0 {
                        let index = (read(&wires, address) & address_mask) as usize;
                        let value = read(&wires, data);
                        if let Some(cells) = self.rams.get_mut(array) {
                            cells[index] = value;
                        }
                    }
                }
            }
        }

        self.program
            .outputs
            .iter()
            .map(|port| (port.name.clone(), wires[&port.name]))
            .collect()
    }

    fn eval(&self, value: &Rvalue, wires: &HashMap<String, u64>) -> u64 {
        match value {
            Rvalue::Copy(v) => read(wires, v),
            Rvalue::Not { operand, mask } => !read(wires, operand) & mask,
            Rvalue::Bitwise {
                op,
                lhs,
                rhs,
                invert,
                mask,
            } => {
                let (l, r) = (read(wires, lhs), read(wires, rhs));
                let plain = match op {
                    BitOp::And => l & r,
                    BitOp::Or => l | r,
                    BitOp::Xor => l ^ r,
                };
                if *invert { !plain & mask } else { plain }
            }
            Rvalue::Mux {
                select,
                select_mask,
                when_zero,
                otherwise,
            } => {
                if read(wires, select) & select_mask == 0 {
                    read(wires, when_zero)
                } else {
                    read(wires, otherwise)
                }
            }
            Rvalue::Concat {
                high, low, shift, ..
            } => read(wires, high)
                .wrapping_shl(*shift)
                .wrapping_add(read(wires, low)),
            Rvalue::Extract {
                source,
                mask,
                shift,
                ..
            } => (read(wires, source) & mask) >> shift,
            Rvalue::RegisterRead { cell } => self.registers[cell],
            Rvalue::RamRead {
                array,
                address,
                address_mask,
            } => self.rams[array][(read(wires, address) & address_mask) as usize],
            Rvalue::RomRead {
                bank,
                address,
                address_mask,
                data_mask,
            } => {
                let index = (read(wires, address) & address_mask) as usize;
                self.roms
                    .get(bank)
                    .and_then(|cells| cells.get(index))
                    .map_or(0, |cell| cell & data_mask)
            }
        }
    }
}

fn read(wires: &HashMap<String, u64>, value: &Value) -> u64 {
    match value {
        Value::Wire(name) => wires[name],
        Value::Literal(value) => *value,
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexSet;

    use super::*;
    use crate::netlist::{Netlist, build};
    use crate::parser::parse;
    use crate::schedule::schedule;
    use crate::step_ir::lower;
    use crate::symbols::SymbolTable;
    use crate::typecheck::{Equation, Expression};
    use crate::types::Opcode;

    fn program_of(netlist: &Netlist) -> StepProgram {
        let order = schedule(netlist).expect("schedule");
        lower(netlist, &order).expect("lower")
    }

    fn program(source: &str) -> StepProgram {
        program_of(&build(&parse(source).expect("parse")).expect("build"))
    }

    #[test]
    fn and_of_two_nibbles() {
        let program = program("INPUT a, b OUTPUT o VAR a:4, b:4, o:4 IN o = AND a b");
        let mut machine = StepMachine::new(&program);
        let out = machine.step(&[("a", 0b1100), ("b", 0b1010)]);
        assert_eq!(out["o"], 0b1000);
    }

    #[test]
    fn concat_with_an_inferred_operand() {
        let mut symbols = SymbolTable::new();
        let a = symbols.resolve("a");
        let b = symbols.declare_width("b", 4).expect("b");
        let c = symbols.declare_width("c", 6).expect("c");
        let expr = Expression::new(Opcode::Concat, vec![a, b], vec![], &mut symbols)
            .expect("expression");
        let eq = Equation::new(c, expr, &mut symbols).expect("equation");
        assert_eq!(symbols.width(a), Some(2));

        let netlist = Netlist::new(
            symbols,
            IndexSet::from([a, b]),
            IndexSet::from([c]),
            IndexSet::from([a, b, c]),
            vec![eq],
        );
        let program = program_of(&netlist);
        let mut machine = StepMachine::new(&program);
        let out = machine.step(&[("a", 0b10), ("b", 0b0101)]);
        assert_eq!(out["c"], 0b100101);
    }

    #[test]
    fn ram_reads_before_writing() {
        let program = program(
            "INPUT ra, we, wa, wd OUTPUT o VAR ra:2, we, wa:2, wd:8, o:8 IN o = RAM 2 8 ra we wa wd",
        );
        let mut machine = StepMachine::new(&program);

        let out = machine.step(&[("ra", 1), ("we", 0), ("wa", 1), ("wd", 0x5a)]);
        assert_eq!(out["o"], 0);
        assert_eq!(machine.ram("ram_o"), &[0, 0, 0, 0]);

        // The write address is masked to two bits on load: 5 lands on cell 1.
        let out = machine.step(&[("ra", 1), ("we", 1), ("wa", 5), ("wd", 0xab)]);
        assert_eq!(out["o"], 0);
        assert_eq!(machine.ram("ram_o"), &[0, 0xab, 0, 0]);

        let out = machine.step(&[("ra", 1), ("we", 1), ("wa", 1), ("wd", 0x11)]);
        assert_eq!(out["o"], 0xab);
        let out = machine.step(&[("ra", 1)]);
        assert_eq!(out["o"], 0x11);
    }

    #[test]
    fn register_delays_by_one_step() {
        let program = program("INPUT d OUTPUT q VAR d:3, q:3 IN q = REG d");
        let mut machine = StepMachine::new(&program);
        let seen: Vec<u64> = [5, 2, 7, 0]
            .into_iter()
            .map(|d| machine.step(&[("d", d)])["q"])
            .collect();
        assert_eq!(seen, vec![0, 5, 2, 7]);
    }

    #[test]
    fn register_feedback_counts() {
        // Toggle flip-flop: q flips every step.
        let program = program("INPUT OUTPUT q VAR q, n IN q = REG n n = NOT q");
        let mut machine = StepMachine::new(&program);
        let seen: Vec<u64> = (0..4).map(|_| machine.step(&[])["q"]).collect();
        assert_eq!(seen, vec![0, 1, 0, 1]);
    }

    #[test]
    fn inverted_results_stay_within_width() {
        let program = program(
            "INPUT a, b OUTPUT n, x, i VAR a:4, b:4, n:4, x:4, i:4 IN n = NAND a b x = NXOR a b i = NOT a",
        );
        let mut machine = StepMachine::new(&program);
        let out = machine.step(&[("a", 0b1100), ("b", 0b1010)]);
        assert_eq!(out["n"], 0b0111);
        assert_eq!(out["x"], 0b1001);
        assert_eq!(out["i"], 0b0011);
    }

    #[test]
    fn mux_picks_the_first_operand_on_zero() {
        let program = program("INPUT s, a, b OUTPUT o VAR s:2, a:8, b:8, o:8 IN o = MUX s a b");
        let mut machine = StepMachine::new(&program);
        assert_eq!(machine.step(&[("s", 0), ("a", 1), ("b", 2)])["o"], 1);
        assert_eq!(machine.step(&[("s", 2), ("a", 1), ("b", 2)])["o"], 2);
        assert_eq!(machine.step(&[("s", 4), ("a", 1), ("b", 2)])["o"], 1);
    }

    #[test]
    fn extraction_and_rom_lookup() {
        let program = program(
            "INPUT a OUTPUT hi, mid, bit, z VAR a:8, hi:4, mid:3, bit, z:16 \
             IN hi = SLICE 4 7 a mid = SNIP 2 5 a bit = SELECT 0 a z = ROM 2 16 lo lo = SNIP 0 2 a",
        );
        let mut machine = StepMachine::new(&program);
        machine.load_rom("z", vec![0x1111, 0x2222, 0x3333, 0x4444]);
        let out = machine.step(&[("a", 0b1011_0110)]);
        assert_eq!(out["hi"], 0b1011);
        assert_eq!(out["mid"], 0b101);
        assert_eq!(out["bit"], 0);
        assert_eq!(out["z"], 0x3333);
    }

    #[test]
    fn register_and_ram_share_a_concat() {
        let program = program(
            "INPUT a, b, we OUTPUT c, q, m VAR a:4, b:4, we, c:8, q:8, m:4, hi:4, lo:2 \
             IN c = CONCAT a b q = REG c m = RAM 2 4 lo we lo hi hi = SLICE 4 7 c lo = SLICE 0 1 a",
        );
        let mut machine = StepMachine::new(&program);

        let out = machine.step(&[("a", 3), ("b", 5), ("we", 1)]);
        assert_eq!((out["c"], out["q"], out["m"]), (0x35, 0, 0));
        assert_eq!(machine.ram("ram_m"), &[0, 0, 0, 3]);

        let out = machine.step(&[("a", 3), ("b", 0), ("we", 0)]);
        assert_eq!((out["c"], out["q"], out["m"]), (0x30, 0x35, 3));
    }

    #[test]
    fn wide_concat_uses_the_full_word() {
        let program = program("INPUT a, b OUTPUT c VAR a:32, b:32, c:64 IN c = CONCAT a b");
        let mut machine = StepMachine::new(&program);
        let out = machine.step(&[("a", 0xdead_beef), ("b", 0x0123_4567)]);
        assert_eq!(out["c"], 0xdead_beef_0123_4567);
    }
}
