//! C back-end: renders a [`StepProgram`] as a header and a source file.
//!
//! The text keeps four placeholders for the caller to fill in through
//! [`ArtifactNames`](crate::compiler::ArtifactNames): `%short_name%`,
//! `%file_name%`, `%guard%` and `%function_name%`.

use crate::compiler::{CompilationArtifact, CompileOptions};
use crate::error::CoreError;
use crate::netlist::Netlist;
use crate::step_ir::{
    Assign, BitOp, CType, Commit, Port, Rvalue, StateCell, StepProgram, Value, lower, mask,
};
use crate::typecheck::Equation;

const STEP_SIGNATURE: &str = "void %function_name%(const Input_%short_name% *input, Output_%short_name% *output, const Rom_%short_name% *roms)";

/// Generates C artifacts for equations already in evaluation order.
pub fn generate(
    netlist: &Netlist,
    order: &[&Equation],
    options: &CompileOptions,
) -> Result<CompilationArtifact, CoreError> {
    let program = lower(netlist, order)?;
    Ok(render(&program, options))
}

/// Renders the header, the step source and, if requested, a driver.
pub fn render(program: &StepProgram, options: &CompileOptions) -> CompilationArtifact {
    let helpers = options.helper_functions || options.driver;
    CompilationArtifact {
        header: render_header(program, helpers),
        source: render_source(program, helpers),
        driver: options.driver.then(|| render_driver(program)),
    }
}

fn render_header(program: &StepProgram, helpers: bool) -> String {
    let mut out = String::new();
    out.push_str("#ifndef %guard%\n#define %guard%\n\n#include <stdint.h>\n");
    if helpers {
        out.push_str("#include <stdio.h>\n");
    }
    out.push('\n');

    out.push_str(&record(&program.inputs, "Input_%short_name%"));
    out.push_str(&record(&program.outputs, "Output_%short_name%"));

    out.push_str("typedef struct {\n");
    if program.roms.is_empty() {
        out.push_str("\tuint8_t _reserved;\n");
    }
    for rom in &program.roms {
        out.push_str(&format!("\t{} *{};\n", rom.ty.name(), rom.name));
    }
    out.push_str("} Rom_%short_name%;\n\n");

    out.push_str(STEP_SIGNATURE);
    out.push_str(";\n");
    if helpers {
        out.push_str("void print_%short_name%_output(const Output_%short_name% *output);\n");
        out.push_str("void prompt_%short_name%_input(Input_%short_name% *input);\n");
        out.push_str("void fscan_%short_name%_rom(FILE *f, Rom_%short_name% *roms);\n");
    }
    out.push_str("\n#endif\n");
    out
}

fn record(ports: &[Port], name: &str) -> String {
    let mut out = String::from("typedef struct {\n");
    if ports.is_empty() {
        out.push_str("\tuint8_t _reserved;\n");
    }
    for port in ports {
        out.push_str(&format!("\t{} {};\n", port.ty.name(), port.name));
    }
    out.push_str(&format!("}} {name};\n\n"));
    out
}

fn render_source(program: &StepProgram, helpers: bool) -> String {
    let mut out = String::from("#include <stdint.h>\n");
    if helpers {
        out.push_str("#include <inttypes.h>\n#include <stdio.h>\n#include <stdlib.h>\n");
    }
    out.push_str("\n#include \"%file_name%.h\"\n\n");

    out.push_str(STEP_SIGNATURE);
    out.push_str(" {\n");
    for cell in &program.state {
        out.push_str(&state_cell(cell));
    }
    if !program.state.is_empty() {
        out.push('\n');
    }

    for port in &program.inputs {
        out.push_str(&format!(
            "\t{} {} = input->{} & {};\n",
            port.ty.name(),
            wire(&port.name),
            port.name,
            literal(mask(port.width))
        ));
    }
    if program.inputs.is_empty() {
        out.push_str("\t(void)input;\n");
    }
    if program.roms.is_empty() {
        out.push_str("\t(void)roms;\n");
    }
    out.push('\n');

    for assign in &program.body {
        out.push_str(&assignment(assign));
    }
    if !program.commits.is_empty() {
        out.push('\n');
    }
    for commit in &program.commits {
        out.push_str(&commit_statement(commit));
    }

    out.push('\n');
    if program.outputs.is_empty() {
        out.push_str("\t(void)output;\n");
    }
    for port in &program.outputs {
        out.push_str(&format!("\toutput->{} = {};\n", port.name, wire(&port.name)));
    }
    out.push_str("}\n");

    if helpers {
        out.push('\n');
        out.push_str(&print_output(&program.outputs));
        out.push('\n');
        out.push_str(&prompt_input(&program.inputs));
        out.push('\n');
        out.push_str(&scan_roms(program));
    }
    out
}

fn state_cell(cell: &StateCell) -> String {
    match cell {
        StateCell::Register { cell, ty } => format!("\tstatic {} {cell} = 0;\n", ty.name()),
        StateCell::Ram {
            array,
            ty,
            address_width,
        } => format!("\tstatic {} {array}[{}];\n", ty.name(), 1u64 << address_width),
    }
}

fn assignment(assign: &Assign) -> String {
    format!(
        "\t{} {} = {};\n",
        assign.ty.name(),
        wire(&assign.target),
        rvalue(&assign.value)
    )
}

fn rvalue(value: &Rvalue) -> String {
    match value {
        Rvalue::Copy(v) => operand(v),
        Rvalue::Not { operand: v, mask } => format!("~{} & {}", operand(v), literal(*mask)),
        Rvalue::Bitwise {
            op,
            lhs,
            rhs,
            invert,
            mask,
        } => {
            let symbol = match op {
                BitOp::And => "&",
                BitOp::Or => "|",
                BitOp::Xor => "^",
            };
            let plain = format!("{} {symbol} {}", operand(lhs), operand(rhs));
            if *invert {
                format!("~({plain}) & {}", literal(*mask))
            } else {
                plain
            }
        }
        Rvalue::Mux {
            select,
            select_mask,
            when_zero,
            otherwise,
        } => format!(
            "(({} & {}) == 0) ? {} : {}",
            operand(select),
            literal(*select_mask),
            operand(when_zero),
            operand(otherwise)
        ),
        Rvalue::Concat {
            high,
            low,
            shift,
            ty,
        } => format!(
            "(({}) {} << {shift}) + {}",
            ty.name(),
            operand(high),
            operand(low)
        ),
        Rvalue::Extract {
            source,
            mask,
            shift,
            ty,
        } => format!(
            "({}) (({} & {}) >> {shift})",
            ty.name(),
            operand(source),
            literal(*mask)
        ),
        Rvalue::RegisterRead { cell } => cell.clone(),
        Rvalue::RamRead {
            array,
            address,
            address_mask,
        } => format!("{array}[{} & {}]", operand(address), literal(*address_mask)),
        Rvalue::RomRead {
            bank,
            address,
            address_mask,
            data_mask,
        } => format!(
            "roms->{bank}[{} & {}] & {}",
            operand(address),
            literal(*address_mask),
            literal(*data_mask)
        ),
    }
}

fn commit_statement(commit: &Commit) -> String {
    match commit {
        Commit::Register { cell, source } => format!("\t{cell} = {};\n", operand(source)),
        Commit::RamWrite {
            array,
            enable,
            enable_mask,
            address,
            address_mask,
            data,
        } => format!(
            "\tif (({} & {}) != 0) {{\n\t\t{array}[{} & {}] = {};\n\t}}\n",
            operand(enable),
            literal(*enable_mask),
            operand(address),
            literal(*address_mask),
            operand(data)
        ),
    }
}

fn print_output(outputs: &[Port]) -> String {
    let mut out =
        String::from("void print_%short_name%_output(const Output_%short_name% *output) {\n");
    if outputs.is_empty() {
        out.push_str("\t(void)output;\n");
    }
    for port in outputs {
        out.push_str(&format!(
            "\tprintf(\"{}=%\" PRIx{} \", \", output->{});\n",
            port.name,
            port.ty.bits(),
            port.name
        ));
    }
    out.push_str("\tprintf(\"\\n\");\n}\n");
    out
}

fn prompt_input(inputs: &[Port]) -> String {
    let mut out = String::from("void prompt_%short_name%_input(Input_%short_name% *input) {\n");
    if inputs.is_empty() {
        out.push_str("\t(void)input;\n");
    }
    for port in inputs {
        out.push_str(&format!(
            "\tprintf(\"{}[{}]:=\");\n\tfflush(stdout);\n",
            port.name, port.width
        ));
        out.push_str(&format!(
            "\tif (scanf(\"%\" SCNx{}, &input->{}) != 1) {{\n\t\texit(0);\n\t}}\n",
            port.ty.bits(),
            port.name
        ));
    }
    out.push_str("}\n");
    out
}

fn scan_roms(program: &StepProgram) -> String {
    let mut out = String::from("void fscan_%short_name%_rom(FILE *f, Rom_%short_name% *roms) {\n");
    if program.roms.is_empty() {
        out.push_str("\t(void)f;\n\t(void)roms;\n");
    }
    for rom in &program.roms {
        let name = &rom.name;
        let cells = format!("((uint64_t)1 << {})", rom.address_width);
        out.push_str(&format!(
            "\troms->{name} = calloc((size_t){cells}, sizeof({}));\n",
            rom.ty.name()
        ));
        out.push_str(&format!(
            "\tif (roms->{name} == NULL) {{\n\t\tfprintf(stderr, \"cannot allocate ROM {name}\\n\");\n\t\texit(1);\n\t}}\n"
        ));
        out.push_str(&format!(
            "\tfprintf(stderr, \"Scanning ROM {name} ({} x {} bits)\\n\");\n",
            1u64 << rom.address_width,
            rom.data_width
        ));
        out.push_str(&format!("\tfor (uint64_t i = 0; i < {cells}; i++) {{\n"));
        out.push_str(&format!(
            "\t\tif (fscanf(f, \"%\" SCNx{}, &roms->{name}[i]) != 1) {{\n",
            rom.ty.bits()
        ));
        out.push_str(&format!(
            "\t\t\tfprintf(stderr, \"error while scanning ROM {name} at line %\" PRIu64 \"\\n\", i);\n\t\t\texit(1);\n\t\t}}\n\t}}\n"
        ));
    }
    out.push_str("}\n");
    out
}

fn render_driver(program: &StepProgram) -> String {
    let mut out = String::from("#include <stdio.h>\n#include <stdlib.h>\n\n#include \"%file_name%.h\"\n\n");
    out.push_str("int main(int argc, char *argv[]) {\n");
    out.push_str("\tInput_%short_name% input = {0};\n");
    out.push_str("\tOutput_%short_name% output = {0};\n");
    out.push_str("\tRom_%short_name% roms = {0};\n\n");
    out.push_str("\tif (argc > 1) {\n");
    out.push_str("\t\tFILE *f = fopen(argv[1], \"r\");\n");
    out.push_str("\t\tif (f == NULL) {\n");
    out.push_str("\t\t\tfprintf(stderr, \"ROM file %s not found\\n\", argv[1]);\n");
    out.push_str("\t\t\treturn 1;\n\t\t}\n");
    out.push_str("\t\tfscan_%short_name%_rom(f, &roms);\n");
    out.push_str("\t\tfclose(f);\n");
    if program.roms.is_empty() {
        out.push_str("\t}\n\n");
    } else {
        out.push_str("\t} else {\n");
        out.push_str(
            "\t\tfprintf(stderr, \"this netlist reads ROMs, pass the ROM file as first argument\\n\");\n",
        );
        out.push_str("\t\treturn 1;\n\t}\n\n");
    }
    out.push_str("\tfor (;;) {\n");
    out.push_str("\t\tprompt_%short_name%_input(&input);\n");
    out.push_str("\t\t%function_name%(&input, &output, &roms);\n");
    out.push_str("\t\tprint_%short_name%_output(&output);\n");
    out.push_str("\t}\n}\n");
    out
}

fn wire(name: &str) -> String {
    format!("w_{name}")
}

fn operand(value: &Value) -> String {
    match value {
        Value::Wire(name) => wire(name),
        Value::Literal(value) => literal(*value),
    }
}

/// Unsigned hexadecimal literal, `ull` when it needs more than 32 bits.
fn literal(value: u64) -> String {
    if value > u64::from(u32::MAX) {
        format!("{value:#x}ull")
    } else {
        format!("{value:#x}u")
    }
}
