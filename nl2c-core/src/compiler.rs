use log::info;

use crate::codegen_c::generate;
use crate::error::CoreError;
use crate::netlist::{Netlist, build};
use crate::parser::parse;
use crate::schedule::schedule;

/// Switches for the auxiliary routines emitted next to the step function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Emit the output printer, the input prompt and the ROM loader.
    pub helper_functions: bool,
    /// Emit a separate `main` that drives the step function from stdin.
    pub driver: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            helper_functions: true,
            driver: false,
        }
    }
}

/// Names substituted into the generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub short_name: String,
    pub file_name: String,
    pub function_name: String,
}

impl ArtifactNames {
    pub fn new(
        short_name: impl Into<String>,
        file_name: impl Into<String>,
        function_name: impl Into<String>,
    ) -> Self {
        Self {
            short_name: short_name.into(),
            file_name: file_name.into(),
            function_name: function_name.into(),
        }
    }

    /// Include guard: the file name uppercased, with every character that
    /// cannot appear in a C identifier replaced by `_`.
    pub fn guard(&self) -> String {
        let mut guard: String = self
            .file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        if guard.chars().next().is_none_or(|c| c.is_ascii_digit()) {
            guard.insert(0, '_');
        }
        guard.push_str("_H");
        guard
    }

    pub fn apply(&self, text: &str) -> String {
        text.replace("%short_name%", &self.short_name)
            .replace("%file_name%", &self.file_name)
            .replace("%guard%", &self.guard())
            .replace("%function_name%", &self.function_name)
    }
}

/// Generated C text, still holding its name placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationArtifact {
    pub header: String,
    pub source: String,
    pub driver: Option<String>,
}

impl CompilationArtifact {
    pub fn substitute(&self, names: &ArtifactNames) -> CompilationArtifact {
        CompilationArtifact {
            header: names.apply(&self.header),
            source: names.apply(&self.source),
            driver: self.driver.as_deref().map(|driver| names.apply(driver)),
        }
    }
}

/// Parses, types, schedules and generates C for a netlist source.
pub fn compile(source: &str, options: &CompileOptions) -> Result<CompilationArtifact, CoreError> {
    let raw = parse(source)?;
    let netlist = build(&raw)?;
    compile_netlist(&netlist, options)
}

pub fn compile_netlist(
    netlist: &Netlist,
    options: &CompileOptions,
) -> Result<CompilationArtifact, CoreError> {
    let order = schedule(netlist)?;
    let artifact = generate(netlist, &order, options)?;
    info!(
        "generated {} header byte(s) and {} source byte(s)",
        artifact.header.len(),
        artifact.source.len()
    );
    Ok(artifact)
}
