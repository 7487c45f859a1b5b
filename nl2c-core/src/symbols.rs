//! Symbol registry: one canonical bus handle per variable name.
//!
//! Buses live in an arena owned by [`SymbolTable`] and are referred to by
//! [`BusId`]. Expressions and equations only ever hold ids, so fixing the
//! width of a bus is visible to every expression that mentions it.

use indexmap::IndexMap;
use log::{debug, warn};

use crate::error::CoreError;

/// Widest bus the compiler accepts.
pub const MAX_BUS_WIDTH: u32 = 64;

/// Handle to a bus stored in a [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusId(usize);

impl BusId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a bus carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusKind {
    /// A named group of wires.
    Var(String),
    /// A literal value.
    Const(u64),
}

/// A bus and its width, `None` until resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bus {
    kind: BusKind,
    width: Option<u32>,
}

impl Bus {
    pub fn kind(&self) -> &BusKind {
        &self.kind
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn is_var(&self) -> bool {
        matches!(self.kind, BusKind::Var(_))
    }

    /// Variable name, or the hexadecimal literal for constants.
    pub fn label(&self) -> String {
        match &self.kind {
            BusKind::Var(name) => name.clone(),
            BusKind::Const(value) => format!("{value:#x}"),
        }
    }
}

/// Symbol table for one compilation unit.
///
/// The table only grows: names are never removed and an existing bus is
/// never replaced, because expressions may already refer to it.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    buses: Vec<Bus>,
    by_name: IndexMap<String, BusId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buses (variables and constants) in the table.
    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }

    /// Returns the bus for `name`, creating an unresolved one on first mention.
    pub fn resolve(&mut self, name: &str) -> BusId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        debug!("new variable declared | {name}: ?");
        let id = self.push(BusKind::Var(name.to_string()), None);
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Creates or updates `name` with an explicit width.
    ///
    /// An unresolved bus takes the width. A bus whose width is already
    /// fixed keeps it: the first declaration wins and later conflicting
    /// declarations are ignored.
    pub fn declare_width(&mut self, name: &str, width: u64) -> Result<BusId, CoreError> {
        let width = check_width(name, width)?;
        match self.by_name.get(name).copied() {
            None => {
                debug!("new variable declared | {name}: {width}");
                let id = self.push(BusKind::Var(name.to_string()), Some(width));
                self.by_name.insert(name.to_string(), id);
                Ok(id)
            }
            Some(id) => {
                match self.buses[id.0].width {
                    None => {
                        debug!("       width set for | {name}: {width}");
                        self.buses[id.0].width = Some(width);
                    }
                    Some(existing) if existing != width => {
                        warn!(
                            "`{name}` was already declared with {existing} bit(s), ignoring later width {width}"
                        );
                    }
                    Some(_) => {}
                }
                Ok(id)
            }
        }
    }

    /// Adds a literal bus. Each occurrence of a literal gets its own bus.
    pub fn constant(&mut self, value: u64, width: Option<u32>) -> Result<BusId, CoreError> {
        let id = self.push(BusKind::Const(value), None);
        if let Some(width) = width {
            self.fix_width(id, width)?;
        }
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<BusId> {
        self.by_name.get(name).copied()
    }

    pub fn bus(&self, id: BusId) -> &Bus {
        &self.buses[id.0]
    }

    pub fn width(&self, id: BusId) -> Option<u32> {
        self.buses[id.0].width
    }

    pub fn label(&self, id: BusId) -> String {
        self.buses[id.0].label()
    }

    pub fn is_var(&self, id: BusId) -> bool {
        self.buses[id.0].is_var()
    }

    /// Iterates over named variables in first-mention order.
    pub fn vars(&self) -> impl Iterator<Item = (&str, BusId)> + '_ {
        self.by_name.iter().map(|(name, &id)| (name.as_str(), id))
    }

    /// Resolves the width of `id` exactly once.
    ///
    /// Setting the width a bus already has is a no-op; any other value is a
    /// bus-length mismatch.
    pub fn fix_width(&mut self, id: BusId, width: u32) -> Result<(), CoreError> {
        let bus = &self.buses[id.0];
        match bus.width {
            Some(existing) if existing == width => Ok(()),
            Some(existing) => Err(CoreError::BusWidthMismatch(format!(
                "`{}` is a {existing}-bit bus but {width} bit(s) are required",
                bus.label()
            ))),
            None => {
                let width = check_width(&bus.label(), u64::from(width))?;
                if let BusKind::Const(value) = bus.kind {
                    if width < MAX_BUS_WIDTH && value >> width != 0 {
                        return Err(CoreError::ConstantTooWide { value, width });
                    }
                }
                debug!("        width inferred | {}: {width}", bus.label());
                self.buses[id.0].width = Some(width);
                Ok(())
            }
        }
    }

    fn push(&mut self, kind: BusKind, width: Option<u32>) -> BusId {
        let id = BusId(self.buses.len());
        self.buses.push(Bus { kind, width });
        id
    }
}

/// Validates a bus width against `1..=64`.
pub fn check_width(name: &str, width: u64) -> Result<u32, CoreError> {
    if width > u64::from(MAX_BUS_WIDTH) {
        return Err(CoreError::OversizedBus {
            name: name.to_string(),
            width,
        });
    }
    if width == 0 {
        return Err(CoreError::EmptyBus {
            name: name.to_string(),
        });
    }
    Ok(width as u32)
}

/// Smallest width able to hold `value`, at least one bit.
pub fn natural_width(value: u64) -> u32 {
    (u64::BITS - value.leading_zeros()).max(1)
}
