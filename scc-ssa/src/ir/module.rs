//! Module
//!
//! The unit the pass manager and the printer operate over: the ordered list
//! of global values (functions, global variables, string blobs) and the
//! record types the module declares.

use scc_common::Type;
use serde::{Deserialize, Serialize};

use crate::ir::{Context, ValueId, ValueKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub globals: Vec<ValueId>,
    /// Emitted `Type::Record` declarations
    pub records: Vec<Type>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            globals: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn add_global(&mut self, global: ValueId) {
        if !self.globals.contains(&global) {
            self.globals.push(global);
        }
    }

    pub fn add_record(&mut self, record: Type) {
        assert!(record.is_record(), "{record} is not a record type");
        if !self.records.contains(&record) {
            self.records.push(record);
        }
    }

    /// Functions in global order, declarations included
    pub fn functions<'a>(&'a self, ctx: &'a Context) -> impl Iterator<Item = ValueId> + 'a {
        self.globals.iter().copied().filter(move |&g| ctx.is_function(g))
    }

    /// Functions with a body
    pub fn defined_functions(&self, ctx: &Context) -> Vec<ValueId> {
        self.functions(ctx)
            .filter(|&f| !ctx.function(f).is_declaration())
            .collect()
    }

    pub fn strings<'a>(&'a self, ctx: &'a Context) -> impl Iterator<Item = ValueId> + 'a {
        self.globals
            .iter()
            .copied()
            .filter(move |&g| matches!(ctx.value(g).kind, ValueKind::String(_)))
    }

    /// Function or global variable by name
    pub fn find_global(&self, ctx: &Context, name: &str) -> Option<ValueId> {
        self.globals
            .iter()
            .copied()
            .find(|&g| ctx.value(g).global_name() == Some(name))
    }
}
