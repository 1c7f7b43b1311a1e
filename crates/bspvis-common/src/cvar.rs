// cvar.rs - console variables carrying the runtime toggles

use crate::common::com_dprintf;

use parking_lot::Mutex;
use std::collections::HashMap;

pub const CVAR_ZERO: i32 = 0;
/// Saved to the host's config file.
pub const CVAR_ARCHIVE: i32 = 1;
/// Marks a cvar that only matters to developers (cheat-protected in a release build).
pub const CVAR_CHEAT: i32 = 32;

/// A console variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub flags: i32,
    pub modified: bool,
    pub value: f32,
}

/// The full cvar system context.
#[derive(Debug, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

fn parse_value(value: &str) -> f32 {
    value.trim().parse::<f32>().unwrap_or(0.0)
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a cvar by name, returning its index. O(1) via HashMap.
    pub fn find_var_index(&self, name: &str) -> Option<usize> {
        self.cvar_index.get(name).copied()
    }

    /// Find a cvar by name. O(1) via HashMap.
    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        match self.find_var(name) {
            Some(var) => var.value,
            None => 0.0,
        }
    }

    /// Integer view of a cvar's value. Returns 0 if not found.
    pub fn variable_integer(&self, name: &str) -> i32 {
        self.variable_value(name) as i32
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in.
    pub fn get(&mut self, name: &str, value: &str, flags: i32) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return idx;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            flags,
            modified: true,
            value: parse_value(value),
        });
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    /// Set a cvar value, creating it if needed.
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => return self.get(name, value, CVAR_ZERO),
        };

        let var = &mut self.cvar_vars[idx];
        if value == var.string {
            return idx; // not changed
        }

        var.modified = true;
        var.string = value.to_string();
        var.value = parse_value(value);
        com_dprintf(&format!("{} changed to \"{}\"\n", name, value));
        idx
    }

    /// Read and clear the modified flag in one step.
    pub fn take_modified(&mut self, name: &str) -> bool {
        match self.find_var_index(name) {
            Some(idx) => std::mem::replace(&mut self.cvar_vars[idx].modified, false),
            None => false,
        }
    }
}

// ============================================================
// Global singleton and free-function wrappers
// ============================================================

static CVAR_CTX: Mutex<Option<CvarContext>> = parking_lot::const_mutex(None);

pub fn cvar_init() {
    *CVAR_CTX.lock() = Some(CvarContext::new());
}

pub fn cvar_get(name: &str, value: &str, flags: i32) -> Option<usize> {
    CVAR_CTX.lock().as_mut().map(|c| c.get(name, value, flags))
}

pub fn cvar_set(name: &str, value: &str) {
    if let Some(c) = CVAR_CTX.lock().as_mut() {
        c.set(name, value);
    }
}

pub fn cvar_variable_value(name: &str) -> f32 {
    CVAR_CTX.lock().as_ref().map_or(0.0, |c| c.variable_value(name))
}

/// Access the global cvar context with a closure. Returns None if not initialized.
pub fn with_cvar_ctx<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut CvarContext) -> R,
{
    CVAR_CTX.lock().as_mut().map(f)
}

// ============================================================
// Tests
// ============================================================
