//! Lexical scopes: symbol tables and the scope stack
//!
//! A [`ScopeStack`] is an ordered list of shared symbol tables, innermost
//! last. Closures snapshot the stack by handle-sharing, so captured scopes
//! stay alive for as long as any closure refers to them. Class bodies run
//! in a table tagged [`TableKind::Class`]; those tables are invisible to
//! lookups from nested scopes, which keeps class-body names from leaking
//! into method bodies.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{ErrorKind, Result, RuntimeError};
use crate::value::callable::CmdDecl;
use crate::value::Value;

/// What a table holds: an ordinary lexical scope or a class body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Ordinary lexical scope
    Scope,
    /// Class body; skipped by lookups from nested scopes
    Class,
}

/// A named binding inside one table.
#[derive(Debug, Clone)]
pub struct SymbolEntry {
    /// The bound value handle
    pub value: Value,
    /// Published to the process environment for child processes
    pub exported: bool,
}

/// One symbol table: name-keyed value entries plus the command namespace.
///
/// User-declared commands live beside ordinary symbols, never shadowing
/// them; pipelines resolve argv[0] against the command namespace only.
#[derive(Debug)]
pub struct SymbolTable {
    kind: TableKind,
    entries: IndexMap<String, SymbolEntry>,
    cmds: IndexMap<String, Rc<CmdDecl>>,
}

/// Shared handle to a table; scope stacks and type descriptors both hold
/// these.
pub type TableRef = Rc<RefCell<SymbolTable>>;

impl SymbolTable {
    /// Create an empty table of the given kind.
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
            cmds: IndexMap::new(),
        }
    }

    /// Create a shared handle to a fresh table.
    pub fn shared(kind: TableKind) -> TableRef {
        Rc::new(RefCell::new(Self::new(kind)))
    }

    /// The table kind.
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Read a binding.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.get(name).map(|e| e.value.clone())
    }

    /// Whether a binding exists here.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Insert a new binding. Duplicate names within one table are rejected.
    pub fn insert(&mut self, name: &str, value: Value) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(RuntimeError::new(
                ErrorKind::IncompatibleType,
                format!("symbol '{name}' already declared in this scope"),
            ));
        }
        self.entries.insert(
            name.to_string(),
            SymbolEntry {
                value,
                exported: false,
            },
        );
        Ok(())
    }

    /// Insert or overwrite a binding.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.entries.get_mut(name) {
            Some(entry) => entry.value = value,
            None => {
                self.entries.insert(
                    name.to_string(),
                    SymbolEntry {
                        value,
                        exported: false,
                    },
                );
            }
        }
    }

    /// Mark a binding as exported. Returns false when the name is absent.
    pub fn set_exported(&mut self, name: &str) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.exported = true;
                true
            }
            None => false,
        }
    }

    /// Iterate bindings in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SymbolEntry)> {
        self.entries.iter()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no bindings.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a user-declared command.
    pub fn insert_cmd(&mut self, cmd: Rc<CmdDecl>) {
        self.cmds.insert(cmd.name.clone(), cmd);
    }

    /// Resolve a user-declared command by name.
    pub fn lookup_cmd(&self, name: &str) -> Option<Rc<CmdDecl>> {
        self.cmds.get(name).cloned()
    }
}

/// The scope stack: shared tables, innermost last.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    tables: Vec<TableRef>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    /// Create a stack holding a single root scope.
    pub fn new() -> Self {
        Self {
            tables: vec![SymbolTable::shared(TableKind::Scope)],
        }
    }

    /// Push a fresh ordinary scope.
    pub fn push(&mut self) {
        self.tables.push(SymbolTable::shared(TableKind::Scope));
    }

    /// Push an existing table handle (class tables, closure frames).
    pub fn push_table(&mut self, table: TableRef) {
        self.tables.push(table);
    }

    /// Pop the innermost scope. The root scope is never popped.
    pub fn pop(&mut self) {
        if self.tables.len() > 1 {
            self.tables.pop();
        }
    }

    /// The innermost table handle.
    pub fn top(&self) -> &TableRef {
        self.tables.last().expect("scope stack never empty")
    }

    /// The root (outermost) table handle.
    pub fn root(&self) -> &TableRef {
        self.tables.first().expect("scope stack never empty")
    }

    /// Stack depth.
    pub fn depth(&self) -> usize {
        self.tables.len()
    }

    /// Handle-sharing snapshot for closure capture: the returned stack
    /// aliases this stack's tables.
    pub fn snapshot(&self) -> Self {
        Self {
            tables: self.tables.clone(),
        }
    }

    fn visible(&self, idx: usize, table: &TableRef) -> bool {
        // Class tables resolve only while they are the innermost scope.
        table.borrow().kind() != TableKind::Class || idx == self.tables.len() - 1
    }

    /// Read a name, innermost first.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        for (idx, table) in self.tables.iter().enumerate().rev() {
            if !self.visible(idx, table) {
                continue;
            }
            if let Some(value) = table.borrow().get(name) {
                return Some(value);
            }
        }
        None
    }

    /// Read a name or fail with `ID_NOT_FOUND`.
    pub fn lookup_or_err(&self, name: &str) -> Result<Value> {
        self.lookup(name).ok_or_else(|| {
            RuntimeError::new(ErrorKind::IdNotFound, format!("symbol '{name}' not found"))
        })
    }

    /// Whether a name resolves from the current position.
    pub fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Bind a name: rebind the nearest visible existing entry, or create
    /// one in the innermost scope.
    pub fn set(&mut self, name: &str, value: Value) {
        for (idx, table) in self.tables.iter().enumerate().rev() {
            if !self.visible(idx, table) {
                continue;
            }
            let mut table = table.borrow_mut();
            if table.contains(name) {
                table.set(name, value);
                return;
            }
        }
        self.top().borrow_mut().set(name, value);
    }

    /// Declare a new name in the innermost scope; duplicates are rejected.
    pub fn insert(&mut self, name: &str, value: Value) -> Result<()> {
        self.top().borrow_mut().insert(name, value)
    }

    /// Mark the nearest visible binding as exported and publish it to the
    /// process environment.
    pub fn export(&mut self, name: &str) -> Result<()> {
        for (idx, table) in self.tables.iter().enumerate().rev() {
            if !self.visible(idx, table) {
                continue;
            }
            if table.borrow_mut().set_exported(name) {
                let value = table.borrow().get(name).expect("entry just marked");
                std::env::set_var(name, value.to_string());
                return Ok(());
            }
        }
        Err(RuntimeError::new(
            ErrorKind::IdNotFound,
            format!("symbol '{name}' not found"),
        ))
    }

    /// Register a user-declared command in the innermost scope.
    pub fn insert_cmd(&mut self, cmd: Rc<CmdDecl>) {
        self.top().borrow_mut().insert_cmd(cmd);
    }

    /// Resolve a user-declared command, innermost first. Class tables do
    /// not take part in command resolution.
    pub fn lookup_cmd(&self, name: &str) -> Option<Rc<CmdDecl>> {
        for table in self.tables.iter().rev() {
            if let Some(cmd) = table.borrow().lookup_cmd(name) {
                return Some(cmd);
            }
        }
        None
    }
}
