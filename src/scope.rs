//! Arena of lexical scopes and the symbols they bind.
//!
//! Scopes and symbols are addressed by index and never freed while the
//! table lives. Names are folded to lowercase on the way in, so every
//! lookup is case-insensitive.

use std::collections::HashMap;

use crate::ty::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(usize);

/// Where a variable lives. Global offsets are relative to `gp`, local ones
/// to the routine's `fp` (parameters are negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Global(i32),
    Local(i32),
}

impl Storage {
    pub fn offset(self) -> i32 {
        match self {
            Storage::Global(n) | Storage::Local(n) => n,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    pub params: Vec<(String, Type)>,
    pub ret: Option<Type>,
    /// Scope of the routine's own body.
    pub scope: ScopeId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable {
        ty: Type,
        storage: Storage,
        initialized: bool,
    },
    Procedure(Routine),
    Function(Routine),
}

impl SymbolKind {
    pub fn describe(&self) -> &'static str {
        match self {
            SymbolKind::Variable { .. } => "variable",
            SymbolKind::Procedure(_) => "procedure",
            SymbolKind::Function(_) => "function",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// Spelling at the declaration site.
    pub name: String,
    pub kind: SymbolKind,
    /// Scope the symbol was declared in.
    pub scope: ScopeId,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub level: usize,
    /// Routine whose body this scope is; `None` for the program scope.
    pub owner: Option<SymbolId>,
    /// Slots reserved for variables declared in this scope.
    pub reserved: i32,
    next_offset: i32,
    names: HashMap<String, SymbolId>,
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                level: 0,
                owner: None,
                reserved: 0,
                next_offset: 0,
                names: HashMap::new(),
            }],
            symbols: vec![],
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Opens a routine scope whose first local variable gets `first_offset`.
    pub fn push_scope(
        &mut self,
        parent: ScopeId,
        owner: Option<SymbolId>,
        first_offset: i32,
    ) -> ScopeId {
        let level = self.scope(parent).level + 1;
        self.scopes.push(Scope {
            parent: Some(parent),
            level,
            owner,
            reserved: 0,
            next_offset: first_offset,
            names: HashMap::new(),
        });
        ScopeId(self.scopes.len() - 1)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0]
    }

    pub fn is_global(&self, scope: ScopeId) -> bool {
        self.scope(scope).parent.is_none()
    }

    /// Registers `name` in `scope`. On a clash the existing symbol is
    /// returned as the error.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: SymbolKind,
    ) -> Result<SymbolId, SymbolId> {
        let key = name.to_lowercase();
        if let Some(&existing) = self.scopes[scope.0].names.get(&key) {
            return Err(existing);
        }
        let id = SymbolId(self.symbols.len());
        self.symbols.push(Symbol {
            name: name.to_string(),
            kind,
            scope,
        });
        self.scopes[scope.0].names.insert(key, id);
        Ok(id)
    }

    /// Reserves `size` consecutive slots in `scope` and returns the first.
    pub fn allocate(&mut self, scope: ScopeId, size: i32) -> Option<i32> {
        let s = &mut self.scopes[scope.0];
        let offset = s.next_offset;
        s.next_offset = offset.checked_add(size)?;
        s.reserved = s.reserved.checked_add(size)?;
        Some(offset)
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scope(scope).names.get(&name.to_lowercase()).copied()
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let key = name.to_lowercase();
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let s = self.scope(id);
            if let Some(&sym) = s.names.get(&key) {
                return Some(sym);
            }
            cur = s.parent;
        }
        None
    }

    pub fn initialized(&self) -> Vec<bool> {
        self.symbols
            .iter()
            .map(|s| matches!(s.kind, SymbolKind::Variable { initialized: true, .. }))
            .collect()
    }

    pub fn restore_initialized(&mut self, snapshot: &[bool]) {
        for (sym, &flag) in self.symbols.iter_mut().zip(snapshot) {
            if let SymbolKind::Variable { initialized, .. } = &mut sym.kind {
                *initialized = flag;
            }
        }
    }

    pub fn set_initialized(&mut self, id: SymbolId, value: bool) {
        if let SymbolKind::Variable { initialized, .. } = &mut self.symbol_mut(id).kind {
            *initialized = value;
        }
    }

    pub fn is_initialized(&self, id: SymbolId) -> bool {
        matches!(
            self.symbol(id).kind,
            SymbolKind::Variable {
                initialized: true,
                ..
            }
        )
    }
}
