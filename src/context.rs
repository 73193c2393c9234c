// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The translation context: one explicit object owning everything the
//! translators share while building a compiled unit.
//!
//! Procedures under construction form a stack (a translator may build a
//! helper while its caller is still open), and each open procedure carries
//! its own scope stack. A scope is an open block plus the set of arguments
//! known to be non-missing inside it; guard translation branches into child
//! scopes and records non-missing knowledge under one of two named
//! propagation policies.

use std::collections::{HashMap, HashSet};

use crate::common::Result;
use crate::datamodel::{Literal, MathContext};
use crate::fields::FieldInfos;
use crate::missing_elem;
use crate::procedure::{
    AccumKind, ArgId, Argument, Block, BlockId, CompiledModel, Expr, LocalId, LocalInfo, ProcId,
    Procedure, Stmt, Table, TableData, TableId, Type,
};

/// How far a non-missing fact propagates from the point it is learned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NonMissingMark {
    /// Known only inside the branch about to be entered: the guard itself
    /// established it, so only that subtree may rely on it.
    ChildrenOnly,
    /// Known for the rest of the current block: an early return already
    /// rejected the missing case, so later siblings may rely on it too.
    SiblingsAndChildren,
}

struct Scope {
    block: BlockId,
    non_missing: HashSet<ArgId>,
}

struct ProcBuilder {
    name: String,
    ret: Type,
    blocks: Vec<Block>,
    locals: Vec<LocalInfo>,
    scopes: Vec<Scope>,
    /// Marks learned under `ChildrenOnly`, waiting for the next branch.
    pending: HashSet<ArgId>,
}

impl ProcBuilder {
    fn new(name: String, ret: Type) -> Self {
        ProcBuilder {
            name,
            ret,
            blocks: vec![Block::default()],
            locals: Vec::new(),
            scopes: vec![Scope {
                block: 0,
                non_missing: HashSet::new(),
            }],
            pending: HashSet::new(),
        }
    }

    fn current_block(&mut self) -> &mut Block {
        let block = self.scopes.last().unwrap().block;
        &mut self.blocks[block as usize]
    }
}

pub struct TranslationContext {
    name: String,
    math_context: MathContext,
    target_categories: Vec<Literal>,

    arguments: Vec<Argument>,
    arg_index: HashMap<String, ArgId>,

    tables: Vec<Table>,
    bit_set_index: HashMap<Vec<u64>, TableId>,

    procedures: Vec<Procedure>,
    proc_index: HashMap<String, ProcId>,

    building: Vec<ProcBuilder>,
}

impl TranslationContext {
    pub fn new(
        name: String,
        math_context: MathContext,
        target_categories: Vec<Literal>,
        field_infos: &FieldInfos,
    ) -> Self {
        // one argument slot per referenced field, in field-name order
        let mut arguments = Vec::with_capacity(field_infos.len());
        let mut arg_index = HashMap::new();
        for (field_name, info) in field_infos {
            let id = arguments.len() as ArgId;
            arguments.push(Argument {
                field: field_name.clone(),
                data_type: info.field.data_type,
                encoder: info.encoder.clone(),
                primary: info.primary,
                name: info.variable_name(),
            });
            arg_index.insert(field_name.clone(), id);
        }

        TranslationContext {
            name,
            math_context,
            target_categories,
            arguments,
            arg_index,
            tables: Vec::new(),
            bit_set_index: HashMap::new(),
            procedures: Vec::new(),
            proc_index: HashMap::new(),
            building: Vec::new(),
        }
    }

    pub fn target_categories(&self) -> &[Literal] {
        &self.target_categories
    }

    // ===== arguments =====

    pub fn argument(&self, field_name: &str) -> Result<ArgId> {
        match self.arg_index.get(field_name) {
            Some(&id) => Ok(id),
            None => missing_elem!("DataDictionary", field_name),
        }
    }

    pub fn argument_info(&self, id: ArgId) -> &Argument {
        &self.arguments[id as usize]
    }

    // ===== tables =====

    pub fn add_table(&mut self, table: Table) -> TableId {
        let id = self.tables.len() as TableId;
        self.tables.push(table);
        id
    }

    /// Interns a membership bit set; equal bit patterns share one table.
    pub fn intern_bit_set(&mut self, words: Vec<u64>) -> TableId {
        if let Some(&id) = self.bit_set_index.get(&words) {
            return id;
        }
        let name = format!("bits_{}", self.bit_set_index.len());
        let id = self.add_table(Table {
            name,
            data: TableData::BitSet(words.clone()),
        });
        self.bit_set_index.insert(words, id);
        id
    }

    // ===== procedures =====

    /// A previously finished procedure with this name, if any. Helper
    /// procedures are memoized through this: names are content-derived, so
    /// one name means one body.
    pub fn procedure_named(&self, name: &str) -> Option<ProcId> {
        self.proc_index.get(name).copied()
    }

    pub fn begin_procedure(&mut self, name: &str, ret: Type) {
        self.building.push(ProcBuilder::new(name.to_string(), ret));
    }

    pub fn end_procedure(&mut self) -> ProcId {
        let builder = self
            .building
            .pop()
            .expect("end_procedure without begin_procedure");
        debug_assert_eq!(builder.scopes.len(), 1, "unbalanced scopes");

        let id = self.procedures.len() as ProcId;
        self.proc_index.insert(builder.name.clone(), id);
        self.procedures.push(Procedure {
            name: builder.name,
            ret: builder.ret,
            blocks: builder.blocks,
            root: 0,
            locals: builder.locals,
        });
        id
    }

    fn builder(&mut self) -> &mut ProcBuilder {
        self.building
            .last_mut()
            .expect("no procedure under construction")
    }

    // ===== statements & locals =====

    pub fn push(&mut self, stmt: Stmt) {
        self.builder().current_block().stmts.push(stmt);
    }

    fn add_local(&mut self, name: &str, ty: Type) -> LocalId {
        let builder = self.builder();
        let id = builder.locals.len() as LocalId;
        builder.locals.push(LocalInfo {
            name: name.to_string(),
            ty,
        });
        id
    }

    pub fn declare(&mut self, name: &str, ty: Type, init: Expr) -> LocalId {
        let local = self.add_local(name, ty);
        self.push(Stmt::Declare { local, init });
        local
    }

    pub fn declare_accum(&mut self, name: &str, kind: AccumKind, capacity: Option<usize>) -> LocalId {
        let local = self.add_local(name, Type::Accum(kind));
        self.push(Stmt::DeclareAccum {
            local,
            kind,
            capacity,
        });
        local
    }

    pub fn declare_value_map(&mut self, name: &str) -> LocalId {
        let local = self.add_local(name, Type::ValueMap);
        self.push(Stmt::DeclareValueMap { local });
        local
    }

    // ===== scopes & branches =====

    /// Open an `if (cond) { ... }` branch and make its block the current
    /// scope. Pending child-only non-missing marks land in the new scope.
    pub fn enter_branch(&mut self, cond: Expr) {
        let builder = self.builder();
        let block = builder.blocks.len() as BlockId;
        builder.blocks.push(Block::default());
        let non_missing = std::mem::take(&mut builder.pending);
        builder.current_block().stmts.push(Stmt::If {
            cond,
            then_block: block,
        });
        builder.scopes.push(Scope { block, non_missing });
    }

    pub fn exit_branch(&mut self) {
        let builder = self.builder();
        assert!(builder.scopes.len() > 1, "exit_branch at procedure root");
        builder.scopes.pop();
        builder.pending.clear();
    }

    pub fn mark_non_missing(&mut self, arg: ArgId, mark: NonMissingMark) {
        let builder = self.builder();
        match mark {
            NonMissingMark::ChildrenOnly => {
                builder.pending.insert(arg);
            }
            NonMissingMark::SiblingsAndChildren => {
                builder.scopes.last_mut().unwrap().non_missing.insert(arg);
            }
        }
    }

    /// Whether any enclosing scope of the open procedure established that
    /// this argument is present.
    pub fn is_non_missing(&self, arg: ArgId) -> bool {
        let Some(builder) = self.building.last() else {
            return false;
        };
        builder.scopes.iter().any(|s| s.non_missing.contains(&arg))
    }

    // ===== handoff =====

    pub fn finish(self, entry: ProcId) -> CompiledModel {
        assert!(self.building.is_empty(), "unfinished procedures");
        CompiledModel {
            name: self.name,
            math_context: self.math_context,
            arguments: self.arguments,
            tables: self.tables,
            procedures: self.procedures,
            entry,
            target_categories: self.target_categories,
        }
    }
}
