// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The abstract procedure IR we compile models into.
//!
//! A [`CompiledModel`] is the complete handoff to a code emitter: decoded
//! argument slots, interned read-only tables, and a set of procedures with
//! one designated entry point. Statements and expressions are a closed
//! vocabulary; the accumulator, value-map and normalization operations name
//! runtime numeric library calls the emitter renders against its target.

use smallvec::SmallVec;

use crate::datamodel::{DataType, Literal, MathContext, NormalizationMethod};
use crate::encoders::Encoder;

pub type ProcId = u16;
pub type BlockId = u16;
pub type LocalId = u16;
pub type ArgId = u16;
pub type TableId = u16;

/// The integer a node-evaluator procedure returns when no node accepts the
/// input. Also the ordinal encoding of a missing categorical value.
pub const NULL_RESULT: i64 = -1;

/// One row of per-category scores (record counts or probabilities).
pub type ScoreRow = SmallVec<[f64; 4]>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Type {
    /// Plain integer, e.g. a node index.
    Int,
    /// A borrowed score row.
    Row,
    /// A runtime value in the unit's math context.
    Value,
    /// A category-to-value map under construction.
    ValueMap,
    /// A streaming aggregate.
    Accum(AccumKind),
    /// The final result of a classification entry procedure.
    Classification,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Ge,
    Gt,
}

/// Which runtime aggregate a local holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccumKind {
    Statistic,
    WeightedStatistic,
    Median,
    WeightedMedian,
    ProbabilityAverage,
    ProbabilityWeightedAverage,
}

/// The terminal operation read out of an aggregate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccumFinishOp {
    Sum,
    WeightedSum,
    Average,
    WeightedAverage,
    Median,
    WeightedMedian,
    AverageMap,
    WeightedAverageMap,
}

/// How a category-to-value map is read as a classification result.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DistributionKind {
    Probability,
    Vote,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Lit(Literal),
    Local(LocalId),
    /// The decoded value of an argument slot.
    Arg(ArgId),
    IsMissing(ArgId),
    IsNotMissing(ArgId),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// Membership test against an interned bit set; the operand is an
    /// ordinal-encoded index.
    InBitSet { table: TableId, index: Box<Expr> },
    /// Membership test against a short inline literal list.
    InLiteralSet { values: Vec<Literal>, operand: Box<Expr> },
    /// Index into an interned numeric score table.
    ScoreLookup { table: TableId, index: Box<Expr> },
    /// Index into an interned score-distribution table, yielding a row.
    RowLookup { table: TableId, index: Box<Expr> },
    /// One component of a score row.
    RowComponent(Box<Expr>, u16),
    /// Keyed lookup in an interned coefficient table; an absent key yields
    /// zero.
    CoeffLookup { table: TableId, key: Box<Expr> },
    CallProc(ProcId),
    /// Value-factory construction from a constant, in the unit's math
    /// context.
    NewValue(f64),
    /// Value-factory construction from a computed operand.
    NewValueFrom(Box<Expr>),
    ValueScale { value: Box<Expr>, factor: f64 },
    ValueOffset { value: Box<Expr>, offset: f64 },
    AccumFinish { local: LocalId, op: AccumFinishOp },
    /// Read a finished value map out as a classification result.
    Distribution(DistributionKind, LocalId),
    /// True when a sub-result is present (not the null sentinel).
    IsNotNull(Box<Expr>),
    Null,
}

impl Expr {
    pub fn cmp(op: CmpOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Cmp(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Expr {
        Expr::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn not(operand: Expr) -> Expr {
        Expr::Not(Box::new(operand))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Declare { local: LocalId, init: Expr },
    DeclareAccum {
        local: LocalId,
        kind: AccumKind,
        /// Median aggregates pre-size their buffer to the segment count.
        capacity: Option<usize>,
    },
    /// Seed a probability aggregate with the unit's target categories.
    AccumInitCategories { local: LocalId },
    AccumAdd {
        local: LocalId,
        value: Expr,
        weight: Option<f64>,
    },
    DeclareValueMap { local: LocalId },
    ValueMapPut {
        local: LocalId,
        category: Literal,
        value: Expr,
    },
    /// `local += value`
    ValueAdd { local: LocalId, value: Expr },
    /// `local += coefficient * value`
    ValueAddScaled {
        local: LocalId,
        coefficient: f64,
        value: Expr,
    },
    /// `local += coefficient * value^exponent`
    ValueAddTerm {
        local: LocalId,
        coefficient: f64,
        value: Expr,
        exponent: i32,
    },
    /// `local += constant`
    ValueAddConst { local: LocalId, value: f64 },
    /// Apply a regression normalization method to a scalar value in place.
    Normalize {
        local: LocalId,
        method: NormalizationMethod,
    },
    /// Turn a two-entry value map of raw scores into probabilities; the
    /// second category receives the complement of the first.
    ComputeBinomialProbabilities {
        map: LocalId,
        method: NormalizationMethod,
    },
    /// Normalize a value map of raw scores across all categories.
    ComputeMultinomialProbabilities {
        map: LocalId,
        method: NormalizationMethod,
    },
    /// Branch into a nested block when the condition holds.
    If { cond: Expr, then_block: BlockId },
    ReturnIf { cond: Expr, value: Expr },
    Return(Expr),
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocalInfo {
    pub name: String,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Procedure {
    pub name: String,
    pub ret: Type,
    /// Block arena; nested scopes are blocks referenced by `If` statements.
    pub blocks: Vec<Block>,
    pub root: BlockId,
    pub locals: Vec<LocalInfo>,
}

impl Procedure {
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id as usize]
    }
}

/// Interned read-only data referenced by procedures.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub name: String,
    pub data: TableData,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TableData {
    /// Deduplicated numeric scores, indexed by the node procedure's result.
    Scores(Vec<f64>),
    /// Deduplicated per-category score rows.
    ScoreRows(Vec<ScoreRow>),
    /// Packed membership bits over ordinal-encoded indices.
    BitSet(Vec<u64>),
    /// Category-keyed coefficients; keys are encoded when the field is.
    Coefficients(Vec<(Literal, f64)>),
}

/// One input slot of the compiled unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Argument {
    pub field: String,
    pub data_type: DataType,
    pub encoder: Option<Encoder>,
    /// Primary arguments are decoded unconditionally at entry; the rest
    /// lazily on first read.
    pub primary: bool,
    /// Stable generated variable name.
    pub name: String,
}

/// The complete compiled unit handed to a code emitter.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledModel {
    pub name: String,
    pub math_context: MathContext,
    pub arguments: Vec<Argument>,
    pub tables: Vec<Table>,
    pub procedures: Vec<Procedure>,
    pub entry: ProcId,
    /// Classification target categories, in output order.
    pub target_categories: Vec<Literal>,
}

impl CompiledModel {
    pub fn entry_procedure(&self) -> &Procedure {
        &self.procedures[self.entry as usize]
    }

    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id as usize]
    }
}
