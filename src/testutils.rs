// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! A reference evaluator of the procedure IR, for tests only.
//!
//! This is the executable definition of the runtime contract a code
//! emitter has to meet: argument decoding per encoder, the accumulator and
//! value-map operations, normalization, and the probability combinations.
//! Tests compile a model and score it here instead of inspecting IR shapes.

use std::collections::HashMap;

use crate::datamodel::{Literal, NormalizationMethod};
use crate::encoders::{Encoder, MISSING_VALUE};
use crate::procedure::{
    AccumFinishOp, AccumKind, ArgId, BlockId, CmpOp, CompiledModel, Expr, ProcId, Procedure,
    ScoreRow, Stmt, TableData,
};

/// Convenience constructor for the input map; absent fields are missing.
pub fn inputs(pairs: &[(&str, Literal)]) -> HashMap<String, Literal> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Null,
    Value(f64),
    Classification(Vec<(Literal, f64)>),
}

pub fn evaluate(unit: &CompiledModel, inputs: &HashMap<String, Literal>) -> Outcome {
    let evaluator = Evaluator::new(unit, inputs);
    match evaluator.run_proc(unit.entry) {
        Rt::Null => Outcome::Null,
        Rt::Float(v) => Outcome::Value(v),
        Rt::Int(v) => Outcome::Value(v as f64),
        Rt::Map(entries) => Outcome::Classification(entries),
        other => panic!("entry procedure returned {other:?}"),
    }
}

#[derive(Clone, Debug)]
enum Rt {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Row(ScoreRow),
    Map(Vec<(Literal, f64)>),
    Accum(Accum),
}

#[derive(Clone, Debug)]
enum Accum {
    Stat {
        sum: f64,
        count: usize,
    },
    WeightedStat {
        sum: f64,
        wsum: f64,
        count: usize,
    },
    Median(Vec<f64>),
    WeightedMedian(Vec<(f64, f64)>),
    Prob {
        sums: Vec<f64>,
        count: usize,
        wsum: f64,
    },
}

impl Accum {
    fn new(kind: AccumKind) -> Accum {
        match kind {
            AccumKind::Statistic => Accum::Stat { sum: 0.0, count: 0 },
            AccumKind::WeightedStatistic => Accum::WeightedStat {
                sum: 0.0,
                wsum: 0.0,
                count: 0,
            },
            AccumKind::Median => Accum::Median(Vec::new()),
            AccumKind::WeightedMedian => Accum::WeightedMedian(Vec::new()),
            AccumKind::ProbabilityAverage | AccumKind::ProbabilityWeightedAverage => Accum::Prob {
                sums: Vec::new(),
                count: 0,
                wsum: 0.0,
            },
        }
    }
}

enum Flow {
    Normal,
    Return(Rt),
}

struct Evaluator<'a> {
    unit: &'a CompiledModel,
    args: Vec<Rt>,
}

impl<'a> Evaluator<'a> {
    fn new(unit: &'a CompiledModel, inputs: &HashMap<String, Literal>) -> Self {
        let args = unit
            .arguments
            .iter()
            .map(|arg| {
                let raw = inputs.get(&arg.field);
                match &arg.encoder {
                    Some(Encoder::Ordinal(ordinal)) => match raw {
                        Some(v) => Rt::Int(ordinal.encode(v)),
                        None => Rt::Int(MISSING_VALUE),
                    },
                    Some(Encoder::FpPrimitive) => match raw.and_then(|v| v.as_f64()) {
                        Some(v) => Rt::Float(v),
                        None => Rt::Float(f64::NAN),
                    },
                    None => match raw {
                        Some(Literal::Int(v)) => Rt::Int(*v),
                        Some(Literal::Float(v)) => Rt::Float(v.into_inner()),
                        Some(Literal::Bool(v)) => Rt::Bool(*v),
                        Some(Literal::Str(v)) => Rt::Str(v.clone()),
                        None => Rt::Null,
                    },
                }
            })
            .collect();
        Evaluator { unit, args }
    }

    fn run_proc(&self, id: ProcId) -> Rt {
        let proc = &self.unit.procedures[id as usize];
        let mut locals: Vec<Rt> = vec![Rt::Null; proc.locals.len()];
        match self.run_block(proc, proc.root, &mut locals) {
            Flow::Return(v) => v,
            Flow::Normal => panic!("procedure {} fell off the end", proc.name),
        }
    }

    fn run_block(&self, proc: &Procedure, block: BlockId, locals: &mut Vec<Rt>) -> Flow {
        for stmt in &proc.block(block).stmts {
            match stmt {
                Stmt::Declare { local, init } => {
                    locals[*local as usize] = self.eval(init, locals);
                }
                Stmt::DeclareAccum { local, kind, .. } => {
                    locals[*local as usize] = Rt::Accum(Accum::new(*kind));
                }
                Stmt::AccumInitCategories { local } => {
                    let n = self.unit.target_categories.len();
                    let Rt::Accum(Accum::Prob { sums, .. }) = &mut locals[*local as usize] else {
                        panic!("init categories on a non-probability aggregate");
                    };
                    *sums = vec![0.0; n];
                }
                Stmt::AccumAdd {
                    local,
                    value,
                    weight,
                } => {
                    let v = self.eval(value, locals);
                    let w = weight.unwrap_or(1.0);
                    let Rt::Accum(accum) = &mut locals[*local as usize] else {
                        panic!("accumulate into a non-aggregate local");
                    };
                    match accum {
                        Accum::Stat { sum, count } => {
                            *sum += to_f64(&v);
                            *count += 1;
                        }
                        Accum::WeightedStat { sum, wsum, count } => {
                            *sum += w * to_f64(&v);
                            *wsum += w;
                            *count += 1;
                        }
                        Accum::Median(values) => values.push(to_f64(&v)),
                        Accum::WeightedMedian(values) => values.push((to_f64(&v), w)),
                        Accum::Prob { sums, count, wsum } => {
                            let Rt::Row(row) = v else {
                                panic!("probability aggregate takes a score row");
                            };
                            for (s, r) in sums.iter_mut().zip(row.iter()) {
                                *s += w * r;
                            }
                            *count += 1;
                            *wsum += w;
                        }
                    }
                }
                Stmt::DeclareValueMap { local } => {
                    locals[*local as usize] = Rt::Map(Vec::new());
                }
                Stmt::ValueMapPut {
                    local,
                    category,
                    value,
                } => {
                    let v = to_f64(&self.eval(value, locals));
                    let Rt::Map(entries) = &mut locals[*local as usize] else {
                        panic!("put into a non-map local");
                    };
                    match entries.iter_mut().find(|(c, _)| c == category) {
                        Some(entry) => entry.1 = v,
                        None => entries.push((category.clone(), v)),
                    }
                }
                Stmt::ValueAdd { local, value } => {
                    let v = to_f64(&self.eval(value, locals));
                    add_to(locals, *local, v);
                }
                Stmt::ValueAddScaled {
                    local,
                    coefficient,
                    value,
                } => {
                    let v = to_f64(&self.eval(value, locals));
                    add_to(locals, *local, coefficient * v);
                }
                Stmt::ValueAddTerm {
                    local,
                    coefficient,
                    value,
                    exponent,
                } => {
                    let v = to_f64(&self.eval(value, locals));
                    add_to(locals, *local, coefficient * v.powi(*exponent));
                }
                Stmt::ValueAddConst { local, value } => {
                    add_to(locals, *local, *value);
                }
                Stmt::Normalize { local, method } => {
                    let v = to_f64(&locals[*local as usize]);
                    let n = match method {
                        NormalizationMethod::None => v,
                        NormalizationMethod::SoftMax | NormalizationMethod::Logit => sigmoid(v),
                        NormalizationMethod::Exp => v.exp(),
                        other => panic!("normalization {other:?} on a scalar"),
                    };
                    locals[*local as usize] = Rt::Float(n);
                }
                Stmt::ComputeBinomialProbabilities { map, method } => {
                    let Rt::Map(entries) = &mut locals[*map as usize] else {
                        panic!("binomial combination on a non-map local");
                    };
                    assert_eq!(entries.len(), 1, "binomial map holds the first table only");
                    let p = match method {
                        NormalizationMethod::None => entries[0].1,
                        NormalizationMethod::SoftMax | NormalizationMethod::Logit => {
                            sigmoid(entries[0].1)
                        }
                        other => panic!("binomial combination with {other:?}"),
                    };
                    entries[0].1 = p;
                    let second = self.unit.target_categories[1].clone();
                    entries.push((second, 1.0 - p));
                }
                Stmt::ComputeMultinomialProbabilities { map, method } => {
                    let Rt::Map(entries) = &mut locals[*map as usize] else {
                        panic!("multinomial combination on a non-map local");
                    };
                    match method {
                        NormalizationMethod::None => {}
                        NormalizationMethod::SoftMax => {
                            for e in entries.iter_mut() {
                                e.1 = e.1.exp();
                            }
                            let z: f64 = entries.iter().map(|(_, v)| v).sum();
                            for e in entries.iter_mut() {
                                e.1 /= z;
                            }
                        }
                        NormalizationMethod::SimpleMax => {
                            let z: f64 = entries.iter().map(|(_, v)| v).sum();
                            for e in entries.iter_mut() {
                                e.1 /= z;
                            }
                        }
                        other => panic!("multinomial combination with {other:?}"),
                    }
                }
                Stmt::If { cond, then_block } => {
                    if truthy(&self.eval(cond, locals)) {
                        if let Flow::Return(v) = self.run_block(proc, *then_block, locals) {
                            return Flow::Return(v);
                        }
                    }
                }
                Stmt::ReturnIf { cond, value } => {
                    if truthy(&self.eval(cond, locals)) {
                        return Flow::Return(self.eval(value, locals));
                    }
                }
                Stmt::Return(value) => {
                    return Flow::Return(self.eval(value, locals));
                }
            }
        }
        Flow::Normal
    }

    fn eval(&self, expr: &Expr, locals: &[Rt]) -> Rt {
        match expr {
            Expr::Lit(lit) => match lit {
                Literal::Int(v) => Rt::Int(*v),
                Literal::Float(v) => Rt::Float(v.into_inner()),
                Literal::Bool(v) => Rt::Bool(*v),
                Literal::Str(v) => Rt::Str(v.clone()),
            },
            Expr::Local(id) => locals[*id as usize].clone(),
            Expr::Arg(id) => self.args[*id as usize].clone(),
            Expr::IsMissing(id) => Rt::Bool(self.arg_missing(*id)),
            Expr::IsNotMissing(id) => Rt::Bool(!self.arg_missing(*id)),
            Expr::Cmp(op, lhs, rhs) => {
                let l = self.eval(lhs, locals);
                let r = self.eval(rhs, locals);
                Rt::Bool(compare(*op, &l, &r))
            }
            Expr::And(lhs, rhs) => {
                if truthy(&self.eval(lhs, locals)) {
                    self.eval(rhs, locals)
                } else {
                    Rt::Bool(false)
                }
            }
            Expr::Not(operand) => Rt::Bool(!truthy(&self.eval(operand, locals))),
            Expr::InBitSet { table, index } => {
                let TableData::BitSet(words) = &self.unit.table(*table).data else {
                    panic!("bit-set test against a non-bit-set table");
                };
                let idx = to_i64(&self.eval(index, locals));
                let member = idx >= 0
                    && (idx as usize) < words.len() * 64
                    && words[idx as usize / 64] & (1u64 << (idx as usize % 64)) != 0;
                Rt::Bool(member)
            }
            Expr::InLiteralSet { values, operand } => {
                let v = self.eval(operand, locals);
                Rt::Bool(values.iter().any(|lit| rt_matches_literal(&v, lit)))
            }
            Expr::ScoreLookup { table, index } => {
                let TableData::Scores(scores) = &self.unit.table(*table).data else {
                    panic!("score lookup against a non-score table");
                };
                Rt::Float(scores[to_i64(&self.eval(index, locals)) as usize])
            }
            Expr::RowLookup { table, index } => {
                let TableData::ScoreRows(rows) = &self.unit.table(*table).data else {
                    panic!("row lookup against a non-row table");
                };
                Rt::Row(rows[to_i64(&self.eval(index, locals)) as usize].clone())
            }
            Expr::RowComponent(row, i) => {
                let Rt::Row(row) = self.eval(row, locals) else {
                    panic!("component of a non-row");
                };
                Rt::Float(row[*i as usize])
            }
            Expr::CoeffLookup { table, key } => {
                let TableData::Coefficients(entries) = &self.unit.table(*table).data else {
                    panic!("coefficient lookup against a non-coefficient table");
                };
                let k = self.eval(key, locals);
                let coefficient = entries
                    .iter()
                    .find(|(lit, _)| rt_matches_literal(&k, lit))
                    .map(|(_, c)| *c)
                    .unwrap_or(0.0);
                Rt::Float(coefficient)
            }
            Expr::CallProc(id) => self.run_proc(*id),
            Expr::NewValue(v) => Rt::Float(*v),
            Expr::NewValueFrom(operand) => Rt::Float(to_f64(&self.eval(operand, locals))),
            Expr::ValueScale { value, factor } => {
                Rt::Float(factor * to_f64(&self.eval(value, locals)))
            }
            Expr::ValueOffset { value, offset } => {
                Rt::Float(offset + to_f64(&self.eval(value, locals)))
            }
            Expr::AccumFinish { local, op } => {
                let Rt::Accum(accum) = &locals[*local as usize] else {
                    panic!("finish on a non-aggregate local");
                };
                finish(accum, *op, &self.unit.target_categories)
            }
            Expr::Distribution(_, local) => locals[*local as usize].clone(),
            Expr::IsNotNull(operand) => {
                Rt::Bool(!matches!(self.eval(operand, locals), Rt::Null))
            }
            Expr::Null => Rt::Null,
        }
    }

    fn arg_missing(&self, id: ArgId) -> bool {
        match (&self.unit.arguments[id as usize].encoder, &self.args[id as usize]) {
            (Some(Encoder::Ordinal(_)), Rt::Int(v)) => *v == MISSING_VALUE,
            (Some(Encoder::FpPrimitive), Rt::Float(v)) => v.is_nan(),
            (None, rt) => matches!(rt, Rt::Null),
            (encoder, rt) => panic!("argument {encoder:?} decoded to {rt:?}"),
        }
    }
}

fn finish(accum: &Accum, op: AccumFinishOp, categories: &[Literal]) -> Rt {
    match (accum, op) {
        (Accum::Stat { count: 0, .. }, _)
        | (Accum::WeightedStat { count: 0, .. }, _) => Rt::Null,
        (Accum::Stat { sum, .. }, AccumFinishOp::Sum) => Rt::Float(*sum),
        (Accum::Stat { sum, count }, AccumFinishOp::Average) => Rt::Float(sum / *count as f64),
        (Accum::WeightedStat { sum, .. }, AccumFinishOp::WeightedSum) => Rt::Float(*sum),
        (Accum::WeightedStat { sum, wsum, .. }, AccumFinishOp::WeightedAverage) => {
            Rt::Float(sum / wsum)
        }
        (Accum::Median(values), AccumFinishOp::Median) => {
            if values.is_empty() {
                return Rt::Null;
            }
            let mut sorted = values.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let n = sorted.len();
            let m = if n % 2 == 1 {
                sorted[n / 2]
            } else {
                (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
            };
            Rt::Float(m)
        }
        (Accum::WeightedMedian(values), AccumFinishOp::WeightedMedian) => {
            if values.is_empty() {
                return Rt::Null;
            }
            let mut sorted = values.clone();
            sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
            let total: f64 = sorted.iter().map(|(_, w)| w).sum();
            let mut cum = 0.0;
            for (v, w) in &sorted {
                cum += w;
                if cum >= total / 2.0 {
                    return Rt::Float(*v);
                }
            }
            Rt::Float(sorted.last().unwrap().0)
        }
        (Accum::Prob { count: 0, .. }, _) => Rt::Null,
        (Accum::Prob { sums, count, .. }, AccumFinishOp::AverageMap) => Rt::Map(
            categories
                .iter()
                .zip(sums.iter())
                .map(|(c, s)| (c.clone(), s / *count as f64))
                .collect(),
        ),
        (Accum::Prob { sums, wsum, .. }, AccumFinishOp::WeightedAverageMap) => Rt::Map(
            categories
                .iter()
                .zip(sums.iter())
                .map(|(c, s)| (c.clone(), s / wsum))
                .collect(),
        ),
        (accum, op) => panic!("finish {op:?} on {accum:?}"),
    }
}

fn add_to(locals: &mut [Rt], local: u16, delta: f64) {
    let current = to_f64(&locals[local as usize]);
    locals[local as usize] = Rt::Float(current + delta);
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

fn to_f64(rt: &Rt) -> f64 {
    match rt {
        Rt::Int(v) => *v as f64,
        Rt::Float(v) => *v,
        Rt::Bool(v) => {
            if *v {
                1.0
            } else {
                0.0
            }
        }
        other => panic!("{other:?} is not numeric"),
    }
}

fn to_i64(rt: &Rt) -> i64 {
    match rt {
        Rt::Int(v) => *v,
        other => panic!("{other:?} is not an integer"),
    }
}

fn truthy(rt: &Rt) -> bool {
    match rt {
        Rt::Bool(v) => *v,
        other => panic!("{other:?} is not a condition"),
    }
}

fn compare(op: CmpOp, lhs: &Rt, rhs: &Rt) -> bool {
    // string equality for unencoded categorical reads
    if let (Rt::Str(l), Rt::Str(r)) = (lhs, rhs) {
        return match op {
            CmpOp::Eq => l == r,
            CmpOp::Ne => l != r,
            _ => panic!("ordered comparison on strings"),
        };
    }
    if matches!(lhs, Rt::Null) || matches!(rhs, Rt::Null) {
        // a null operand satisfies only inequality
        return op == CmpOp::Ne;
    }
    let l = to_f64(lhs);
    let r = to_f64(rhs);
    match op {
        CmpOp::Eq => l == r,
        CmpOp::Ne => l != r,
        CmpOp::Lt => l < r,
        CmpOp::Le => l <= r,
        CmpOp::Ge => l >= r,
        CmpOp::Gt => l > r,
    }
}

fn rt_matches_literal(rt: &Rt, lit: &Literal) -> bool {
    match (rt, lit) {
        (Rt::Str(v), Literal::Str(l)) => v == l,
        (Rt::Bool(v), Literal::Bool(l)) => v == l,
        (Rt::Int(v), Literal::Int(l)) => v == l,
        (Rt::Int(v), Literal::Float(l)) => *v as f64 == l.into_inner(),
        (Rt::Float(v), _) => lit.as_f64().map(|l| *v == l).unwrap_or(false),
        (Rt::Int(v), _) => lit.as_f64().map(|l| *v as f64 == l).unwrap_or(false),
        _ => false,
    }
}
