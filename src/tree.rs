// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Decision-tree translation.
//!
//! A tree compiles to two procedures: a private node evaluator returning a
//! dense score index (or `NULL_RESULT` when no node accepts the input), and
//! an entry procedure mapping that index through the interned score table.
//! Guards become nested branches; how a guard treats a missing operand
//! depends on the model's missing-value strategy.

use crate::arrays::{ScoreDistributionManager, ScoreManager};
use crate::common::Result;
use crate::context::{NonMissingMark, TranslationContext};
use crate::datamodel::{
    Literal, MathContext, MiningFunction, MissingValueStrategy, NoTrueChildStrategy, Node,
    Predicate, SetOp, SimpleOp, TreeModel,
};
use crate::encoders::Encoder;
use crate::procedure::{
    ArgId, CmpOp, DistributionKind, Expr, ProcId, Stmt, TableId, Type, NULL_RESULT,
};
use crate::{invalid_elem, missing_attr, unsupported_attr, unsupported_elem};

pub struct TreeModelTranslator<'a> {
    model: &'a TreeModel,
}

impl<'a> TreeModelTranslator<'a> {
    pub fn new(model: &'a TreeModel) -> Result<Self> {
        match model.mining_function {
            MiningFunction::Regression | MiningFunction::Classification => {}
            other => return unsupported_attr!("TreeModel", other),
        }
        match model.math_context {
            MathContext::Float | MathContext::Double => {}
            other => return unsupported_attr!("TreeModel", other),
        }
        match model.missing_value_strategy {
            MissingValueStrategy::None | MissingValueStrategy::NullPrediction => {}
            other => return unsupported_attr!("TreeModel", other),
        }
        if model.mining_function == MiningFunction::Classification
            && model.target_categories.is_empty()
        {
            return missing_attr!("TreeModel", "targetCategories");
        }
        Ok(TreeModelTranslator { model })
    }

    pub fn model(&self) -> &TreeModel {
        self.model
    }

    /// Compile the node evaluator and the scalar score table for a
    /// regression tree. Ensemble translators aggregate over these directly.
    pub fn compile_regressor_nodes(
        &self,
        ctx: &mut TranslationContext,
        path: &str,
    ) -> Result<(ProcId, TableId)> {
        let mut scores = RegressorScores(ScoreManager::new());
        ctx.begin_procedure(&suffixed("eval_node", path), Type::Int);
        self.translate_node(ctx, &self.model.root, &mut scores)?;
        let node_proc = ctx.end_procedure();
        let table = ctx.add_table(scores.0.finish(suffixed("scores", path)));
        Ok((node_proc, table))
    }

    /// Compile the node evaluator and the score-distribution table for a
    /// classification tree.
    pub fn compile_classifier_nodes(
        &self,
        ctx: &mut TranslationContext,
        path: &str,
    ) -> Result<(ProcId, TableId)> {
        let mut scores = ClassifierScores {
            manager: ScoreDistributionManager::new(),
            n_categories: self.model.target_categories.len(),
        };
        ctx.begin_procedure(&suffixed("eval_node", path), Type::Int);
        self.translate_node(ctx, &self.model.root, &mut scores)?;
        let node_proc = ctx.end_procedure();
        let table = ctx.add_table(scores.manager.finish(suffixed("scores", path)));
        Ok((node_proc, table))
    }

    /// Entry procedure of a standalone regression tree.
    pub fn translate_regressor(
        &self,
        ctx: &mut TranslationContext,
        path: &str,
    ) -> Result<ProcId> {
        let (node_proc, table) = self.compile_regressor_nodes(ctx, path)?;

        ctx.begin_procedure(&suffixed("eval_tree", path), Type::Value);
        let result = ctx.declare("result", Type::Int, Expr::CallProc(node_proc));
        ctx.push(Stmt::ReturnIf {
            cond: Expr::cmp(
                CmpOp::Eq,
                Expr::Local(result),
                Expr::Lit(Literal::Int(NULL_RESULT)),
            ),
            value: Expr::Null,
        });
        ctx.push(Stmt::Return(Expr::NewValueFrom(Box::new(
            Expr::ScoreLookup {
                table,
                index: Box::new(Expr::Local(result)),
            },
        ))));
        Ok(ctx.end_procedure())
    }

    /// Entry procedure of a standalone classification tree.
    pub fn translate_classifier(
        &self,
        ctx: &mut TranslationContext,
        path: &str,
    ) -> Result<ProcId> {
        let (node_proc, table) = self.compile_classifier_nodes(ctx, path)?;

        ctx.begin_procedure(&suffixed("eval_tree", path), Type::Classification);
        let result = ctx.declare("result", Type::Int, Expr::CallProc(node_proc));
        ctx.push(Stmt::ReturnIf {
            cond: Expr::cmp(
                CmpOp::Eq,
                Expr::Local(result),
                Expr::Lit(Literal::Int(NULL_RESULT)),
            ),
            value: Expr::Null,
        });
        let row = ctx.declare(
            "scores",
            Type::Row,
            Expr::RowLookup {
                table,
                index: Box::new(Expr::Local(result)),
            },
        );
        let map = ctx.declare_value_map("probabilities");
        for (i, category) in self.model.target_categories.iter().enumerate() {
            ctx.push(Stmt::ValueMapPut {
                local: map,
                category: category.clone(),
                value: Expr::NewValueFrom(Box::new(Expr::RowComponent(
                    Box::new(Expr::Local(row)),
                    i as u16,
                ))),
            });
        }
        ctx.push(Stmt::Return(Expr::Distribution(
            DistributionKind::Probability,
            map,
        )));
        Ok(ctx.end_procedure())
    }

    fn translate_node(
        &self,
        ctx: &mut TranslationContext,
        node: &Node,
        scores: &mut dyn NodeScores,
    ) -> Result<()> {
        for child in &node.children {
            let cond = self.translate_predicate(ctx, &child.predicate)?;
            ctx.enter_branch(cond);
            self.translate_node(ctx, child, scores)?;
            ctx.exit_branch();
        }

        let index = scores.intern(node)?;
        let terminal = if node.is_leaf() {
            match index {
                Some(i) => i as i64,
                None => return missing_attr!("Node", "score"),
            }
        } else {
            match self.model.no_true_child_strategy {
                NoTrueChildStrategy::ReturnLastPrediction => match index {
                    Some(i) => i as i64,
                    None => NULL_RESULT,
                },
                NoTrueChildStrategy::ReturnNullPrediction => NULL_RESULT,
            }
        };
        ctx.push(Stmt::Return(Expr::Lit(Literal::Int(terminal))));
        Ok(())
    }

    /// Translate a guard into a branch condition, recording non-missing
    /// knowledge and (under the null-prediction strategy) emitting the
    /// early sentinel return for a missing operand.
    fn translate_predicate(
        &self,
        ctx: &mut TranslationContext,
        predicate: &Predicate,
    ) -> Result<Expr> {
        match predicate {
            Predicate::True => Ok(Expr::Lit(Literal::Bool(true))),
            Predicate::False => Ok(Expr::Lit(Literal::Bool(false))),
            Predicate::Compound { .. } => unsupported_elem!("CompoundPredicate"),
            Predicate::Simple { field, op, value } => {
                let arg = ctx.argument(field)?;
                match op {
                    SimpleOp::IsMissing => Ok(Expr::IsMissing(arg)),
                    SimpleOp::IsNotMissing => {
                        ctx.mark_non_missing(arg, NonMissingMark::ChildrenOnly);
                        Ok(Expr::IsNotMissing(arg))
                    }
                    _ => {
                        let cmp = self.comparison(ctx, arg, *op, value)?;
                        // a comparison on a missing operand must not accept;
                        // Equal/ordered comparisons reject it on their own
                        // (NaN compares false, the missing ordinal code
                        // matches no domain code), NotEqual does not
                        let safe = !matches!(op, SimpleOp::NotEqual);
                        self.guard_missing(ctx, arg, cmp, safe)
                    }
                }
            }
            Predicate::SimpleSet { field, op, values } => {
                let arg = ctx.argument(field)?;
                let membership = self.membership(ctx, arg, values)?;
                let (cond, safe) = match op {
                    SetOp::IsIn => (membership, true),
                    SetOp::IsNotIn => (Expr::not(membership), false),
                };
                self.guard_missing(ctx, arg, cond, safe)
            }
        }
    }

    fn comparison(
        &self,
        ctx: &TranslationContext,
        arg: ArgId,
        op: SimpleOp,
        value: &Literal,
    ) -> Result<Expr> {
        let cmp_op = match op {
            SimpleOp::Equal => CmpOp::Eq,
            SimpleOp::NotEqual => CmpOp::Ne,
            SimpleOp::LessThan => CmpOp::Lt,
            SimpleOp::LessOrEqual => CmpOp::Le,
            SimpleOp::GreaterOrEqual => CmpOp::Ge,
            SimpleOp::GreaterThan => CmpOp::Gt,
            SimpleOp::IsMissing | SimpleOp::IsNotMissing => unreachable!(),
        };

        let info = ctx.argument_info(arg);
        match &info.encoder {
            Some(Encoder::Ordinal(ordinal)) => {
                if !matches!(cmp_op, CmpOp::Eq | CmpOp::Ne) {
                    return unsupported_elem!(
                        "SimplePredicate",
                        format!("ordered comparison on categorical field {:?}", info.field)
                    );
                }
                let code = ordinal.encode(value);
                Ok(Expr::cmp(
                    cmp_op,
                    Expr::Arg(arg),
                    Expr::Lit(Literal::Int(code)),
                ))
            }
            _ => {
                let Some(v) = value.as_f64() else {
                    return invalid_elem!(
                        "SimplePredicate",
                        format!("non-numeric comparison value {value:?}")
                    );
                };
                Ok(Expr::cmp(cmp_op, Expr::Arg(arg), Expr::Lit(Literal::from(v))))
            }
        }
    }

    fn membership(
        &self,
        ctx: &mut TranslationContext,
        arg: ArgId,
        values: &[Literal],
    ) -> Result<Expr> {
        let info = ctx.argument_info(arg);
        match &info.encoder {
            Some(Encoder::Ordinal(ordinal)) => {
                let words = ordinal.bit_set(values);
                let table = ctx.intern_bit_set(words);
                Ok(Expr::InBitSet {
                    table,
                    index: Box::new(Expr::Arg(arg)),
                })
            }
            _ => Ok(Expr::InLiteralSet {
                values: values.to_vec(),
                operand: Box::new(Expr::Arg(arg)),
            }),
        }
    }

    /// Apply the model's missing-value strategy around a translated
    /// condition. `safe` means the condition already rejects a missing
    /// operand by itself.
    fn guard_missing(
        &self,
        ctx: &mut TranslationContext,
        arg: ArgId,
        cond: Expr,
        safe: bool,
    ) -> Result<Expr> {
        if ctx.is_non_missing(arg) {
            return Ok(cond);
        }
        match self.model.missing_value_strategy {
            MissingValueStrategy::NullPrediction => {
                ctx.push(Stmt::ReturnIf {
                    cond: Expr::IsMissing(arg),
                    value: Expr::Lit(Literal::Int(NULL_RESULT)),
                });
                ctx.mark_non_missing(arg, NonMissingMark::SiblingsAndChildren);
                Ok(cond)
            }
            MissingValueStrategy::None => {
                ctx.mark_non_missing(arg, NonMissingMark::ChildrenOnly);
                if safe {
                    Ok(cond)
                } else {
                    Ok(Expr::and(Expr::IsNotMissing(arg), cond))
                }
            }
            _ => unreachable!("validated in new()"),
        }
    }
}

fn suffixed(base: &str, path: &str) -> String {
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}_{path}")
    }
}

trait NodeScores {
    /// Intern this node's prediction, if it carries one.
    fn intern(&mut self, node: &Node) -> Result<Option<usize>>;
}

struct RegressorScores(ScoreManager);

impl NodeScores for RegressorScores {
    fn intern(&mut self, node: &Node) -> Result<Option<usize>> {
        match &node.score {
            None => Ok(None),
            Some(score) => match score.as_f64() {
                Some(v) => Ok(Some(self.0.get_or_insert(v))),
                None => invalid_elem!("Node", format!("non-numeric score {score:?}")),
            },
        }
    }
}

struct ClassifierScores {
    manager: ScoreDistributionManager,
    n_categories: usize,
}

impl NodeScores for ClassifierScores {
    fn intern(&mut self, node: &Node) -> Result<Option<usize>> {
        if node.distribution.is_empty() {
            return Ok(None);
        }
        if node.distribution.len() != self.n_categories {
            return invalid_elem!(
                "Node",
                format!(
                    "distribution over {} categories, expected {}",
                    node.distribution.len(),
                    self.n_categories
                )
            );
        }
        Ok(Some(self.manager.get_or_insert(&node.distribution)))
    }
}
