// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Ensemble translation.
//!
//! Two shapes are supported. An aggregation ensemble runs every segment's
//! tree and folds the per-segment results through a streaming aggregate
//! (sum, average, median, their weighted variants, or probability
//! averaging for classification). A model chain runs regressor segments
//! whose predicted values feed a terminal classification regression model.

use std::collections::HashMap;

use crate::common::{Result, sanitize};
use crate::context::TranslationContext;
use crate::datamodel::{
    Literal, MathContext, MiningFunction, MiningModel, MissingPredictionTreatment, Model,
    MultipleModelMethod, Predicate, RegressionModel, ResultFeature, Segment,
};
use crate::procedure::{
    AccumFinishOp, AccumKind, CmpOp, DistributionKind, Expr, LocalId, ProcId, Stmt, TableId, Type,
    NULL_RESULT,
};
use crate::regression::RegressionModelTranslator;
use crate::tree::TreeModelTranslator;
use crate::{invalid_elem, missing_attr, missing_elem, unsupported_attr, unsupported_elem};

/// Error object for a segment, carrying its id when the model names one.
fn segment_object(segment: &Segment) -> String {
    match &segment.id {
        Some(id) => format!("Segment({id})"),
        None => "Segment".to_string(),
    }
}

// ===== aggregation ensembles =====

#[derive(Debug)]
pub struct AggregatorTranslator<'a> {
    model: &'a MiningModel,
}

impl<'a> AggregatorTranslator<'a> {
    pub fn new(model: &'a MiningModel) -> Result<Self> {
        let segmentation = &model.segmentation;
        match model.math_context {
            MathContext::Float | MathContext::Double => {}
            other => return unsupported_attr!("MiningModel", other),
        }
        match segmentation.missing_prediction_treatment {
            MissingPredictionTreatment::ReturnMissing | MissingPredictionTreatment::Continue => {}
            other => return unsupported_attr!("Segmentation", other),
        }
        let method_ok = match model.mining_function {
            MiningFunction::Regression => matches!(
                segmentation.method,
                MultipleModelMethod::Sum
                    | MultipleModelMethod::WeightedSum
                    | MultipleModelMethod::Average
                    | MultipleModelMethod::WeightedAverage
                    | MultipleModelMethod::Median
                    | MultipleModelMethod::WeightedMedian
            ),
            MiningFunction::Classification => matches!(
                segmentation.method,
                MultipleModelMethod::Average | MultipleModelMethod::WeightedAverage
            ),
            other => return unsupported_attr!("MiningModel", other),
        };
        if !method_ok {
            return unsupported_attr!("Segmentation", segmentation.method);
        }
        if segmentation.segments.is_empty() {
            return missing_elem!("Segmentation", "Segment");
        }
        for segment in &segmentation.segments {
            if segment.predicate != Predicate::True {
                return unsupported_elem!(segment_object(segment), "non-trivial segment predicate");
            }
            let Model::Tree(tree) = &segment.model else {
                return unsupported_elem!(segment_object(segment), segment.model.kind());
            };
            if tree.mining_function != model.mining_function {
                return invalid_elem!(
                    segment_object(segment),
                    "mining function differs from the ensemble"
                );
            }
            if tree.math_context != model.math_context {
                return unsupported_attr!(segment_object(segment), tree.math_context);
            }
            if model.mining_function == MiningFunction::Classification
                && tree.target_categories != model.target_categories
            {
                return invalid_elem!(
                    segment_object(segment),
                    "target categories differ from the ensemble"
                );
            }
            // runs the tree's own validation up front
            TreeModelTranslator::new(tree)?;
        }
        if model.mining_function == MiningFunction::Classification
            && model.target_categories.is_empty()
        {
            return missing_attr!("MiningModel", "targetCategories");
        }
        Ok(AggregatorTranslator { model })
    }

    pub fn translate(&self, ctx: &mut TranslationContext) -> Result<ProcId> {
        match self.model.mining_function {
            MiningFunction::Regression => self.translate_regressor(ctx),
            MiningFunction::Classification => self.translate_classifier(ctx),
            _ => unreachable!("validated in new()"),
        }
    }

    fn segment_tree(segment: &Segment) -> &crate::datamodel::TreeModel {
        match &segment.model {
            Model::Tree(tree) => tree,
            _ => unreachable!("validated in new()"),
        }
    }

    fn translate_regressor(&self, ctx: &mut TranslationContext) -> Result<ProcId> {
        let segmentation = &self.model.segmentation;
        let mut compiled: Vec<(ProcId, TableId)> = Vec::new();
        for (i, segment) in segmentation.segments.iter().enumerate() {
            let translator = TreeModelTranslator::new(Self::segment_tree(segment))?;
            compiled.push(translator.compile_regressor_nodes(ctx, &format!("s{i}"))?);
        }

        let n = segmentation.segments.len();
        let (kind, finish, weighted) = match segmentation.method {
            MultipleModelMethod::Sum => (AccumKind::Statistic, AccumFinishOp::Sum, false),
            MultipleModelMethod::Average => (AccumKind::Statistic, AccumFinishOp::Average, false),
            MultipleModelMethod::WeightedSum => (
                AccumKind::WeightedStatistic,
                AccumFinishOp::WeightedSum,
                true,
            ),
            MultipleModelMethod::WeightedAverage => (
                AccumKind::WeightedStatistic,
                AccumFinishOp::WeightedAverage,
                true,
            ),
            MultipleModelMethod::Median => (AccumKind::Median, AccumFinishOp::Median, false),
            MultipleModelMethod::WeightedMedian => (
                AccumKind::WeightedMedian,
                AccumFinishOp::WeightedMedian,
                true,
            ),
            _ => unreachable!("validated in new()"),
        };
        let capacity = matches!(kind, AccumKind::Median | AccumKind::WeightedMedian).then_some(n);

        ctx.begin_procedure("eval_ensemble", Type::Value);
        let accum = ctx.declare_accum("aggregator", kind, capacity);
        for (i, segment) in segmentation.segments.iter().enumerate() {
            let (node_proc, table) = compiled[i];
            let result = ctx.declare(&format!("result_{i}"), Type::Int, Expr::CallProc(node_proc));
            let add = Stmt::AccumAdd {
                local: accum,
                value: Expr::ScoreLookup {
                    table,
                    index: Box::new(Expr::Local(result)),
                },
                weight: weighted.then_some(segment.weight),
            };
            self.guard_segment_result(ctx, result, add);
        }
        ctx.push(Stmt::Return(Expr::AccumFinish {
            local: accum,
            op: finish,
        }));
        Ok(ctx.end_procedure())
    }

    fn translate_classifier(&self, ctx: &mut TranslationContext) -> Result<ProcId> {
        let segmentation = &self.model.segmentation;
        let mut compiled: Vec<(ProcId, TableId)> = Vec::new();
        for (i, segment) in segmentation.segments.iter().enumerate() {
            let translator = TreeModelTranslator::new(Self::segment_tree(segment))?;
            compiled.push(translator.compile_classifier_nodes(ctx, &format!("s{i}"))?);
        }

        let (kind, finish, weighted) = match segmentation.method {
            MultipleModelMethod::Average => (
                AccumKind::ProbabilityAverage,
                AccumFinishOp::AverageMap,
                false,
            ),
            MultipleModelMethod::WeightedAverage => (
                AccumKind::ProbabilityWeightedAverage,
                AccumFinishOp::WeightedAverageMap,
                true,
            ),
            _ => unreachable!("validated in new()"),
        };

        ctx.begin_procedure("eval_ensemble", Type::Classification);
        let accum = ctx.declare_accum("aggregator", kind, None);
        ctx.push(Stmt::AccumInitCategories { local: accum });
        for (i, segment) in segmentation.segments.iter().enumerate() {
            let (node_proc, table) = compiled[i];
            let result = ctx.declare(&format!("result_{i}"), Type::Int, Expr::CallProc(node_proc));
            let add = Stmt::AccumAdd {
                local: accum,
                value: Expr::RowLookup {
                    table,
                    index: Box::new(Expr::Local(result)),
                },
                weight: weighted.then_some(segment.weight),
            };
            self.guard_segment_result(ctx, result, add);
        }

        let map = ctx.declare(
            "probabilities",
            Type::ValueMap,
            Expr::AccumFinish {
                local: accum,
                op: finish,
            },
        );
        let n_probability = self
            .model
            .output
            .as_ref()
            .map(|o| o.count_feature(ResultFeature::Probability))
            .unwrap_or(0);
        let kind = if n_probability == self.model.target_categories.len() {
            DistributionKind::Probability
        } else {
            DistributionKind::Vote
        };
        ctx.push(Stmt::Return(Expr::Distribution(kind, map)));
        Ok(ctx.end_procedure())
    }

    /// Apply the segmentation's missing-prediction treatment around one
    /// segment's aggregate update.
    fn guard_segment_result(&self, ctx: &mut TranslationContext, result: LocalId, add: Stmt) {
        let is_null = Expr::cmp(
            CmpOp::Eq,
            Expr::Local(result),
            Expr::Lit(Literal::Int(NULL_RESULT)),
        );
        match self.model.segmentation.missing_prediction_treatment {
            MissingPredictionTreatment::ReturnMissing => {
                ctx.push(Stmt::ReturnIf {
                    cond: is_null,
                    value: Expr::Null,
                });
                ctx.push(add);
            }
            MissingPredictionTreatment::Continue => {
                ctx.enter_branch(Expr::not(is_null));
                ctx.push(add);
                ctx.exit_branch();
            }
            _ => unreachable!("validated in new()"),
        }
    }
}

// ===== model chains =====

#[derive(Debug)]
pub struct ChainTranslator<'a> {
    model: &'a MiningModel,
    terminal: &'a RegressionModel,
}

impl<'a> ChainTranslator<'a> {
    pub fn new(model: &'a MiningModel) -> Result<Self> {
        let segmentation = &model.segmentation;
        match model.math_context {
            MathContext::Float | MathContext::Double => {}
            other => return unsupported_attr!("MiningModel", other),
        }
        if model.mining_function != MiningFunction::Classification {
            return unsupported_attr!("MiningModel", model.mining_function);
        }
        if segmentation.missing_prediction_treatment != MissingPredictionTreatment::ReturnMissing {
            return unsupported_attr!(
                "Segmentation",
                segmentation.missing_prediction_treatment
            );
        }
        if segmentation.segments.len() < 2 {
            return invalid_elem!("Segmentation", "a chain needs at least two segments");
        }

        let Some((terminal, upstream)) = segmentation.segments.split_last() else {
            return missing_elem!("Segmentation", "Segment");
        };
        for segment in segmentation.segments.iter() {
            if segment.predicate != Predicate::True {
                return unsupported_elem!(segment_object(segment), "non-trivial segment predicate");
            }
            if segment.model.math_context() != model.math_context {
                return unsupported_attr!(segment_object(segment), segment.model.math_context());
            }
        }
        for segment in upstream {
            if segment.model.mining_function() != MiningFunction::Regression {
                return invalid_elem!(segment_object(segment), "chained segment is not a regressor");
            }
            // runs each sub-model's own validation up front
            match &segment.model {
                Model::Tree(tree) => {
                    TreeModelTranslator::new(tree)?;
                }
                Model::Regression(regression) => {
                    RegressionModelTranslator::new(regression)?;
                }
                other => return unsupported_elem!(segment_object(segment), other.kind()),
            }
            let Some(output) = segment.model.output() else {
                return missing_elem!(segment_object(segment), "Output");
            };
            if output.fields.len() != 1 {
                return invalid_elem!(
                    segment_object(segment),
                    format!("expected exactly one output field, found {}", output.fields.len())
                );
            }
            if output.fields[0].feature != ResultFeature::PredictedValue {
                return invalid_elem!(
                    segment_object(segment),
                    "chained segment output is not a predicted value"
                );
            }
        }

        let Model::Regression(regression) = &terminal.model else {
            return unsupported_elem!(segment_object(terminal), terminal.model.kind());
        };
        if regression.mining_function != MiningFunction::Classification {
            return invalid_elem!(segment_object(terminal), "terminal chain model is not a classifier");
        }
        if regression.target_categories() != model.target_categories {
            return invalid_elem!(segment_object(terminal), "target categories differ from the chain");
        }
        for table in &regression.tables {
            if table.numeric_predictors.len() > 1 {
                return invalid_elem!(
                    "RegressionTable",
                    "chain terminal tables take at most one numeric predictor"
                );
            }
            if !table.categorical_predictors.is_empty() {
                return unsupported_elem!("CategoricalPredictor");
            }
            for p in &table.numeric_predictors {
                if p.exponent != 1 {
                    return unsupported_attr!("NumericPredictor", p.exponent);
                }
            }
        }
        // runs the terminal model's own validation (tables, normalization)
        RegressionModelTranslator::new(regression)?;

        Ok(ChainTranslator {
            model,
            terminal: regression,
        })
    }

    pub fn translate(&self, ctx: &mut TranslationContext) -> Result<ProcId> {
        let segments = &self.model.segmentation.segments;
        let upstream = &segments[..segments.len() - 1];

        let mut sub_procs: Vec<ProcId> = Vec::new();
        for (i, segment) in upstream.iter().enumerate() {
            let path = format!("s{i}");
            let proc = match &segment.model {
                Model::Tree(tree) => {
                    TreeModelTranslator::new(tree)?.translate_regressor(ctx, &path)?
                }
                Model::Regression(regression) => {
                    RegressionModelTranslator::new(regression)?.translate_regressor(ctx, &path)?
                }
                _ => unreachable!("validated in new()"),
            };
            sub_procs.push(proc);
        }

        ctx.begin_procedure("eval_chain", Type::Classification);

        // one pulled-up intermediate per upstream segment, bound to its
        // predicted-value output field name
        let mut bindings: HashMap<&str, LocalId> = HashMap::new();
        for (i, segment) in upstream.iter().enumerate() {
            let Some(output_field) = segment.model.output().and_then(|o| {
                o.fields
                    .iter()
                    .find(|f| f.feature == ResultFeature::PredictedValue)
            }) else {
                return missing_elem!(segment_object(segment), "Output");
            };
            let local = ctx.declare(
                &format!("value_{}", sanitize(&output_field.name)),
                Type::Value,
                Expr::CallProc(sub_procs[i]),
            );
            ctx.push(Stmt::ReturnIf {
                cond: Expr::not(Expr::IsNotNull(Box::new(Expr::Local(local)))),
                value: Expr::Null,
            });
            bindings.insert(output_field.name.as_str(), local);
        }

        let n_probability = self
            .terminal
            .output
            .as_ref()
            .map(|o| o.count_feature(ResultFeature::Probability))
            .unwrap_or(0);
        let probabilistic = n_probability == self.terminal.tables.len();
        let binomial = self.terminal.tables.len() == 2;

        let map = ctx.declare_value_map("values");
        let evaluated = if binomial {
            &self.terminal.tables[..1]
        } else {
            &self.terminal.tables[..]
        };
        for table in evaluated {
            let value = match table.numeric_predictors.first() {
                Some(p) => {
                    let Some(&local) = bindings.get(p.field.as_str()) else {
                        return invalid_elem!(
                            "NumericPredictor",
                            format!("field {:?} is not a chained result", p.field)
                        );
                    };
                    let mut expr = Expr::Local(local);
                    if p.coefficient != 1.0 {
                        expr = Expr::ValueScale {
                            value: Box::new(expr),
                            factor: p.coefficient,
                        };
                    }
                    if table.intercept != 0.0 {
                        expr = Expr::ValueOffset {
                            value: Box::new(expr),
                            offset: table.intercept,
                        };
                    }
                    expr
                }
                None => Expr::NewValue(table.intercept),
            };
            let Some(category) = table.target_category.clone() else {
                return missing_attr!("RegressionTable", "targetCategory");
            };
            ctx.push(Stmt::ValueMapPut {
                local: map,
                category,
                value,
            });
        }

        if binomial {
            ctx.push(Stmt::ComputeBinomialProbabilities {
                map,
                method: self.terminal.normalization_method,
            });
        } else {
            ctx.push(Stmt::ComputeMultinomialProbabilities {
                map,
                method: self.terminal.normalization_method,
            });
        }
        let kind = if probabilistic {
            DistributionKind::Probability
        } else {
            DistributionKind::Vote
        };
        ctx.push(Stmt::Return(Expr::Distribution(kind, map)));
        Ok(ctx.end_procedure())
    }
}
