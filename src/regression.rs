// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Regression-table translation.
//!
//! A table accumulates into a value local: numeric terms (with the
//! degenerate coefficient/exponent cases folded to cheaper operations),
//! categorical terms through per-field coefficient lookup procedures, then
//! the intercept. A regression model normalizes the scalar; a
//! classification model builds a category-to-value map and combines it
//! into a probability or vote distribution.

use crate::common::{Result, sanitize};
use crate::context::TranslationContext;
use crate::datamodel::{
    CategoricalPredictor, Literal, MathContext, MiningFunction, NormalizationMethod,
    RegressionModel, RegressionTable, ResultFeature,
};
use crate::encoders::Encoder;
use crate::procedure::{
    DistributionKind, Expr, LocalId, ProcId, Stmt, Table, TableData, Type,
};
use crate::{invalid_elem, missing_attr, missing_elem, unsupported_attr, unsupported_elem};

pub struct RegressionModelTranslator<'a> {
    model: &'a RegressionModel,
}

impl<'a> RegressionModelTranslator<'a> {
    pub fn new(model: &'a RegressionModel) -> Result<Self> {
        match model.math_context {
            MathContext::Float | MathContext::Double => {}
            other => return unsupported_attr!("RegressionModel", other),
        }
        if model.tables.is_empty() {
            return missing_elem!("RegressionModel", "RegressionTable");
        }
        for table in &model.tables {
            if !table.predictor_terms.is_empty() {
                return unsupported_elem!("PredictorTerm");
            }
        }

        match model.mining_function {
            MiningFunction::Regression => {
                if model.tables.len() != 1 {
                    return invalid_elem!(
                        "RegressionModel",
                        format!("{} tables for a regression function", model.tables.len())
                    );
                }
                match model.normalization_method {
                    NormalizationMethod::None
                    | NormalizationMethod::SoftMax
                    | NormalizationMethod::Logit
                    | NormalizationMethod::Exp => {}
                    other => return unsupported_attr!("RegressionModel", other),
                }
            }
            MiningFunction::Classification => {
                if model.tables.len() < 2 {
                    return invalid_elem!(
                        "RegressionModel",
                        "classification requires at least two tables"
                    );
                }
                for table in &model.tables {
                    if table.target_category.is_none() {
                        return missing_attr!("RegressionTable", "targetCategory");
                    }
                }
                let allowed = if model.tables.len() == 2 {
                    matches!(
                        model.normalization_method,
                        NormalizationMethod::None
                            | NormalizationMethod::SoftMax
                            | NormalizationMethod::Logit
                    )
                } else {
                    matches!(
                        model.normalization_method,
                        NormalizationMethod::None
                            | NormalizationMethod::SoftMax
                            | NormalizationMethod::SimpleMax
                    )
                };
                if !allowed {
                    return unsupported_attr!("RegressionModel", model.normalization_method);
                }
            }
            other => return unsupported_attr!("RegressionModel", other),
        }

        Ok(RegressionModelTranslator { model })
    }

    pub fn model(&self) -> &RegressionModel {
        self.model
    }

    /// Entry procedure of a regression-function model: one table, then the
    /// scalar normalization.
    pub fn translate_regressor(
        &self,
        ctx: &mut TranslationContext,
        path: &str,
    ) -> Result<ProcId> {
        ctx.begin_procedure(&suffixed("eval_regression", path), Type::Value);
        let result = ctx.declare("result", Type::Value, Expr::NewValue(0.0));
        self.translate_table(ctx, &self.model.tables[0], result, path, 0)?;
        if self.model.normalization_method != NormalizationMethod::None {
            ctx.push(Stmt::Normalize {
                local: result,
                method: self.model.normalization_method,
            });
        }
        ctx.push(Stmt::Return(Expr::Local(result)));
        Ok(ctx.end_procedure())
    }

    /// Entry procedure of a classification-function model.
    pub fn translate_classifier(
        &self,
        ctx: &mut TranslationContext,
        path: &str,
    ) -> Result<ProcId> {
        ctx.begin_procedure(&suffixed("eval_regression", path), Type::Classification);

        // the binomial/multinomial combination always runs; declared
        // probability outputs only select how the result is wrapped
        let n_probability = self
            .model
            .output
            .as_ref()
            .map(|o| o.count_feature(ResultFeature::Probability))
            .unwrap_or(0);
        let probabilistic = n_probability == self.model.tables.len();

        let map = ctx.declare_value_map("values");
        let binomial = self.model.tables.len() == 2;

        // the binomial case evaluates only the first table; the second
        // category receives the complement
        let evaluated: &[RegressionTable] = if binomial {
            &self.model.tables[..1]
        } else {
            &self.model.tables[..]
        };
        for (i, table) in evaluated.iter().enumerate() {
            let value = ctx.declare(&format!("value_{i}"), Type::Value, Expr::NewValue(0.0));
            self.translate_table(ctx, table, value, path, i)?;
            let Some(category) = table.target_category.clone() else {
                return missing_attr!("RegressionTable", "targetCategory");
            };
            ctx.push(Stmt::ValueMapPut {
                local: map,
                category,
                value: Expr::Local(value),
            });
        }

        if binomial {
            ctx.push(Stmt::ComputeBinomialProbabilities {
                map,
                method: self.model.normalization_method,
            });
        } else {
            ctx.push(Stmt::ComputeMultinomialProbabilities {
                map,
                method: self.model.normalization_method,
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

    fn translate_table(
        &self,
        ctx: &mut TranslationContext,
        table: &RegressionTable,
        local: LocalId,
        path: &str,
        table_idx: usize,
    ) -> Result<()> {
        for p in &table.numeric_predictors {
            let arg = ctx.argument(&p.field)?;
            push_numeric_term(ctx, local, p.coefficient, Expr::Arg(arg), p.exponent);
        }

        // categorical predictors, grouped by field in first-seen order
        let mut seen: Vec<&str> = Vec::new();
        for p in &table.categorical_predictors {
            if seen.contains(&p.field.as_str()) {
                continue;
            }
            seen.push(&p.field);
            let group: Vec<&CategoricalPredictor> = table
                .categorical_predictors
                .iter()
                .filter(|q| q.field == p.field)
                .collect();
            let proc = self.lookup_procedure(ctx, &p.field, &group, path, table_idx)?;
            ctx.push(Stmt::ValueAdd {
                local,
                value: Expr::CallProc(proc),
            });
        }

        if table.intercept != 0.0 {
            ctx.push(Stmt::ValueAddConst {
                local,
                value: table.intercept,
            });
        }
        Ok(())
    }

    /// The per-field coefficient lookup procedure for one table's group of
    /// categorical predictors. Memoized by name, so a table translated
    /// twice reuses one body.
    fn lookup_procedure(
        &self,
        ctx: &mut TranslationContext,
        field: &str,
        group: &[&CategoricalPredictor],
        path: &str,
        table_idx: usize,
    ) -> Result<ProcId> {
        let arg = ctx.argument(field)?;
        let info = ctx.argument_info(arg);
        let name = suffixed(
            &format!("lookup_t{table_idx}_{}", sanitize(field)),
            path,
        );
        if let Some(proc) = ctx.procedure_named(&name) {
            return Ok(proc);
        }

        // coefficient keys are encoded when the argument is
        let entries: Vec<(Literal, f64)> = match &info.encoder {
            Some(Encoder::Ordinal(ordinal)) => group
                .iter()
                .map(|p| (Literal::Int(ordinal.encode(&p.value)), p.coefficient))
                .collect(),
            _ => group
                .iter()
                .map(|p| (p.value.clone(), p.coefficient))
                .collect(),
        };
        let table = ctx.add_table(Table {
            name: format!("coeffs_{name}"),
            data: TableData::Coefficients(entries),
        });

        ctx.begin_procedure(&name, Type::Value);
        ctx.push(Stmt::Return(Expr::NewValueFrom(Box::new(
            Expr::CoeffLookup {
                table,
                key: Box::new(Expr::Arg(arg)),
            },
        ))));
        Ok(ctx.end_procedure())
    }
}

/// `local += coefficient * operand^exponent`, folded to the cheapest form.
fn push_numeric_term(
    ctx: &mut TranslationContext,
    local: LocalId,
    coefficient: f64,
    operand: Expr,
    exponent: i32,
) {
    if exponent != 1 {
        ctx.push(Stmt::ValueAddTerm {
            local,
            coefficient,
            value: operand,
            exponent,
        });
    } else if coefficient != 1.0 {
        ctx.push(Stmt::ValueAddScaled {
            local,
            coefficient,
            value: operand,
        });
    } else {
        ctx.push(Stmt::ValueAdd {
            local,
            value: operand,
        });
    }
}

fn suffixed(base: &str, path: &str) -> String {
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}_{path}")
    }
}
