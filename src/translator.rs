// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Top-level dispatch and the public `compile` entry point.
//!
//! Construction selects a translator for the model variant and runs the
//! whole validation front-to-back; translation then cannot fail on a
//! combination the validators accepted, only on structural defects found
//! deeper in the tree. Dispatch is a closed enum over the model universe.

use crate::common::{Result, sanitize};
use crate::context::TranslationContext;
use crate::datamodel::{Document, MiningFunction, Model, MultipleModelMethod};
use crate::fields::collect_field_infos;
use crate::mining::{AggregatorTranslator, ChainTranslator};
use crate::procedure::{CompiledModel, ProcId};
use crate::regression::RegressionModelTranslator;
use crate::tree::TreeModelTranslator;
use crate::unsupported_attr;

pub enum ModelTranslator<'a> {
    Tree(TreeModelTranslator<'a>),
    Regression(RegressionModelTranslator<'a>),
    Aggregator(AggregatorTranslator<'a>),
    Chain(ChainTranslator<'a>),
}

impl<'a> ModelTranslator<'a> {
    pub fn new(model: &'a Model) -> Result<Self> {
        match model {
            Model::Tree(m) => Ok(ModelTranslator::Tree(TreeModelTranslator::new(m)?)),
            Model::Regression(m) => Ok(ModelTranslator::Regression(
                RegressionModelTranslator::new(m)?,
            )),
            Model::Mining(m) => match m.segmentation.method {
                MultipleModelMethod::ModelChain => {
                    Ok(ModelTranslator::Chain(ChainTranslator::new(m)?))
                }
                _ => Ok(ModelTranslator::Aggregator(AggregatorTranslator::new(m)?)),
            },
        }
    }

    pub fn translate(&self, ctx: &mut TranslationContext) -> Result<ProcId> {
        match self {
            ModelTranslator::Tree(t) => match t.model().mining_function {
                MiningFunction::Regression => t.translate_regressor(ctx, ""),
                MiningFunction::Classification => t.translate_classifier(ctx, ""),
                other => unsupported_attr!("TreeModel", other),
            },
            ModelTranslator::Regression(t) => match t.model().mining_function {
                MiningFunction::Regression => t.translate_regressor(ctx, ""),
                MiningFunction::Classification => t.translate_classifier(ctx, ""),
                other => unsupported_attr!("RegressionModel", other),
            },
            ModelTranslator::Aggregator(t) => t.translate(ctx),
            ModelTranslator::Chain(t) => t.translate(ctx),
        }
    }
}

/// Compile a model document into an abstract scoring procedure.
pub fn compile(doc: &Document) -> Result<CompiledModel> {
    let field_infos = collect_field_infos(doc, &doc.model)?;
    let translator = ModelTranslator::new(&doc.model)?;
    let mut ctx = TranslationContext::new(
        sanitize(&doc.name),
        doc.model.math_context(),
        doc.model.target_categories(),
        &field_infos,
    );
    let entry = translator.translate(&mut ctx)?;
    Ok(ctx.finish(entry))
}
