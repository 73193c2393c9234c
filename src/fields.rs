// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Field usage analysis.
//!
//! Before translation we walk the model once and build a `FieldInfo` per
//! referenced input field: its declaration, whether it is worth decoding
//! unconditionally at entry (primary), and the encoder implied by how the
//! model tests it. Categorical fields compared against discrete values get
//! an ordinal encoder whose domain is numbered in first-seen order, so the
//! whole analysis is a pure function of the model tree.

use std::collections::{BTreeMap, HashSet};

use crate::common::{Result, sanitize};
use crate::datamodel::{
    DataType, Document, Field, Model, MultipleModelMethod, Node, OpType, Predicate, RegressionModel,
    SimpleOp, TreeModel,
};
use crate::encoders::{Encoder, OrdinalEncoder};
use crate::missing_elem;

#[derive(Clone, Debug, PartialEq)]
pub struct FieldInfo {
    pub field: Field,
    /// Referenced by more than one guard or term.
    pub primary: bool,
    pub encoder: Option<Encoder>,
}

impl FieldInfo {
    /// Stable generated variable name: the sanitized field name, suffixed
    /// with the encoder name when the field is encoded.
    pub fn variable_name(&self) -> String {
        let base = sanitize(&self.field.name);
        match &self.encoder {
            Some(encoder) => format!("{base}2{}", encoder.name()),
            None => base,
        }
    }
}

/// Keyed by field name; the map's order fixes the argument order of the
/// compiled unit.
pub type FieldInfos = BTreeMap<String, FieldInfo>;

/// Walk `model` and build the `FieldInfo` table against `doc`'s data
/// dictionary.
pub fn collect_field_infos(doc: &Document, model: &Model) -> Result<FieldInfos> {
    let mut collector = Collector::new(doc);
    collector.walk_model(model)?;
    Ok(collector.finish())
}

struct Collected {
    field: Field,
    refs: usize,
    ordinal: Option<OrdinalEncoder>,
}

struct Collector<'a> {
    doc: &'a Document,
    infos: BTreeMap<String, Collected>,
    /// Names bound to intermediate results inside a model chain; these are
    /// not input fields and get no argument slot.
    bound: HashSet<String>,
}

impl<'a> Collector<'a> {
    fn new(doc: &'a Document) -> Self {
        Collector {
            doc,
            infos: BTreeMap::new(),
            bound: HashSet::new(),
        }
    }

    fn finish(self) -> FieldInfos {
        self.infos
            .into_iter()
            .map(|(name, c)| {
                let encoder = match c.ordinal {
                    Some(ordinal) => Some(Encoder::Ordinal(ordinal)),
                    None => match (c.field.op_type, c.field.data_type) {
                        (OpType::Continuous, DataType::Float | DataType::Double) => {
                            Some(Encoder::FpPrimitive)
                        }
                        _ => None,
                    },
                };
                let info = FieldInfo {
                    field: c.field,
                    primary: c.refs > 1,
                    encoder,
                };
                (name, info)
            })
            .collect()
    }

    fn reference(&mut self, name: &str) -> Result<Option<&mut Collected>> {
        if self.bound.contains(name) {
            return Ok(None);
        }
        if !self.infos.contains_key(name) {
            let field = match self.doc.field(name) {
                Some(field) => field.clone(),
                None => return missing_elem!("DataDictionary", name),
            };
            self.infos.insert(
                name.to_string(),
                Collected {
                    field,
                    refs: 0,
                    ordinal: None,
                },
            );
        }
        let c = self.infos.get_mut(name).unwrap();
        c.refs += 1;
        Ok(Some(c))
    }

    fn discrete_values(
        &mut self,
        name: &str,
        values: &[crate::datamodel::Literal],
    ) -> Result<()> {
        let Some(c) = self.reference(name)? else {
            return Ok(());
        };
        if c.field.op_type == OpType::Categorical {
            let ordinal = c.ordinal.get_or_insert_with(OrdinalEncoder::new);
            for value in values {
                ordinal.ensure(value);
            }
        }
        Ok(())
    }

    fn walk_model(&mut self, model: &Model) -> Result<()> {
        match model {
            Model::Tree(m) => self.walk_tree(m),
            Model::Regression(m) => self.walk_regression(m),
            Model::Mining(m) => {
                if m.segmentation.method == MultipleModelMethod::ModelChain {
                    for segment in &m.segmentation.segments {
                        if let Some(output) = segment.model.output() {
                            for of in &output.fields {
                                self.bound.insert(of.name.clone());
                            }
                        }
                    }
                }
                for segment in &m.segmentation.segments {
                    self.walk_predicate(&segment.predicate)?;
                    self.walk_model(&segment.model)?;
                }
                Ok(())
            }
        }
    }

    fn walk_tree(&mut self, model: &TreeModel) -> Result<()> {
        self.walk_node(&model.root)
    }

    fn walk_node(&mut self, node: &Node) -> Result<()> {
        self.walk_predicate(&node.predicate)?;
        for child in &node.children {
            self.walk_node(child)?;
        }
        Ok(())
    }

    fn walk_predicate(&mut self, predicate: &Predicate) -> Result<()> {
        match predicate {
            Predicate::True | Predicate::False => Ok(()),
            Predicate::Simple { field, op, value } => match op {
                SimpleOp::Equal | SimpleOp::NotEqual => {
                    self.discrete_values(field, std::slice::from_ref(value))
                }
                _ => self.reference(field).map(|_| ()),
            },
            Predicate::SimpleSet { field, values, .. } => self.discrete_values(field, values),
            // rejected later by the translator; its fields still resolve
            Predicate::Compound { predicates, .. } => {
                for p in predicates {
                    self.walk_predicate(p)?;
                }
                Ok(())
            }
        }
    }

    fn walk_regression(&mut self, model: &RegressionModel) -> Result<()> {
        for table in &model.tables {
            for p in &table.numeric_predictors {
                self.reference(&p.field)?;
            }
            for p in &table.categorical_predictors {
                self.discrete_values(&p.field, std::slice::from_ref(&p.value))?;
            }
            for term in &table.predictor_terms {
                for field in &term.fields {
                    self.reference(field)?;
                }
            }
        }
        Ok(())
    }
}
