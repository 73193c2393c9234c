// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The typed model object graph handed to us by the model loader.
//!
//! Everything here is immutable, already structurally validated input; the
//! compiler only re-checks the *semantic* combinations it supports (mining
//! function, strategies, combination methods and the like).

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A constant value appearing in a guard, a score, or an encoder domain.
///
/// Floats are wrapped in `OrderedFloat` so literals can key interning maps.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    Float(OrderedFloat<f64>),
    Int(i64),
    Str(String),
    Bool(bool),
}

impl Literal {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Float(f) => Some(f.into_inner()),
            Literal::Int(i) => Some(*i as f64),
            Literal::Str(_) => None,
            Literal::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        }
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Literal::Float(OrderedFloat(f))
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Int(i)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Float,
    Double,
    Integer,
    String,
    Boolean,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    Continuous,
    Categorical,
}

/// An input variable declared by the model's data dictionary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub op_type: OpType,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MiningFunction {
    Regression,
    Classification,
    Clustering,
    AssociationRules,
}

/// Numeric precision mode for the generated procedure's arithmetic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathContext {
    Float,
    Double,
    Decimal,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingValueStrategy {
    None,
    NullPrediction,
    LastPrediction,
    DefaultChild,
    WeightedConfidence,
    AggregateNodes,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoTrueChildStrategy {
    ReturnLastPrediction,
    ReturnNullPrediction,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizationMethod {
    None,
    SoftMax,
    SimpleMax,
    Logit,
    Exp,
    Probit,
    CloglogLog,
    Cauchit,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultipleModelMethod {
    Sum,
    WeightedSum,
    Average,
    WeightedAverage,
    Median,
    WeightedMedian,
    MajorityVote,
    WeightedMajorityVote,
    SelectFirst,
    SelectAll,
    ModelChain,
}

/// What to do when a segment's sub-model produces no result.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingPredictionTreatment {
    ReturnMissing,
    Continue,
    FloatMissing,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimpleOp {
    IsMissing,
    IsNotMissing,
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterOrEqual,
    GreaterThan,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOp {
    IsIn,
    IsNotIn,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanOperator {
    And,
    Or,
    Xor,
    Surrogate,
}

/// A node or segment guard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    True,
    False,
    Simple {
        field: String,
        op: SimpleOp,
        value: Literal,
    },
    SimpleSet {
        field: String,
        op: SetOp,
        values: Vec<Literal>,
    },
    /// Recognized so validation can reject it by name; never compiled.
    Compound {
        op: BooleanOperator,
        predicates: Vec<Predicate>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultFeature {
    PredictedValue,
    Probability,
    Confidence,
    EntityId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputField {
    pub name: String,
    pub feature: ResultFeature,
    /// For `Probability`, the category the probability belongs to.
    pub value: Option<Literal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub fields: Vec<OutputField>,
}

impl Output {
    /// Count of output fields carrying the given result feature.
    pub fn count_feature(&self, feature: ResultFeature) -> usize {
        self.fields.iter().filter(|f| f.feature == feature).count()
    }
}

// ===== decision trees =====

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub predicate: Predicate,
    pub score: Option<Literal>,
    /// Per-target-category record counts; classification trees only.
    pub distribution: Vec<f64>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeModel {
    pub mining_function: MiningFunction,
    pub math_context: MathContext,
    pub missing_value_strategy: MissingValueStrategy,
    pub no_true_child_strategy: NoTrueChildStrategy,
    pub root: Node,
    /// Classification target categories, in score-distribution order.
    pub target_categories: Vec<Literal>,
    pub output: Option<Output>,
}

// ===== regression tables =====

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumericPredictor {
    pub field: String,
    pub coefficient: f64,
    pub exponent: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoricalPredictor {
    pub field: String,
    pub value: Literal,
    pub coefficient: f64,
}

/// An interaction term. Recognized so validation can reject it; never
/// compiled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictorTerm {
    pub fields: Vec<String>,
    pub coefficient: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionTable {
    /// The category this table scores; classification models only.
    pub target_category: Option<Literal>,
    pub intercept: f64,
    pub numeric_predictors: Vec<NumericPredictor>,
    pub categorical_predictors: Vec<CategoricalPredictor>,
    pub predictor_terms: Vec<PredictorTerm>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    pub mining_function: MiningFunction,
    pub math_context: MathContext,
    pub normalization_method: NormalizationMethod,
    pub tables: Vec<RegressionTable>,
    pub output: Option<Output>,
}

impl RegressionModel {
    pub fn target_categories(&self) -> Vec<Literal> {
        self.tables
            .iter()
            .filter_map(|t| t.target_category.clone())
            .collect()
    }
}

// ===== ensembles =====

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: Option<String>,
    pub predicate: Predicate,
    pub weight: f64,
    pub model: Model,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    pub method: MultipleModelMethod,
    pub missing_prediction_treatment: MissingPredictionTreatment,
    pub segments: Vec<Segment>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MiningModel {
    pub mining_function: MiningFunction,
    pub math_context: MathContext,
    pub segmentation: Segmentation,
    /// Classification target categories of the ensemble as a whole.
    pub target_categories: Vec<Literal>,
    pub output: Option<Output>,
}

// ===== the closed model universe =====

/// Every model kind the compiler knows about. Dispatch is by variant; an
/// unknown kind is unrepresentable by construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Model {
    Tree(TreeModel),
    Regression(RegressionModel),
    Mining(MiningModel),
}

impl Model {
    pub fn mining_function(&self) -> MiningFunction {
        match self {
            Model::Tree(m) => m.mining_function,
            Model::Regression(m) => m.mining_function,
            Model::Mining(m) => m.mining_function,
        }
    }

    pub fn math_context(&self) -> MathContext {
        match self {
            Model::Tree(m) => m.math_context,
            Model::Regression(m) => m.math_context,
            Model::Mining(m) => m.math_context,
        }
    }

    pub fn output(&self) -> Option<&Output> {
        match self {
            Model::Tree(m) => m.output.as_ref(),
            Model::Regression(m) => m.output.as_ref(),
            Model::Mining(m) => m.output.as_ref(),
        }
    }

    pub fn target_categories(&self) -> Vec<Literal> {
        match self {
            Model::Tree(m) => m.target_categories.clone(),
            Model::Regression(m) => m.target_categories(),
            Model::Mining(m) => m.target_categories.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Model::Tree(_) => "TreeModel",
            Model::Regression(_) => "RegressionModel",
            Model::Mining(_) => "MiningModel",
        }
    }
}

/// The complete compilation input: a data dictionary plus one top-level
/// model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub fields: Vec<Field>,
    pub model: Model,
}

impl Document {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
