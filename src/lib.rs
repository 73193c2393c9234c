// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! scorec compiles declarative predictive models (decision trees,
//! regression tables, and segment ensembles) into abstract scoring
//! procedures a code emitter can render for its target.
//!
//! The input is a [`datamodel::Document`]: a data dictionary plus one
//! model. [`compile`] validates the model against the supported subset and
//! hands back a [`CompiledModel`]: argument slots with their encoders,
//! interned score and membership tables, and the procedures themselves.
//! Compilation is deterministic; identical documents compile to identical
//! units, generated names included.

#![forbid(unsafe_code)]

pub mod arrays;
pub mod common;
pub mod context;
pub mod datamodel;
pub mod encoders;
pub mod fields;
pub mod mining;
pub mod procedure;
pub mod regression;
pub mod translator;
pub mod tree;

#[cfg(test)]
mod testutils;

pub use common::{Error, ErrorCode, Result};
pub use procedure::CompiledModel;
pub use translator::compile;
