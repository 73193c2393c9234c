// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Field encoders: how raw input values become the representation the
//! generated procedure computes on.
//!
//! Continuous fields pass through as floating-point primitives, with NaN
//! standing in for a missing value. Categorical fields referenced by
//! discrete guards get an ordinal encoding: category values are numbered
//! from 1 in first-seen order, 0 means a value outside the known domain,
//! and -1 means missing.

use std::collections::HashMap;

use crate::datamodel::Literal;
use crate::procedure::NULL_RESULT;

/// Ordinal code for a value not in the encoder's domain.
pub const UNKNOWN_VALUE: i64 = 0;
/// Ordinal code for a missing value.
pub const MISSING_VALUE: i64 = NULL_RESULT;

#[derive(Clone, Debug, PartialEq)]
pub enum Encoder {
    /// Identity encoding of a continuous field; missing becomes NaN.
    FpPrimitive,
    Ordinal(OrdinalEncoder),
}

impl Encoder {
    /// Short name folded into the argument's variable name.
    pub fn name(&self) -> &'static str {
        match self {
            Encoder::FpPrimitive => "fp",
            Encoder::Ordinal(_) => "ordinal",
        }
    }
}

/// First-seen, 1-based mapping from category literals to ordinal codes.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct OrdinalEncoder {
    values: Vec<Literal>,
    index: HashMap<Literal, i64>,
}

impl OrdinalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value to the domain if absent and return its code.
    pub fn ensure(&mut self, value: &Literal) -> i64 {
        if let Some(&code) = self.index.get(value) {
            return code;
        }
        let code = self.values.len() as i64 + 1;
        self.values.push(value.clone());
        self.index.insert(value.clone(), code);
        code
    }

    /// The code of a known value, `UNKNOWN_VALUE` otherwise.
    pub fn encode(&self, value: &Literal) -> i64 {
        self.index.get(value).copied().unwrap_or(UNKNOWN_VALUE)
    }

    /// Domain values in code order (code = position + 1).
    pub fn values(&self) -> &[Literal] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Packed membership bits over the given subset of the domain, sized to
    /// cover every assigned code. Code 0 (unknown) is never a member, so
    /// bit 0 stays clear.
    pub fn bit_set(&self, members: &[Literal]) -> Vec<u64> {
        let n_bits = self.values.len() + 1;
        let mut words = vec![0u64; n_bits.div_ceil(64)];
        for member in members {
            let code = self.encode(member);
            if code > UNKNOWN_VALUE {
                words[code as usize / 64] |= 1u64 << (code as usize % 64);
            }
        }
        words
    }
}
