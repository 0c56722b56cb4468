//! Record predicates for batch reads and deletes
//!
//! A filter is a conjunction of equals / not-equals comparisons. They are
//! emitted as `IS` / `IS NOT`, so `Null` compares like any other value.

use crate::ddl::quote_ident;
use crate::errors::Result;
use crate::repo::hydration::to_sql;
use burrow_core::errors::BurrowError;
use burrow_core::{EntityDef, Value};
use rusqlite::types::Value as SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub comparison: Comparison,
    pub value: Value,
}

/// Conjunction of field comparisons; the empty filter matches every record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field.into(), Comparison::Eq, value.into())
    }

    /// Require `field` to differ from `value`
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field.into(), Comparison::Ne, value.into())
    }

    fn with(mut self, field: String, comparison: Comparison, value: Value) -> Self {
        self.clauses.push(Clause {
            field,
            comparison,
            value,
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `WHERE` body and parameters for `entity`
    ///
    /// # Errors
    /// `FieldNotFound` or `TypeMismatch` when a clause does not fit the entity.
    pub fn to_sql(&self, entity: &EntityDef) -> Result<(String, Vec<SqlValue>)> {
        if self.clauses.is_empty() {
            return Ok(("1".to_string(), Vec::new()));
        }

        let mut terms = Vec::with_capacity(self.clauses.len());
        let mut params = Vec::with_capacity(self.clauses.len());
        for (index, clause) in self.clauses.iter().enumerate() {
            let field = entity
                .field(&clause.field)
                .ok_or_else(|| BurrowError::FieldNotFound {
                    entity: entity.name().to_string(),
                    field: clause.field.clone(),
                })?;
            let value = clause
                .value
                .clone()
                .coerce(field.field_type())
                .ok_or_else(|| BurrowError::TypeMismatch {
                    entity: entity.name().to_string(),
                    field: clause.field.clone(),
                    expected: field.field_type().to_string(),
                    found: clause.value.type_name().to_string(),
                })?;

            let op = match clause.comparison {
                Comparison::Eq => "IS",
                Comparison::Ne => "IS NOT",
            };
            terms.push(format!("{} {} ?{}", quote_ident(field.name()), op, index + 1));
            params.push(to_sql(&value));
        }
        Ok((terms.join(" AND "), params))
    }
}
