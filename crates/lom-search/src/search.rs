//! Write-once search records and their evaluation.
//!
//! Creating a [`Search`] only validates the model and the criteria tree.
//! Matches are never stored: [`Search::run`] evaluates against whatever state
//! the caller passes in, so each fetch sees the state current at fetch time.

use chrono::{DateTime, Utc};
use lom_orders::Order;
use lom_registry::{Registry, Resource};
use serde_json::Value;

use crate::criteria::{self, Criteria};
use crate::model::Model;
use crate::page::{paginate, PageInfo};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The model name is not a searchable entity kind.
    UnsupportedModel { model: String },
    /// The criteria tree is malformed. `path` is a JSON pointer into it.
    InvalidCriteria { path: String, reason: String },
}

impl std::fmt::Display for SearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedModel { model } => write!(f, "unsupported search model '{model}'"),
            Self::InvalidCriteria { path, reason } => {
                let at = if path.is_empty() { "/" } else { path };
                write!(f, "invalid criteria at {at}: {reason}")
            }
        }
    }
}

impl std::error::Error for SearchError {}

// ---------------------------------------------------------------------------
// Hits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hit<'a> {
    Resource(&'a Resource),
    Order(&'a Order),
}

impl<'a> Hit<'a> {
    pub fn uuid(&self) -> &'a str {
        match self {
            Hit::Resource(r) => &r.uuid,
            Hit::Order(o) => o.uuid(),
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            Hit::Resource(r) => r.seq,
            Hit::Order(o) => o.seq(),
        }
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    uuid: String,
    model: Model,
    description: String,
    /// The tree exactly as submitted, for echoing back.
    raw_criteria: Value,
    criteria: Criteria,
    seq: u64,
    created_at: DateTime<Utc>,
}

impl Search {
    /// Validate `model` and `criteria`; does not evaluate anything.
    pub fn create(
        uuid: impl Into<String>,
        seq: u64,
        created_at: DateTime<Utc>,
        model: &str,
        description: impl Into<String>,
        raw_criteria: Value,
    ) -> Result<Self, SearchError> {
        let model = Model::parse(model).ok_or_else(|| SearchError::UnsupportedModel {
            model: model.to_string(),
        })?;
        let criteria = criteria::parse(model, &raw_criteria)?;
        Ok(Self {
            uuid: uuid.into(),
            model,
            description: description.into(),
            raw_criteria,
            criteria,
            seq,
            created_at,
        })
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }
    pub fn model(&self) -> Model {
        self.model
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn raw_criteria(&self) -> &Value {
        &self.raw_criteria
    }
    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }
    pub fn seq(&self) -> u64 {
        self.seq
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Every match, ordered by creation sequence.
    pub fn run<'a>(&self, registry: &'a Registry, orders: &'a [Order]) -> Vec<Hit<'a>> {
        let mut hits: Vec<Hit<'a>> = match &self.criteria {
            Criteria::Resource { kind, criteria } => registry
                .of_kind(*kind)
                .filter(|r| criteria.matches(r, orders))
                .map(Hit::Resource)
                .collect(),
            Criteria::Order(criteria) => orders
                .iter()
                .filter(|o| criteria.matches(o, |uuid| registry.get(uuid)))
                .map(Hit::Order)
                .collect(),
        };
        hits.sort_by_key(|h| h.seq());
        hits
    }

    /// One page of [`Search::run`].
    pub fn page<'a>(
        &self,
        registry: &'a Registry,
        orders: &'a [Order],
        page_size: usize,
        number: usize,
    ) -> (Vec<Hit<'a>>, PageInfo) {
        paginate(self.run(registry, orders), page_size, number)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
