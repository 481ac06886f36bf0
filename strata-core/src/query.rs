//! Query-builder glue over a context's view.
//!
//! Thin convenience layer: predicate, sort, limit, offset against the
//! snapshot a context exposes. Execution always happens on the lane owning
//! the target context; results are owned entities that must go through the
//! identity bridge before crossing lanes.

use crate::context::Context;
use crate::StackResult;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use strata_model::Entity;

type Predicate = Arc<dyn Fn(&Entity) -> bool + Send + Sync>;

/// A fetch description for one entity type.
#[derive(Clone)]
pub struct Query {
    entity_type: String,
    predicate: Option<Predicate>,
    sort: Vec<(String, bool)>,
    limit: Option<usize>,
    offset: usize,
}

impl Query {
    /// Starts a query over one entity type.
    #[must_use]
    pub fn of(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            predicate: None,
            sort: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Convenience: match entities whose attribute at `key` equals `value`.
    #[must_use]
    pub fn matching(entity_type: impl Into<String>, key: &str, value: Value) -> Self {
        let key = key.to_string();
        Self::of(entity_type).filter(move |e| e.data.pointer(&key) == Some(&value))
    }

    /// Restricts results to entities the predicate accepts.
    #[must_use]
    pub fn filter(mut self, predicate: impl Fn(&Entity) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Adds a sort key (JSON pointer); earlier keys take precedence.
    #[must_use]
    pub fn sort(mut self, key: impl Into<String>, ascending: bool) -> Self {
        self.sort.push((key.into(), ascending));
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` results.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Executes against `context`'s view, on `context`'s lane.
    ///
    /// The handle itself carries no context; it is only meaningful run
    /// against one, and results must go through the identity bridge before
    /// crossing lanes.
    pub fn run(&self, context: &Arc<Context>) -> StackResult<Vec<Entity>> {
        let query = self.clone();
        let ctx = Arc::clone(context);
        context.lane().run_sync(move || query.run_on_lane(&ctx))?
    }

    fn run_on_lane(&self, context: &Arc<Context>) -> StackResult<Vec<Entity>> {
        let mut results = context.snapshot_of_type(&self.entity_type)?;

        if let Some(predicate) = &self.predicate {
            results.retain(|entity| predicate(entity));
        }

        if self.sort.is_empty() {
            // Stable default: creation order via the time-ordered id.
            results.sort_by(|a, b| a.id.cmp(&b.id));
        } else {
            results.sort_by(|a, b| {
                for (key, ascending) in &self.sort {
                    let ordering = value_cmp(a.data.pointer(key), b.data.pointer(key));
                    let ordering = if *ascending {
                        ordering
                    } else {
                        ordering.reverse()
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.id.cmp(&b.id)
            });
        }

        let results: Vec<Entity> = results
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(results)
    }
}

/// Orders JSON values for sort keys. Missing values sort last; mixed types
/// order by a fixed type rank.
fn value_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => type_rank(a).cmp(&type_rank(b)),
        },
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
