//! Predicate tree compilation
//!
//! Walks a predicate tree once and produces the backend's native boolean
//! query. A subtree the backend cannot express becomes match-all and is
//! recorded as an [`Unsupported`] note; compilation always continues with
//! its siblings. A non-empty note list means the result must be
//! post-filtered with the full predicate.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use super::ast::{operands, ComparisonOp, Expr, Literal, Predicate};
use super::errors::{FilterResult, Unsupported};
use super::like;
use super::native::NativeOverride;
use super::query;
use super::schema::{AttributeSchema, FeatureSchema};
use super::temporal::{format_date, temporal_clause};
use crate::geo;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

/// Output of one compilation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledFilter {
    /// Final query: the compiled predicate ANDed with the native query
    pub query: Value,
    /// False when any subtree degraded and a post-filter is required
    pub fully_supported: bool,
    /// Native aggregations, if supplied
    pub aggregations: Option<Map<String, Value>>,
    /// The native query alone, match-all when absent
    #[serde(skip)]
    pub native_query: Value,
    /// Subtrees that degraded to match-all
    pub unsupported: Vec<Unsupported>,
}

/// State of one compilation pass
#[derive(Debug, Default)]
struct CompileContext {
    unsupported: Vec<Unsupported>,
}

impl CompileContext {
    fn degrade(&mut self, note: Unsupported) -> Value {
        log_event_with_fields(
            Event::PredicateUnsupported,
            &[("kind", note.kind.as_str()), ("reason", note.reason.as_str())],
        );
        self.unsupported.push(note);
        query::match_all()
    }
}

/// Compiles predicate trees against one feature schema
pub struct FilterCompiler<'a> {
    schema: &'a FeatureSchema,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(schema: &'a FeatureSchema) -> Self {
        Self {
            schema,
            metrics: None,
        }
    }

    /// Count compilations in a shared registry
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Compile a predicate, merging the native override if given
    ///
    /// Fails only when the override text is malformed.
    pub fn compile(
        &self,
        predicate: &Predicate,
        native: Option<&NativeOverride>,
    ) -> FilterResult<CompiledFilter> {
        let parsed = native.cloned().unwrap_or_default().parse()?;

        let mut ctx = CompileContext::default();
        let filter = if parsed.native_only {
            log_event_with_fields(Event::NativeQueryOnly, &[("type", self.schema.type_name.as_str())]);
            query::match_all()
        } else {
            self.visit(predicate, &mut ctx)
        };

        let fully_supported = ctx.unsupported.is_empty();
        let compiled = CompiledFilter {
            query: query::and_queries(parsed.query.clone(), filter),
            fully_supported,
            aggregations: parsed.aggregations,
            native_query: parsed.query,
            unsupported: ctx.unsupported,
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_compilation(!fully_supported);
        }
        log_event_with_fields(
            Event::FilterCompiled,
            &[
                ("type", self.schema.type_name.as_str()),
                ("fully_supported", if fully_supported { "true" } else { "false" }),
                ("unsupported", compiled.unsupported.len().to_string().as_str()),
            ],
        );
        Ok(compiled)
    }

    fn visit(&self, predicate: &Predicate, ctx: &mut CompileContext) -> Value {
        match predicate {
            Predicate::Include => query::match_all(),
            Predicate::Exclude => query::match_none(),
            Predicate::And { children } => {
                query::must(children.iter().map(|c| self.visit(c, ctx)).collect())
            }
            Predicate::Or { children } => {
                query::should(children.iter().map(|c| self.visit(c, ctx)).collect())
            }
            Predicate::Not { child } => self.visit_not(child, ctx),
            Predicate::Compare {
                operator,
                left,
                right,
            } => self.visit_compare(*operator, left, right, ctx),
            Predicate::Between { expr, lower, upper } => {
                self.visit_between(expr, lower, upper, ctx)
            }
            Predicate::Like {
                expr,
                pattern,
                syntax,
            } => match expr.as_property() {
                Some(name) => {
                    let attribute = self.schema.resolve(name);
                    let field = attribute.field();
                    let clause = if attribute.analyzed {
                        serde_json::json!({"query_string": {
                            "query": like::to_query_string(pattern, syntax),
                            "default_field": field,
                        }})
                    } else {
                        query::field_clause(
                            "regexp",
                            field,
                            Value::String(like::to_regexp(pattern, syntax)),
                        )
                    };
                    query::maybe_nested(attribute.nested_path(), clause)
                }
                None => ctx.degrade(Unsupported::new("like", "operand is not an attribute")),
            },
            Predicate::IsNull { expr } => match expr.as_property() {
                Some(name) => {
                    let attribute = self.schema.resolve(name);
                    query::must_not(query::maybe_nested(
                        attribute.nested_path(),
                        query::exists(attribute.field()),
                    ))
                }
                None => ctx.degrade(Unsupported::new("is_null", "operand is not an attribute")),
            },
            Predicate::Ids { ids } => query::ids(self.normalize_ids(ids)),
            Predicate::Spatial {
                operator,
                left,
                right,
            } => {
                let Some(ops) = operands(left, right) else {
                    return ctx.degrade(Unsupported::new(
                        operator.as_str(),
                        "needs one attribute and one literal",
                    ));
                };
                let Literal::Geometry(geometry) = ops.literal else {
                    return ctx.degrade(Unsupported::new(
                        operator.as_str(),
                        "literal is not a geometry",
                    ));
                };
                let attribute = self.schema.resolve(ops.property);
                geo::compile_spatial(*operator, &attribute, geometry.geometry(), ops.swapped)
                    .unwrap_or_else(|note| ctx.degrade(note))
            }
            Predicate::Distance {
                operator,
                left,
                right,
                distance,
                units,
            } => {
                let Some(ops) = operands(left, right) else {
                    return ctx.degrade(Unsupported::new(
                        operator.as_str(),
                        "needs one attribute and one literal",
                    ));
                };
                let Literal::Geometry(geometry) = ops.literal else {
                    return ctx.degrade(Unsupported::new(
                        operator.as_str(),
                        "literal is not a geometry",
                    ));
                };
                let attribute = self.schema.resolve(ops.property);
                geo::compile_distance(
                    *operator,
                    &attribute,
                    geometry.geometry(),
                    *distance,
                    units,
                    ops.swapped,
                )
                .unwrap_or_else(|note| ctx.degrade(note))
            }
            Predicate::Temporal {
                operator,
                left,
                right,
            } => {
                let Some(ops) = operands(left, right) else {
                    return ctx.degrade(Unsupported::new(
                        operator.as_str(),
                        "needs one attribute and one literal",
                    ));
                };
                let attribute = self.schema.resolve(ops.property);
                match temporal_clause(*operator, &attribute, ops.literal, ops.swapped) {
                    Ok(clause) => query::maybe_nested(attribute.nested_path(), clause),
                    Err(note) => ctx.degrade(note),
                }
            }
        }
    }

    fn visit_not(&self, child: &Predicate, ctx: &mut CompileContext) -> Value {
        // NOT(is-null) is an existence check, not a double negation
        if let Predicate::IsNull {
            expr: Expr::Property(name),
        } = child
        {
            let attribute = self.schema.resolve(name);
            return query::maybe_nested(attribute.nested_path(), query::exists(attribute.field()));
        }
        let degraded = ctx.unsupported.len();
        let negated = self.visit(child, ctx);
        // A degraded child narrows nothing, so its negation must not either
        if ctx.unsupported.len() > degraded {
            return query::match_all();
        }
        query::must_not(negated)
    }

    fn visit_compare(
        &self,
        operator: ComparisonOp,
        left: &Expr,
        right: &Expr,
        ctx: &mut CompileContext,
    ) -> Value {
        let Some(ops) = operands(left, right) else {
            return ctx.degrade(Unsupported::new(
                operator.as_str(),
                "needs one attribute and one literal",
            ));
        };
        let attribute = self.schema.resolve(ops.property);
        let Some(value) = literal_value(&attribute, ops.literal) else {
            return ctx.degrade(Unsupported::new(
                operator.as_str(),
                "literal is not a scalar or instant",
            ));
        };
        let operator = if ops.swapped {
            operator.mirror()
        } else {
            operator
        };

        let field = attribute.field();
        let clause = match operator.range_key() {
            Some(key) => query::range(field, &[(key, value)]),
            None if operator == ComparisonOp::NotEq => query::must_not(query::term(field, value)),
            None => query::term(field, value),
        };
        query::maybe_nested(attribute.nested_path(), clause)
    }

    fn visit_between(
        &self,
        expr: &Expr,
        lower: &Expr,
        upper: &Expr,
        ctx: &mut CompileContext,
    ) -> Value {
        let (Some(name), Some(lower), Some(upper)) =
            (expr.as_property(), lower.as_literal(), upper.as_literal())
        else {
            return ctx.degrade(Unsupported::new(
                "between",
                "needs an attribute and two literal bounds",
            ));
        };
        let attribute = self.schema.resolve(name);
        let (Some(lower), Some(upper)) = (
            literal_value(&attribute, lower),
            literal_value(&attribute, upper),
        ) else {
            return ctx.degrade(Unsupported::new("between", "bounds are not scalars"));
        };
        let clause = query::range(attribute.field(), &[("gte", lower), ("lte", upper)]);
        query::maybe_nested(attribute.nested_path(), clause)
    }

    /// Strip `<typeName>.` prefixes, then sort and de-duplicate
    fn normalize_ids(&self, ids: &[String]) -> Vec<String> {
        let prefix = format!("{}.", self.schema.type_name);
        let set: BTreeSet<String> = ids
            .iter()
            .map(|id| {
                if self.schema.type_name.is_empty() {
                    id.clone()
                } else {
                    id.strip_prefix(&prefix).unwrap_or(id).to_string()
                }
            })
            .collect();
        set.into_iter().collect()
    }
}

/// Scalar value of a literal as sent to the backend
fn literal_value(attribute: &AttributeSchema, literal: &Literal) -> Option<Value> {
    match literal {
        Literal::Value(value) if !value.is_array() && !value.is_object() && !value.is_null() => {
            Some(value.clone())
        }
        Literal::Date(instant) => Some(format_date(attribute, instant)),
        _ => None,
    }
}

/// Compile with a one-off compiler
pub fn compile(
    predicate: &Predicate,
    schema: &FeatureSchema,
    native: Option<&NativeOverride>,
) -> FilterResult<CompiledFilter> {
    FilterCompiler::new(schema).compile(predicate, native)
}
