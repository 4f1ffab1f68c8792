//! Temporal relations over instant attributes
//!
//! Attributes hold instants. The compared literal is classified as an
//! instant or a period, and each relation becomes a term or range clause on
//! the attribute's field.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::ast::{Literal, Period, TemporalOp};
use super::errors::Unsupported;
use super::query;
use super::schema::AttributeSchema;

/// A temporal literal after classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalValue {
    Instant(DateTime<Utc>),
    Period(Period),
}

/// Classify a literal; RFC 3339 strings count as instants
pub fn classify(literal: &Literal) -> Option<TemporalValue> {
    match literal {
        Literal::Date(instant) => Some(TemporalValue::Instant(*instant)),
        Literal::Period(period) => Some(TemporalValue::Period(*period)),
        Literal::Value(Value::String(text)) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| TemporalValue::Instant(dt.with_timezone(&Utc))),
        _ => None,
    }
}

/// Render an instant in the attribute's date format
///
/// Without a format the instant is RFC 3339 with millisecond precision.
pub fn format_date(attribute: &AttributeSchema, instant: &DateTime<Utc>) -> Value {
    let text = match attribute.date_format.as_deref() {
        Some(format) => instant.format(format).to_string(),
        None => instant.to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    Value::String(text)
}

/// Which side of the literal an After/Before relation keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Attribute later than the literal
    Later,
    /// Attribute earlier than the literal
    Earlier,
}

/// Direction of an After/Before relation once operand order is applied
pub fn side(op: TemporalOp, swapped: bool) -> Option<Side> {
    let after = match op {
        TemporalOp::After => true,
        TemporalOp::Before => false,
        _ => return None,
    };
    Some(if after != swapped {
        Side::Later
    } else {
        Side::Earlier
    })
}

/// Build the clause for `attribute <op> literal`
pub fn temporal_clause(
    op: TemporalOp,
    attribute: &AttributeSchema,
    literal: &Literal,
    swapped: bool,
) -> Result<Value, Unsupported> {
    let value = classify(literal)
        .ok_or_else(|| Unsupported::new(op.as_str(), "literal is not an instant or period"))?;
    let field = attribute.field();
    let fmt = |instant: &DateTime<Utc>| format_date(attribute, instant);

    let clause = match (op, value) {
        (TemporalOp::After | TemporalOp::Before, TemporalValue::Period(period)) => {
            match side(op, swapped) {
                Some(Side::Later) => query::range(field, &[("gt", fmt(&period.end))]),
                _ => query::range(field, &[("lt", fmt(&period.begin))]),
            }
        }
        (TemporalOp::After | TemporalOp::Before, TemporalValue::Instant(instant)) => {
            match side(op, swapped) {
                Some(Side::Later) => query::range(field, &[("gt", fmt(&instant))]),
                _ => query::range(field, &[("lt", fmt(&instant))]),
            }
        }
        (TemporalOp::Begins, TemporalValue::Period(period)) => {
            query::term(field, fmt(&period.begin))
        }
        (TemporalOp::Ends, TemporalValue::Period(period)) => query::term(field, fmt(&period.end)),
        (
            TemporalOp::Begins
            | TemporalOp::Ends
            | TemporalOp::BegunBy
            | TemporalOp::EndedBy
            | TemporalOp::TEquals,
            TemporalValue::Instant(instant),
        ) => query::term(field, fmt(&instant)),
        (TemporalOp::During | TemporalOp::TContains, TemporalValue::Period(period)) => {
            query::range(
                field,
                &[("gt", fmt(&period.begin)), ("lt", fmt(&period.end))],
            )
        }
        (TemporalOp::During | TemporalOp::TContains, TemporalValue::Instant(_)) => {
            return Err(Unsupported::new(op.as_str(), "requires a period literal"));
        }
        (TemporalOp::BegunBy | TemporalOp::EndedBy | TemporalOp::TEquals, TemporalValue::Period(_)) => {
            return Err(Unsupported::new(op.as_str(), "requires an instant literal"));
        }
        _ => {
            return Err(Unsupported::new(
                op.as_str(),
                "not expressible on instant attributes",
            ));
        }
    };
    Ok(clause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn seen() -> AttributeSchema {
        AttributeSchema::new("seen").with_binding(crate::filter::schema::Binding::Date)
    }

    fn jan(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, day, 0, 0, 0).unwrap()
    }

    fn period() -> Literal {
        Literal::Period(Period {
            begin: jan(1),
            end: jan(31),
        })
    }

    #[test]
    fn test_default_date_format() {
        assert_eq!(format_date(&seen(), &jan(2)), json!("2020-01-02T00:00:00.000Z"));
    }

    #[test]
    fn test_custom_date_format() {
        let attr = seen().with_date_format("%Y/%m/%d");
        assert_eq!(format_date(&attr, &jan(2)), json!("2020/01/02"));
    }

    #[test]
    fn test_after_period_uses_end() {
        let clause = temporal_clause(TemporalOp::After, &seen(), &period(), false).unwrap();
        assert_eq!(
            clause,
            json!({"range": {"seen": {"gt": "2020-01-31T00:00:00.000Z"}}})
        );
    }

    #[test]
    fn test_before_period_uses_begin() {
        let clause = temporal_clause(TemporalOp::Before, &seen(), &period(), false).unwrap();
        assert_eq!(
            clause,
            json!({"range": {"seen": {"lt": "2020-01-01T00:00:00.000Z"}}})
        );
    }

    #[test]
    fn test_swapped_instant_mirrors() {
        let literal = Literal::Date(jan(5));
        let clause = temporal_clause(TemporalOp::Before, &seen(), &literal, true).unwrap();
        assert_eq!(
            clause,
            json!({"range": {"seen": {"gt": "2020-01-05T00:00:00.000Z"}}})
        );
        let clause = temporal_clause(TemporalOp::After, &seen(), &literal, true).unwrap();
        assert_eq!(
            clause,
            json!({"range": {"seen": {"lt": "2020-01-05T00:00:00.000Z"}}})
        );
    }

    #[test]
    fn test_during_is_open_range() {
        let clause = temporal_clause(TemporalOp::During, &seen(), &period(), false).unwrap();
        assert_eq!(
            clause,
            json!({"range": {"seen": {
                "gt": "2020-01-01T00:00:00.000Z",
                "lt": "2020-01-31T00:00:00.000Z"
            }}})
        );
    }

    #[test]
    fn test_equality_relations() {
        let literal = Literal::Date(jan(3));
        for op in [TemporalOp::TEquals, TemporalOp::Begins, TemporalOp::EndedBy] {
            let clause = temporal_clause(op, &seen(), &literal, false).unwrap();
            assert_eq!(clause, json!({"term": {"seen": "2020-01-03T00:00:00.000Z"}}));
        }
        let clause = temporal_clause(TemporalOp::Ends, &seen(), &period(), false).unwrap();
        assert_eq!(clause, json!({"term": {"seen": "2020-01-31T00:00:00.000Z"}}));
    }

    #[test]
    fn test_unsupported_relations() {
        assert!(temporal_clause(TemporalOp::Meets, &seen(), &period(), false).is_err());
        assert!(temporal_clause(TemporalOp::AnyInteracts, &seen(), &period(), false).is_err());
        let instant = Literal::Date(jan(3));
        let err = temporal_clause(TemporalOp::During, &seen(), &instant, false).unwrap_err();
        assert_eq!(err.kind, "during");
        assert!(temporal_clause(TemporalOp::After, &seen(), &Literal::Value(json!(5)), false).is_err());
    }

    #[test]
    fn test_rfc3339_string_is_instant() {
        let literal = Literal::Value(json!("2020-01-03T00:00:00Z"));
        assert_eq!(classify(&literal), Some(TemporalValue::Instant(jan(3))));
    }
}
