//! Value casting.
//!
//! Turns a raw query-string token into a typed [`Value`]:
//!
//! ```text
//! null            -> Null
//! true / false    -> Bool           (no declared type only)
//! [a|b]  [a:b]    -> Range          (between operators only)
//! [a,b,c]         -> Array          (eq, neq, between, overlap; text otherwise)
//! 42::int         -> Int(42)        (inline type suffix)
//! anything else   -> String, or the declared type
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::{alpha1, alphanumeric0, char},
    combinator::{all_consuming, recognize},
    multi::separated_list1,
    sequence::{delimited, pair, separated_pair},
    IResult,
};

use crate::ast::{DataType, Operator, Value};
use crate::error::{FilterError, FilterResult};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Split an inline `value::type` suffix off a raw token.
///
/// The suffix only counts as a type hint when it looks like an identifier, so
/// tokens such as `::1` pass through untouched. An identifier that is not a
/// known type is an error.
pub fn split_type_hint(token: &str) -> FilterResult<(&str, Option<DataType>)> {
    let Some((value, hint)) = token.rsplit_once("::") else {
        return Ok((token, None));
    };
    if parse_type_name(hint).is_err() {
        return Ok((token, None));
    }
    let data_type = hint.parse::<DataType>()?;
    Ok((value, Some(data_type)))
}

/// Cast a raw token (type suffix already stripped) according to the declared
/// type and the operator context.
pub fn cast(
    token: &str,
    data_type: Option<DataType>,
    operator: Operator,
    range_delimiters: &[char],
) -> FilterResult<Value> {
    if data_type != Some(DataType::String) && token.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    if data_type.is_none() {
        if token.eq_ignore_ascii_case("true") {
            return Ok(Value::Bool(true));
        }
        if token.eq_ignore_ascii_case("false") {
            return Ok(Value::Bool(false));
        }
    }

    if let Ok((_, inner)) = parse_bracketed(token) {
        if operator.is_range() {
            for &delimiter in range_delimiters {
                if let Ok((_, (from, to))) = parse_range(inner, delimiter) {
                    return Ok(Value::Range(
                        Box::new(cast_scalar(from, data_type)?),
                        Box::new(cast_scalar(to, data_type)?),
                    ));
                }
            }
        }
        if !operator.accepts_array() {
            return cast_scalar(token, data_type);
        }
        if let Ok((_, items)) = parse_list(inner) {
            return items
                .into_iter()
                .map(|item| cast_scalar(item, data_type))
                .collect::<FilterResult<Vec<_>>>()
                .map(Value::Array);
        }
    }

    cast_scalar(token, data_type)
}

/// Cast a single scalar token. No declared type keeps the token as a string.
pub fn cast_scalar(token: &str, data_type: Option<DataType>) -> FilterResult<Value> {
    let Some(data_type) = data_type else {
        return Ok(Value::String(token.to_string()));
    };
    let fail = |reason: &dyn std::fmt::Display| FilterError::cast(data_type, token, reason);

    let value = match data_type {
        DataType::String => Value::String(token.to_string()),
        DataType::Int => Value::Int(token.parse().map_err(|e| fail(&e))?),
        DataType::Int64 => Value::Int64(token.parse().map_err(|e| fail(&e))?),
        DataType::Float => Value::Float(token.parse().map_err(|e| fail(&e))?),
        DataType::Float64 => Value::Float64(token.parse().map_err(|e| fail(&e))?),
        DataType::Uint | DataType::Uint64 => Value::Uint(token.parse().map_err(|e| fail(&e))?),
        DataType::Date => {
            Value::Date(NaiveDate::parse_from_str(token, DATE_FORMAT).map_err(|e| fail(&e))?)
        }
        DataType::Time => {
            Value::Time(NaiveTime::parse_from_str(token, TIME_FORMAT).map_err(|e| fail(&e))?)
        }
        DataType::DateTime => Value::DateTime(
            NaiveDateTime::parse_from_str(token, DATETIME_FORMAT).map_err(|e| fail(&e))?,
        ),
    };
    Ok(value)
}

/// Type name of an inline suffix: a letter followed by letters or digits.
fn parse_type_name(input: &str) -> IResult<&str, &str> {
    all_consuming(recognize(pair(alpha1, alphanumeric0)))(input)
}

/// Contents of a `[...]` literal. Nested brackets are not part of the grammar.
fn parse_bracketed(input: &str) -> IResult<&str, &str> {
    all_consuming(delimited(
        char('['),
        take_while1(|c: char| c != '[' && c != ']'),
        char(']'),
    ))(input)
}

/// `from<d>to` with exactly one delimiter and two non-empty endpoints.
fn parse_range(input: &str, delimiter: char) -> IResult<&str, (&str, &str)> {
    all_consuming(separated_pair(
        take_while1(move |c: char| c != delimiter),
        char(delimiter),
        take_while1(move |c: char| c != delimiter),
    ))(input)
}

/// Comma-separated list items.
fn parse_list(input: &str) -> IResult<&str, Vec<&str>> {
    all_consuming(separated_list1(char(','), take_while(|c: char| c != ',')))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const RANGE: &[char] = &['|', ':'];

    fn cast_as(token: &str, data_type: Option<DataType>) -> Value {
        cast(token, data_type, Operator::Eq, RANGE).unwrap()
    }

    #[test]
    fn test_untyped_text() {
        assert_eq!(cast_as("text", None), Value::String("text".into()));
    }

    #[test]
    fn test_integers() {
        assert_eq!(cast_as("1", Some(DataType::Int)), Value::Int(1));
        assert_eq!(
            cast_as("-123456789987654", Some(DataType::Int64)),
            Value::Int64(-123456789987654)
        );
        assert_eq!(cast_as("123456789", Some(DataType::Uint)), Value::Uint(123456789));
        assert_eq!(
            cast_as("123456789123321654", Some(DataType::Uint64)),
            Value::Uint(123456789123321654)
        );
    }

    #[test]
    fn test_float_precision() {
        let lossy = cast_as("1234.5678", Some(DataType::Float));
        assert_eq!(lossy.as_f64(), Some(1234.5677490234375));
        assert_eq!(cast_as("-1234.5678", Some(DataType::Float64)), Value::Float64(-1234.5678));
    }

    #[test]
    fn test_temporal() {
        let Value::Date(date) = cast_as("2025-03-28", Some(DataType::Date)) else {
            panic!("expected date");
        };
        assert_eq!(date.format(DATE_FORMAT).to_string(), "2025-03-28");

        let Value::Time(time) = cast_as("23:52:12", Some(DataType::Time)) else {
            panic!("expected time");
        };
        assert_eq!((time.hour(), time.minute(), time.second()), (23, 52, 12));

        let Value::DateTime(dt) = cast_as("2025-03-28 23:52:12", Some(DataType::DateTime)) else {
            panic!("expected datetime");
        };
        assert_eq!(dt.format(DATETIME_FORMAT).to_string(), "2025-03-28 23:52:12");
    }

    #[test]
    fn test_literals() {
        assert_eq!(cast_as("true", None), Value::Bool(true));
        assert_eq!(cast_as("FALSE", None), Value::Bool(false));
        assert_eq!(cast_as("false", Some(DataType::String)), Value::String("false".into()));
        assert_eq!(cast_as("null", None), Value::Null);
        assert_eq!(cast_as("NULL", Some(DataType::Int)), Value::Null);
        assert_eq!(cast_as("null", Some(DataType::String)), Value::String("null".into()));
    }

    #[test]
    fn test_arrays() {
        let strings: Value = vec!["t1", "t2", "t3"].into();
        assert_eq!(cast_as("[t1,t2,t3]", None), strings);
        assert_eq!(cast_as("[t1,t2,t3]", Some(DataType::String)), strings);
        assert_eq!(cast_as("[1,2,3]", Some(DataType::Int)), vec![1, 2, 3].into());
        assert_eq!(cast_as("[1,2,3]", None), vec!["1", "2", "3"].into());
    }

    #[test]
    fn test_ranges_only_for_between() {
        let range = cast("[1|10]", Some(DataType::Int), Operator::Between, RANGE).unwrap();
        assert_eq!(range, Value::Range(Box::new(Value::Int(1)), Box::new(Value::Int(10))));

        let colon = cast("[a:b]", None, Operator::Between, RANGE).unwrap();
        assert_eq!(colon, Value::Range(Box::new("a".into()), Box::new("b".into())));

        // outside a between context the brackets are just a one-item list
        assert_eq!(cast_as("[1|10]", None), vec!["1|10"].into());
    }

    #[test]
    fn test_brackets_are_text_for_single_value_operators() {
        let value = cast("[abc]", None, Operator::Like, RANGE).unwrap();
        assert_eq!(value, Value::String("[abc]".into()));

        let value = cast("[a,b]", None, Operator::Any, RANGE).unwrap();
        assert_eq!(value, Value::String("[a,b]".into()));

        let err = cast("[1,2]", Some(DataType::Int), Operator::Gt, RANGE).unwrap_err();
        assert!(matches!(err, FilterError::Cast { ref value, .. } if value == "[1,2]"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_malformed_range_is_not_an_error() {
        let value = cast("[1|2|3]", None, Operator::Between, RANGE).unwrap();
        assert_eq!(value, vec!["1|2|3"].into());

        let value = cast("[|3]", None, Operator::Between, &['|']).unwrap();
        assert_eq!(value, vec!["|3"].into());
    }

    #[test]
    fn test_datetime_range_uses_pipe() {
        let value = cast(
            "[2024-08-01 00:00:00|2024-08-31 23:59:59]",
            Some(DataType::DateTime),
            Operator::Between,
            RANGE,
        )
        .unwrap();
        let Value::Range(from, to) = value else {
            panic!("expected range");
        };
        assert!(matches!(*from, Value::DateTime(_)));
        assert!(matches!(*to, Value::DateTime(_)));
    }

    #[test]
    fn test_cast_error_names_type() {
        let err = cast("abc", Some(DataType::Int), Operator::Eq, RANGE).unwrap_err();
        assert!(matches!(
            err,
            FilterError::Cast { ref data_type, ref value, .. } if data_type == "int" && value == "abc"
        ));

        let err = cast("[1,x]", Some(DataType::Int), Operator::Eq, RANGE).unwrap_err();
        assert!(matches!(err, FilterError::Cast { ref value, .. } if value == "x"));
    }

    #[test]
    fn test_split_type_hint() {
        assert_eq!(split_type_hint("5::int").unwrap(), ("5", Some(DataType::Int)));
        assert_eq!(
            split_type_hint("[1|2]::datetime").unwrap(),
            ("[1|2]", Some(DataType::DateTime))
        );
        assert_eq!(split_type_hint("plain").unwrap(), ("plain", None));
        assert_eq!(split_type_hint("::1").unwrap(), ("::1", None));
        assert_eq!(split_type_hint("12:30:00").unwrap(), ("12:30:00", None));
        assert!(matches!(
            split_type_hint("x::uuid"),
            Err(FilterError::UnknownType(name)) if name == "uuid"
        ));
    }
}
