use bson::{Bson, Document, doc};

use super::types::{Bounds, Filter, FilterValue, Op};
use crate::errors::DbError;

/// Target representation of a compiled filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// `{field: {op: value}}`, as used by `$match` and find/count/update/delete filters.
    Match,
    /// `{op: [field, value]}`, as used inside `$expr`, `$project`, `$switch`.
    Expr,
}

/// Compile a filter tree into a `$match`-style query document.
///
/// # Errors
/// Returns `DbError::Compile` when a node violates its operator's arity or operand shape.
pub fn compile_match(filter: &Filter) -> Result<Document, DbError> {
    compile(filter, Form::Match)
}

/// Compile a filter tree into an aggregation expression.
///
/// # Errors
/// Returns `DbError::Compile` when a node violates its operator's arity or operand shape.
pub fn compile_expr(filter: &Filter) -> Result<Document, DbError> {
    compile(filter, Form::Expr)
}

pub fn compile(filter: &Filter, form: Form) -> Result<Document, DbError> {
    let mut main = Document::new();
    match filter.op {
        Op::And | Op::Or => {
            if filter.items.is_empty() {
                return Err(DbError::compile(format!(
                    "{} requires at least one child filter",
                    filter.op.symbol()
                )));
            }
            let children = filter
                .items
                .iter()
                .map(|f| compile(f, form).map(Bson::Document))
                .collect::<Result<Vec<_>, _>>()?;
            main.insert(filter.op.symbol(), children);
        }
        // No agreed semantics for negation yet; renders as the empty (match-all) document.
        Op::Not => {}
        Op::Eq
        | Op::Ne
        | Op::Gt
        | Op::Gte
        | Op::Lt
        | Op::Lte
        | Op::In
        | Op::Nin
        | Op::Sort
        | Op::Exists => {
            let value = operand(filter)?;
            match form {
                Form::Match => {
                    main.insert(filter.field.clone(), doc! { filter.op.symbol(): value });
                }
                Form::Expr => {
                    main.insert(filter.op.symbol(), vec![Bson::String(filter.field.clone()), value]);
                }
            }
        }
        Op::Between | Op::Range => {
            let bounds = pair(filter)?;
            render_range(&mut main, filter, bounds, ("$gt", "$lt"), form);
        }
        Op::BetweenEq | Op::RangeEq => {
            let bounds = pair(filter)?;
            render_range(&mut main, filter, bounds, ("$gte", "$lte"), form);
        }
        Op::StartsWith => {
            let pattern = format!("^{}.*$", regex::escape(single_pattern(filter)?));
            render_regex(&mut main, &filter.field, pattern, form);
        }
        Op::EndsWith => {
            let pattern = format!("^.*{}$", regex::escape(single_pattern(filter)?));
            render_regex(&mut main, &filter.field, pattern, form);
        }
        Op::Contains => {
            let values = match &filter.value {
                FilterValue::Patterns(v) if !v.is_empty() => v,
                FilterValue::Patterns(_) => {
                    return Err(DbError::compile(format!(
                        "contains on '{}' requires at least one value",
                        filter.field
                    )));
                }
                other => return Err(shape_error(filter, other)),
            };
            if let [only] = values.as_slice() {
                render_regex(&mut main, &filter.field, contains_pattern(only), form);
            } else {
                let clauses: Vec<Bson> = values
                    .iter()
                    .map(|v| {
                        let mut clause = Document::new();
                        render_regex(&mut clause, &filter.field, contains_pattern(v), form);
                        Bson::Document(clause)
                    })
                    .collect();
                main.insert("$or", clauses);
            }
        }
        Op::ElemMatch => {
            let FilterValue::Nested(inner) = &filter.value else {
                return Err(shape_error(filter, &filter.value));
            };
            // The sub-filter is always a query document, whichever form the parent uses.
            let inner = compile(inner, Form::Match)?;
            main.insert(filter.field.clone(), doc! { "$elemMatch": inner });
        }
    }
    Ok(main)
}

fn operand(filter: &Filter) -> Result<Bson, DbError> {
    match &filter.value {
        FilterValue::Scalar(v) => Ok(v.clone()),
        FilterValue::List(vs) => Ok(Bson::Array(vs.clone())),
        other => Err(shape_error(filter, other)),
    }
}

fn pair(filter: &Filter) -> Result<&Bounds, DbError> {
    match &filter.value {
        FilterValue::Pair(b) => Ok(b),
        other => Err(shape_error(filter, other)),
    }
}

fn single_pattern(filter: &Filter) -> Result<&str, DbError> {
    match &filter.value {
        FilterValue::Scalar(Bson::String(s)) => Ok(s),
        FilterValue::Patterns(v) if v.len() == 1 => Ok(&v[0]),
        other => Err(shape_error(filter, other)),
    }
}

fn contains_pattern(value: &str) -> String {
    format!(".*{}.*", regex::escape(value))
}

fn render_range(
    main: &mut Document,
    filter: &Filter,
    bounds: &Bounds,
    (lo_op, hi_op): (&str, &str),
    form: Form,
) {
    match form {
        Form::Match => {
            main.insert(
                filter.field.clone(),
                doc! { lo_op: bounds.lower(), hi_op: bounds.upper() },
            );
        }
        Form::Expr => {
            let field = Bson::String(filter.field.clone());
            main.insert(
                "$and",
                vec![
                    Bson::Document(doc! { lo_op: [field.clone(), bounds.lower()] }),
                    Bson::Document(doc! { hi_op: [field, bounds.upper()] }),
                ],
            );
        }
    }
}

fn render_regex(main: &mut Document, field: &str, pattern: String, form: Form) {
    match form {
        Form::Match => {
            main.insert(field.to_string(), doc! { "$regex": pattern, "$options": "i" });
        }
        Form::Expr => {
            main.insert(
                "$regexMatch",
                doc! { "input": field, "$regex": pattern, "$options": "i" },
            );
        }
    }
}

fn shape_error(filter: &Filter, got: &FilterValue) -> DbError {
    let got = match got {
        FilterValue::None => "no value",
        FilterValue::Scalar(_) => "a scalar",
        FilterValue::List(_) => "a list",
        FilterValue::Pair(_) => "a range pair",
        FilterValue::Patterns(_) => "a pattern list",
        FilterValue::Nested(_) => "a nested filter",
    };
    let target = if filter.field.is_empty() { "<root>" } else { filter.field.as_str() };
    DbError::compile(format!("operator {} on '{target}' cannot take {got}", filter.op.symbol()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_leaf_in_both_forms() {
        let f = Filter::gte("age", 18);
        assert_eq!(compile_match(&f).unwrap(), doc! { "age": { "$gte": 18 } });
        assert_eq!(compile_expr(&f).unwrap(), doc! { "$gte": ["age", 18] });
    }

    #[test]
    fn membership_renders_list() {
        let f = Filter::is_in("tag", ["a", "b"]);
        assert_eq!(compile_match(&f).unwrap(), doc! { "tag": { "$in": ["a", "b"] } });
        let f = Filter::not_in("tag", [1, 2]);
        assert_eq!(compile_expr(&f).unwrap(), doc! { "$nin": ["tag", [1, 2]] });
    }

    #[test]
    fn missing_value_is_a_compile_error() {
        let f = Filter { items: vec![], field: "x".into(), op: Op::Eq, value: FilterValue::None };
        let err = compile_match(&f).unwrap_err();
        assert!(matches!(err, DbError::Compile(_)));
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn range_without_pair_fails_fast() {
        let f = Filter {
            items: vec![],
            field: "age".into(),
            op: Op::Between,
            value: FilterValue::Scalar(Bson::String("27".into())),
        };
        assert!(matches!(compile_match(&f), Err(DbError::Compile(_))));
        assert!(matches!(compile_expr(&f), Err(DbError::Compile(_))));
    }

    #[test]
    fn empty_combinator_is_rejected() {
        assert!(compile_match(&Filter::or([])).is_err());
    }

    #[test]
    fn not_renders_empty() {
        let f = Filter::not(Filter::eq("a", 1));
        assert!(compile_match(&f).unwrap().is_empty());
        assert!(compile_expr(&f).unwrap().is_empty());
    }

    #[test]
    fn regex_input_is_escaped() {
        let f = Filter::starts_with("path", "a.b*");
        assert_eq!(
            compile_match(&f).unwrap(),
            doc! { "path": { "$regex": "^a\\.b\\*.*$", "$options": "i" } }
        );
        let f = Filter::ends_with("path", "(x)");
        assert_eq!(
            compile_match(&f).unwrap(),
            doc! { "path": { "$regex": "^.*\\(x\\)$", "$options": "i" } }
        );
    }

    #[test]
    fn regex_expr_form() {
        let f = Filter::ends_with("name", "son");
        assert_eq!(
            compile_expr(&f).unwrap(),
            doc! { "$regexMatch": { "input": "name", "$regex": "^.*son$", "$options": "i" } }
        );
    }

    #[test]
    fn empty_contains_is_rejected() {
        let f = Filter::contains("name", Vec::<String>::new());
        assert!(matches!(compile_match(&f), Err(DbError::Compile(_))));
    }

    #[test]
    fn elem_match_recurses() {
        let f = Filter::elem_match("items", Filter::and([Filter::eq("sku", "a"), Filter::gt("qty", 2)]));
        assert_eq!(
            compile_match(&f).unwrap(),
            doc! { "items": { "$elemMatch": { "$and": [ { "sku": { "$eq": "a" } }, { "qty": { "$gt": 2 } } ] } } }
        );
    }

    #[test]
    fn sort_leaf_shape() {
        assert_eq!(compile_match(&Filter::sort("at", "asc")).unwrap(), doc! { "at": { "$sort": 1 } });
    }

    #[test]
    fn inclusive_range_expr_form() {
        let f = Filter::range_eq("n", 1, 5);
        assert_eq!(
            compile_expr(&f).unwrap(),
            doc! { "$and": [ { "$gte": ["n", 1] }, { "$lte": ["n", 5] } ] }
        );
    }
}
