use bson::{Bson, doc};
use chrono::{TimeZone, Utc};
use docset::filter::{Filter, compile_expr, compile_match, parse_filter_json};
use docset::DbError;

#[test]
fn and_of_eq_and_starts_with() {
    let f = Filter::and([Filter::eq("age", 45), Filter::starts_with("name", "A")]);
    assert_eq!(
        compile_match(&f).unwrap(),
        doc! { "$and": [
            { "age": { "$eq": 45 } },
            { "name": { "$regex": "^A.*$", "$options": "i" } },
        ] }
    );
}

#[test]
fn between_exclusive_and_inclusive() {
    assert_eq!(
        compile_match(&Filter::between("age", 27, 38)).unwrap(),
        doc! { "age": { "$gt": 27, "$lt": 38 } }
    );
    assert_eq!(
        compile_match(&Filter::between_eq("age", 27, 38)).unwrap(),
        doc! { "age": { "$gte": 27, "$lte": 38 } }
    );
    assert_eq!(
        compile_match(&Filter::range_eq("n", 1i64, 5_000_000_000i64)).unwrap(),
        doc! { "n": { "$gte": 1i64, "$lte": 5_000_000_000i64 } }
    );
}

#[test]
fn timestamp_ranges() {
    let lo = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let hi = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let got = compile_match(&Filter::range("created", lo, hi)).unwrap();
    let inner = got.get_document("created").unwrap();
    assert_eq!(inner.get("$gt"), Some(&Bson::DateTime(bson::DateTime::from_millis(lo.timestamp_millis()))));
    assert_eq!(inner.get("$lt"), Some(&Bson::DateTime(bson::DateTime::from_millis(hi.timestamp_millis()))));
}

#[test]
fn contains_single_and_multiple() {
    assert_eq!(
        compile_match(&Filter::contains("name", ["der"])).unwrap(),
        doc! { "name": { "$regex": ".*der.*", "$options": "i" } }
    );
    assert_eq!(
        compile_match(&Filter::contains("name", ["der", "man"])).unwrap(),
        doc! { "$or": [
            { "name": { "$regex": ".*der.*", "$options": "i" } },
            { "name": { "$regex": ".*man.*", "$options": "i" } },
        ] }
    );
}

#[test]
fn patterns_are_escaped() {
    assert_eq!(
        compile_match(&Filter::ends_with("file", "a.b*")).unwrap(),
        doc! { "file": { "$regex": r"^.*a\.b\*$", "$options": "i" } }
    );
}

#[test]
fn expression_form() {
    let f = Filter::or([Filter::gte("age", 18), Filter::contains("name", ["x"])]);
    assert_eq!(
        compile_expr(&f).unwrap(),
        doc! { "$or": [
            { "$gte": ["age", 18] },
            { "$regexMatch": { "input": "name", "$regex": ".*x.*", "$options": "i" } },
        ] }
    );
    assert_eq!(
        compile_expr(&Filter::between("age", 1, 9)).unwrap(),
        doc! { "$and": [ { "$gt": ["age", 1] }, { "$lt": ["age", 9] } ] }
    );
}

#[test]
fn membership_exists_and_elem_match() {
    assert_eq!(
        compile_match(&Filter::is_in("tag", ["a", "b"])).unwrap(),
        doc! { "tag": { "$in": ["a", "b"] } }
    );
    assert_eq!(
        compile_match(&Filter::not_in("n", [1, 2])).unwrap(),
        doc! { "n": { "$nin": [1, 2] } }
    );
    assert_eq!(compile_match(&Filter::exists("x", false)).unwrap(), doc! { "x": { "$exists": false } });
    assert_eq!(
        compile_match(&Filter::elem_match("items", Filter::gt("qty", 2))).unwrap(),
        doc! { "items": { "$elemMatch": { "qty": { "$gt": 2 } } } }
    );
}

#[test]
fn not_and_sort_leaves() {
    assert!(compile_match(&Filter::not(Filter::eq("a", 1))).unwrap().is_empty());
    assert_eq!(compile_match(&Filter::sort("age", "ASC")).unwrap(), doc! { "age": { "$sort": 1 } });
    assert_eq!(compile_match(&Filter::sort("age", "down")).unwrap(), doc! { "age": { "$sort": -1 } });
}

#[test]
fn shape_violations_fail_to_compile() {
    let err = compile_match(&Filter::or([])).unwrap_err();
    assert!(matches!(err, DbError::Compile(_)));
    assert!(err.is_configuration());
    assert!(compile_match(&Filter::contains("n", Vec::<String>::new())).is_err());
    assert!(compile_match(&Filter::and([Filter::eq("a", 1), Filter::and([])])).is_err());
}

#[test]
fn json_front_end() {
    let f = parse_filter_json(
        r#"{ "op": "and", "items": [
            { "op": "between", "field": "age", "from": 27, "to": 38 },
            { "op": "contains", "field": "name", "values": ["der", "man"] }
        ] }"#,
    )
    .unwrap();
    assert_eq!(
        f,
        Filter::and([Filter::between("age", 27, 38), Filter::contains("name", ["der", "man"])])
    );

    let err = parse_filter_json(r#"{ "op": "between", "field": "a", "from": 1, "to": "x" }"#).unwrap_err();
    assert!(matches!(err, DbError::Configuration(_)));
    assert!(matches!(parse_filter_json("{ nope"), Err(DbError::Json(_))));
}

#[test]
fn trees_are_reusable() {
    let shared = Filter::eq("k", "v");
    let a = compile_match(&Filter::and([shared.clone()])).unwrap();
    let b = compile_match(&Filter::or([shared.clone()])).unwrap();
    assert_eq!(a.get_array("$and").unwrap(), b.get_array("$or").unwrap());
    assert_eq!(compile_match(&shared).unwrap(), doc! { "k": { "$eq": "v" } });
}
