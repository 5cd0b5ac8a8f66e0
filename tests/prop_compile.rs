use bson::Document;
use docset::filter::{Filter, compile_expr, compile_match};
use docset::pipeline::build_pipeline;
use docset::set::{QueryContext, SortDirection, SortSpec};
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = Filter> {
    let field = "[a-z]{1,6}";
    prop_oneof![
        (field, any::<i32>()).prop_map(|(f, v)| Filter::eq(f, v)),
        (field, any::<i64>()).prop_map(|(f, v)| Filter::gt(f, v)),
        (field, any::<i32>(), any::<i32>()).prop_map(|(f, a, b)| Filter::between(f, a.min(b), a.max(b))),
        (field, ".{0,8}").prop_map(|(f, s)| Filter::starts_with(f, s)),
        (field, proptest::collection::vec(".{0,6}", 1..4)).prop_map(|(f, v)| Filter::contains(f, v)),
        (field, proptest::collection::vec(any::<i64>(), 0..4)).prop_map(|(f, v)| Filter::is_in(f, v)),
    ]
}

fn tree() -> impl Strategy<Value = Filter> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 1..4).prop_map(|v| Filter::and(v)),
            proptest::collection::vec(inner.clone(), 1..4).prop_map(|v| Filter::or(v)),
            ("[a-z]{1,6}", inner).prop_map(|(f, i)| Filter::elem_match(f, i)),
        ]
    })
}

fn stage_names(stages: &[Document]) -> Vec<String> {
    stages.iter().filter_map(|s| s.keys().next().cloned()).collect()
}

proptest! {
    #[test]
    fn prop_compile_is_deterministic(f in tree()) {
        prop_assert_eq!(compile_match(&f).unwrap(), compile_match(&f).unwrap());
        prop_assert_eq!(compile_expr(&f).unwrap(), compile_expr(&f).unwrap());
    }

    #[test]
    fn prop_stage_order_is_fixed(
        f in proptest::option::of(tree()),
        sort in proptest::option::of("[a-z]{1,4}"),
        skip in proptest::option::of(0u64..1000),
        limit in proptest::option::of(0u64..1000),
    ) {
        let ctx = QueryContext {
            table: "t".into(),
            filter: f,
            sort: sort.map(|field| SortSpec { field, direction: SortDirection::Ascending }),
            skip,
            limit,
            ..QueryContext::default()
        };
        let names = stage_names(&build_pipeline(&ctx).unwrap());
        let mut expected = vec!["$match".to_string()];
        if ctx.sort.is_some() { expected.push("$sort".into()); }
        if skip.is_some() { expected.push("$skip".into()); }
        if limit.is_some() { expected.push("$limit".into()); }
        prop_assert_eq!(names, expected);
    }
}
