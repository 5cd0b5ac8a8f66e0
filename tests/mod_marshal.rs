use bson::{Bson, Document, doc};
use docset::marshal::{Marshaled, Payload, from_mapping, from_record, marshal};
use serde::Serialize;

#[derive(Serialize)]
struct Account {
    id: String,
    owner: String,
    balance: i64,
    opened: String,
    limits: Vec<i32>,
}

fn account() -> Account {
    Account {
        id: "650c1f1e9d3a2b0012345678".into(),
        owner: "Grace".into(),
        balance: 1200,
        opened: "2023-09-21T10:00:00+02:00".into(),
        limits: vec![10, 20],
    }
}

#[test]
fn integers_stay_integers() {
    let d = from_record(&serde_json::to_value(account()).unwrap(), true).unwrap();
    assert_eq!(d.get("balance"), Some(&Bson::Int64(1200)));
    assert_eq!(d.get("limits"), Some(&Bson::Array(vec![Bson::Int64(10), Bson::Int64(20)])));
    assert!(matches!(d.get("opened"), Some(Bson::DateTime(_))));
    assert!(matches!(d.get("_id"), Some(Bson::ObjectId(_))));
}

#[test]
fn every_identifier_spelling_normalizes() {
    for key in ["ID", "id", "_id"] {
        let mut src = Document::new();
        src.insert(key, 5);
        src.insert("v", 1);
        assert_eq!(from_mapping(&src, true).unwrap(), doc! { "_id": 5, "v": 1 });
        assert_eq!(from_mapping(&src, false).unwrap(), doc! { "v": 1 });
    }
}

#[test]
fn mapping_with_and_without_id_differ_only_by_id() {
    let src = doc! { "id": "k1", "a": 1, "b": { "c": true }, "d": [1, 2] };
    let with = from_mapping(&src, true).unwrap();
    let without = from_mapping(&src, false).unwrap();
    let mut stripped = with.clone();
    assert!(stripped.remove("_id").is_some());
    assert_eq!(stripped, without);
    assert!(!without.contains_key("_id"));
}

#[test]
fn payload_shapes_map_to_marshaled_shapes() {
    let one = marshal(&Payload::mapping(doc! { "a": 1 }), true).unwrap();
    assert!(matches!(one, Marshaled::One(_)));
    let many = marshal(&Payload::sequence(&[account(), account()]).unwrap(), true).unwrap();
    let Marshaled::Many(docs) = many else { panic!("expected many") };
    assert_eq!(docs.len(), 2);
    // Sequence elements are not inferred.
    assert_eq!(docs[0].get_str("opened").unwrap(), "2023-09-21T10:00:00+02:00");
}

#[test]
fn unsupported_roots_are_configuration_errors() {
    for p in [Payload::record(&"text").unwrap(), Payload::record(&vec![1, 2]).unwrap()] {
        assert!(marshal(&p, true).unwrap_err().is_configuration());
    }
    assert!(marshal(&Payload::Sequence(Vec::new()), true).unwrap_err().is_configuration());
}
