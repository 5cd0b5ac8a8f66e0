use bson::Document;
use serde::Deserialize;
use std::time::Duration;

use super::Set;
use crate::filter::{Filter, FilterSerde};

/// All builder fields as one value. Unset fields leave the builder's defaults in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetParams {
    pub table: String,
    pub filter: Option<Filter>,
    pub pipe: Option<Vec<Document>>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub timeout: Option<Duration>,
}

impl SetParams {
    #[must_use]
    pub fn apply<S>(self, mut set: Set<S>) -> Set<S> {
        set = set.table(self.table);
        if let Some(f) = self.filter {
            set = set.filter(f);
        }
        if let Some(p) = self.pipe {
            set = set.pipe(p);
        }
        if let Some(field) = self.sort_field {
            set = set.sort(field, self.sort_direction.as_deref().unwrap_or_default());
        }
        if let Some(n) = self.skip {
            set = set.skip(n);
        }
        if let Some(n) = self.limit {
            set = set.limit(n);
        }
        if let Some(t) = self.timeout {
            set = set.timeout(t);
        }
        set
    }
}

/// Wire form of [`SetParams`] for JSON or TOML query files; the filter uses the tagged JSON shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SetParamsSerde {
    pub table: String,
    pub filter: Option<FilterSerde>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub timeout_secs: Option<u64>,
}

impl TryFrom<SetParamsSerde> for SetParams {
    type Error = crate::errors::DbError;

    fn try_from(s: SetParamsSerde) -> Result<Self, Self::Error> {
        Ok(Self {
            table: s.table,
            filter: s.filter.map(Filter::try_from).transpose()?,
            pipe: None,
            sort_field: s.sort_field,
            sort_direction: s.sort_direction,
            skip: s.skip,
            limit: s.limit,
            timeout: s.timeout_secs.map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::set::Database;
    use crate::store::MemoryStore;

    #[test]
    fn struct_and_chained_entry_points_agree() {
        let db = Database::new(MemoryStore::new());
        let chained = db
            .data()
            .table("people")
            .filter(Filter::gt("age", 30))
            .sort("age", "asc")
            .skip(1)
            .limit(5)
            .timeout(Duration::from_secs(3));
        let from_params = db.data_with(SetParams {
            table: "people".into(),
            filter: Some(Filter::gt("age", 30)),
            sort_field: Some("age".into()),
            sort_direction: Some("asc".into()),
            skip: Some(1),
            limit: Some(5),
            timeout: Some(Duration::from_secs(3)),
            ..SetParams::default()
        });
        assert_eq!(chained.context(), from_params.context());
    }

    #[test]
    fn omitted_fields_keep_defaults() {
        let db = Database::new(MemoryStore::new());
        let set = db.data_with(SetParams { table: "t".into(), ..SetParams::default() });
        assert_eq!(set.context().timeout, Duration::from_secs(crate::set::DEFAULT_TIMEOUT_SECS));
        assert!(set.context().sort.is_none());
    }

    #[test]
    fn missing_direction_sorts_descending() {
        let db = Database::new(MemoryStore::new());
        let set = db.data_with(SetParams { sort_field: Some("n".into()), ..SetParams::default() });
        assert_eq!(set.context().sort.as_ref().map(|s| s.direction), Some(crate::set::SortDirection::Descending));
    }

    #[test]
    fn wire_form_converts() {
        let raw: SetParamsSerde = serde_json::from_str(
            r#"{ "table": "t", "filter": { "op": "eq", "field": "a", "value": 1 }, "limit": 2, "timeout_secs": 4 }"#,
        )
        .unwrap();
        let p = SetParams::try_from(raw).unwrap();
        assert_eq!(p.filter.as_ref().map(|f| f.field.as_str()), Some("a"));
        assert_eq!(p.timeout, Some(Duration::from_secs(4)));
        assert!(serde_json::from_str::<SetParamsSerde>(r#"{ "tabel": "t" }"#).is_err());
    }
}
