use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::eval::{Matcher, compare_bson, lookup};
use super::{CountOptions, Store};
use crate::errors::DbError;
use crate::marshal::ID_KEY;

/// In-process document store. Collections are created on first insert and keep insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the collections currently holding data, sorted.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn snapshot(&self, table: &str) -> Vec<Document> {
        self.collections.read().get(table).cloned().unwrap_or_default()
    }

    fn count_matching(&self, table: &str, filter: &Document) -> Result<u64, DbError> {
        let guard = self.collections.read();
        let Some(docs) = guard.get(table) else { return Ok(0) };
        let m = Matcher::new(filter);
        let mut n = 0;
        for d in docs {
            if m.matches(d)? {
                n += 1;
            }
        }
        Ok(n)
    }

    fn remove_matching(&self, table: &str, filter: &Document, at_most: Option<usize>) -> Result<u64, DbError> {
        let mut guard = self.collections.write();
        let Some(docs) = guard.get_mut(table) else { return Ok(0) };
        let m = Matcher::new(filter);
        let mut hits = Vec::new();
        for (i, d) in docs.iter().enumerate() {
            if at_most.is_some_and(|cap| hits.len() >= cap) {
                break;
            }
            if m.matches(d)? {
                hits.push(i);
            }
        }
        for i in hits.iter().rev() {
            docs.remove(*i);
        }
        let removed = hits.len() as u64;
        Ok(removed)
    }
}

impl Store for MemoryStore {
    async fn aggregate(&self, table: &str, pipeline: &[Document]) -> Result<Vec<Document>, DbError> {
        let mut docs = self.snapshot(table);
        for stage in pipeline {
            docs = self.apply_stage(docs, stage)?;
        }
        Ok(docs)
    }

    async fn find_one(&self, table: &str, filter: &Document) -> Result<Option<Document>, DbError> {
        let guard = self.collections.read();
        let Some(docs) = guard.get(table) else { return Ok(None) };
        let m = Matcher::new(filter);
        for d in docs {
            if m.matches(d)? {
                return Ok(Some(d.clone()));
            }
        }
        Ok(None)
    }

    async fn count(&self, table: &str, filter: &Document, options: CountOptions) -> Result<u64, DbError> {
        let n = self.count_matching(table, filter)?;
        let n = n.saturating_sub(options.skip.unwrap_or(0));
        Ok(match options.limit {
            Some(limit) if limit > 0 => n.min(limit),
            _ => n,
        })
    }

    async fn estimated_count(&self, table: &str) -> Result<u64, DbError> {
        Ok(self.collections.read().get(table).map_or(0, |d| d.len() as u64))
    }

    async fn insert_one(&self, table: &str, doc: Document) -> Result<Bson, DbError> {
        let mut ids = self.insert_many(table, vec![doc]).await?;
        ids.pop().ok_or_else(|| DbError::Execution("insert produced no id".into()))
    }

    async fn insert_many(&self, table: &str, docs: Vec<Document>) -> Result<Vec<Bson>, DbError> {
        let mut guard = self.collections.write();
        let existing = guard.entry(table.to_string()).or_default();
        let prepared: Vec<Document> = docs.into_iter().map(with_id).collect();
        let mut ids = Vec::with_capacity(prepared.len());
        for d in &prepared {
            let id = d.get(ID_KEY).cloned().unwrap_or(Bson::Null);
            if ids.contains(&id) || existing.iter().any(|e| e.get(ID_KEY) == Some(&id)) {
                return Err(DbError::Execution(format!("duplicate key {ID_KEY}: {id}")));
            }
            ids.push(id);
        }
        existing.extend(prepared);
        log::trace!("inserted {} document(s) into {table}", ids.len());
        Ok(ids)
    }

    async fn update_one(&self, table: &str, filter: &Document, update: &Document) -> Result<u64, DbError> {
        let mut guard = self.collections.write();
        let Some(docs) = guard.get_mut(table) else { return Ok(0) };
        let m = Matcher::new(filter);
        for d in docs.iter_mut() {
            if m.matches(d)? {
                let mut next = d.clone();
                apply_update(&mut next, update)?;
                *d = next;
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn delete_one(&self, table: &str, filter: &Document) -> Result<u64, DbError> {
        self.remove_matching(table, filter, Some(1))
    }

    async fn delete_many(&self, table: &str, filter: &Document) -> Result<u64, DbError> {
        self.remove_matching(table, filter, None)
    }

    async fn drop_collection(&self, table: &str) -> Result<(), DbError> {
        if self.collections.write().remove(table).is_some() {
            log::debug!("dropped collection {table}");
        }
        Ok(())
    }
}

impl MemoryStore {
    fn apply_stage(&self, docs: Vec<Document>, stage: &Document) -> Result<Vec<Document>, DbError> {
        let mut iter = stage.iter();
        let (Some((name, arg)), None) = (iter.next(), iter.next()) else {
            return Err(DbError::Execution("a pipeline stage must have exactly one field".into()));
        };
        match name.as_str() {
            "$match" => {
                let m = Matcher::new(stage_doc(name, arg)?);
                let mut out = Vec::with_capacity(docs.len());
                for d in docs {
                    if m.matches(&d)? {
                        out.push(d);
                    }
                }
                Ok(out)
            }
            "$sort" => sort_stage(docs, stage_doc(name, arg)?),
            "$skip" => Ok(docs.into_iter().skip(stage_count(name, arg)?).collect()),
            "$limit" => Ok(docs.into_iter().take(stage_count(name, arg)?).collect()),
            "$project" => {
                let spec = stage_doc(name, arg)?;
                docs.iter().map(|d| project(d, spec)).collect()
            }
            "$unwind" => unwind_stage(docs, arg),
            "$lookup" => self.lookup_stage(docs, stage_doc(name, arg)?),
            other => Err(DbError::Execution(format!("unsupported pipeline stage: {other}"))),
        }
    }

    fn lookup_stage(&self, docs: Vec<Document>, spec: &Document) -> Result<Vec<Document>, DbError> {
        let field = |k: &str| {
            spec.get_str(k).map_err(|_| DbError::Execution(format!("$lookup requires string field '{k}'")))
        };
        let (from, local, foreign, as_field) =
            (field("from")?, field("localField")?, field("foreignField")?, field("as")?);
        let others = self.snapshot(from);
        Ok(docs
            .into_iter()
            .map(|mut d| {
                let mut keys: Vec<Bson> = flatten(&lookup(&d, local));
                if keys.is_empty() {
                    keys.push(Bson::Null);
                }
                let joined: Vec<Bson> = others
                    .iter()
                    .filter(|o| {
                        let mut theirs = flatten(&lookup(o, foreign));
                        if theirs.is_empty() {
                            theirs.push(Bson::Null);
                        }
                        theirs.iter().any(|t| keys.iter().any(|k| compare_bson(k, t) == Ordering::Equal))
                    })
                    .cloned()
                    .map(Bson::Document)
                    .collect();
                d.insert(as_field, joined);
                d
            })
            .collect())
    }
}

fn with_id(doc: Document) -> Document {
    if doc.contains_key(ID_KEY) {
        return doc;
    }
    let mut out = Document::new();
    out.insert(ID_KEY, ObjectId::new());
    for (k, v) in doc {
        out.insert(k, v);
    }
    out
}

fn flatten(found: &[&Bson]) -> Vec<Bson> {
    let mut out = Vec::new();
    for v in found {
        match v {
            Bson::Array(items) => out.extend(items.iter().cloned()),
            other => out.push((*other).clone()),
        }
    }
    out
}

fn stage_doc<'a>(name: &str, arg: &'a Bson) -> Result<&'a Document, DbError> {
    match arg {
        Bson::Document(d) => Ok(d),
        _ => Err(DbError::Execution(format!("{name} requires an object"))),
    }
}

fn stage_count(name: &str, arg: &Bson) -> Result<usize, DbError> {
    let n = match arg {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(f) if f.fract() == 0.0 => *f as i64,
        _ => return Err(DbError::Execution(format!("{name} requires an integer"))),
    };
    usize::try_from(n).map_err(|_| DbError::Execution(format!("{name} must not be negative")))
}

fn direction(name: &str, v: &Bson) -> Result<bool, DbError> {
    let n = match v {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(f) => *f as i64,
        _ => 0,
    };
    match n {
        1 => Ok(true),
        -1 => Ok(false),
        _ => Err(DbError::Execution(format!("$sort direction for '{name}' must be 1 or -1"))),
    }
}

fn sort_stage(mut docs: Vec<Document>, spec: &Document) -> Result<Vec<Document>, DbError> {
    if spec.is_empty() {
        return Err(DbError::Execution("$sort needs at least one field".into()));
    }
    let keys = spec
        .iter()
        .map(|(k, v)| direction(k, v).map(|asc| (k.as_str(), asc)))
        .collect::<Result<Vec<_>, _>>()?;
    docs.sort_by(|a, b| {
        for (path, asc) in &keys {
            let ord = match (lookup(a, path).first(), lookup(b, path).first()) {
                (Some(x), Some(y)) => compare_bson(x, y),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return if *asc { ord } else { ord.reverse() };
            }
        }
        Ordering::Equal
    });
    Ok(docs)
}

fn unwind_stage(docs: Vec<Document>, arg: &Bson) -> Result<Vec<Document>, DbError> {
    let (path, preserve) = match arg {
        Bson::String(p) => (p.as_str(), false),
        Bson::Document(d) => (
            d.get_str("path").map_err(|_| DbError::Execution("$unwind requires a path".into()))?,
            d.get_bool("preserveNullAndEmptyArrays").unwrap_or(false),
        ),
        _ => return Err(DbError::Execution("$unwind requires a path".into())),
    };
    let Some(field) = path.strip_prefix('$') else {
        return Err(DbError::Execution("$unwind path must start with '$'".into()));
    };
    let mut out = Vec::new();
    for d in docs {
        match get_path(&d, field).cloned() {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = d.clone();
                    set_path(&mut copy, field, item)?;
                    out.push(copy);
                }
            }
            Some(Bson::Array(_)) => {
                if preserve {
                    let mut copy = d;
                    unset_path(&mut copy, field);
                    out.push(copy);
                }
            }
            None | Some(Bson::Null) => {
                if preserve {
                    out.push(d);
                }
            }
            Some(_) => out.push(d),
        }
    }
    Ok(out)
}

fn project(doc: &Document, spec: &Document) -> Result<Document, DbError> {
    let include = |v: &Bson| match v {
        Bson::Boolean(b) => Some(*b),
        Bson::Int32(i) => Some(*i != 0),
        Bson::Int64(i) => Some(*i != 0),
        Bson::Double(f) => Some(*f != 0.0),
        _ => None,
    };
    let inclusion = spec.iter().any(|(k, v)| k != ID_KEY && include(v) != Some(false));
    let keep_id = spec.get(ID_KEY).and_then(include).unwrap_or(true);

    if !inclusion {
        let mut out = doc.clone();
        for (k, _) in spec {
            unset_path(&mut out, k);
        }
        return Ok(out);
    }

    let mut out = Document::new();
    if keep_id && let Some(id) = doc.get(ID_KEY) {
        out.insert(ID_KEY, id.clone());
    }
    for (k, v) in spec {
        if k == ID_KEY {
            continue;
        }
        match (include(v), v) {
            (Some(true), _) => {
                if let Some(found) = get_path(doc, k) {
                    set_path(&mut out, k, found.clone())?;
                }
            }
            (Some(false), _) => {
                return Err(DbError::Execution(format!("cannot exclude '{k}' in an inclusion projection")));
            }
            (None, Bson::String(s)) if s.starts_with('$') => {
                if let Some(found) = get_path(doc, &s[1..]) {
                    set_path(&mut out, k, found.clone())?;
                }
            }
            (None, _) => {
                return Err(DbError::Execution(format!("unsupported projection for '{k}'")));
            }
        }
    }
    Ok(out)
}

fn apply_update(doc: &mut Document, update: &Document) -> Result<(), DbError> {
    if update.is_empty() {
        return Err(DbError::Execution("update document must not be empty".into()));
    }
    for (op, arg) in update {
        let fields = stage_doc(op, arg)?;
        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    if path == ID_KEY && doc.get(ID_KEY) != Some(value) {
                        return Err(DbError::Execution(format!("field {ID_KEY} is immutable")));
                    }
                    set_path(doc, path, value.clone())?;
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    unset_path(doc, path);
                }
            }
            other => return Err(DbError::Execution(format!("unsupported update operator: {other}"))),
        }
    }
    Ok(())
}

fn get_path<'a>(root: &'a Document, path: &str) -> Option<&'a Bson> {
    let (parents, last) = match path.rsplit_once('.') {
        Some((p, l)) => (Some(p), l),
        None => (None, path),
    };
    let mut cur = root;
    for seg in parents.into_iter().flat_map(|p| p.split('.')) {
        cur = cur.get_document(seg).ok()?;
    }
    cur.get(last)
}

fn parent_mut<'a>(root: &'a mut Document, path: &'a str) -> Result<(&'a mut Document, &'a str), DbError> {
    let mut segs: Vec<&str> = path.split('.').collect();
    let last = segs.pop().unwrap_or(path);
    let mut cur = root;
    for seg in segs {
        if !matches!(cur.get(seg), Some(Bson::Document(_))) {
            if cur.get(seg).is_some_and(|v| !matches!(v, Bson::Null)) {
                return Err(DbError::Execution(format!("cannot create field '{path}' inside a non-document")));
            }
            cur.insert(seg, Document::new());
        }
        cur = cur
            .get_document_mut(seg)
            .map_err(|e| DbError::Execution(format!("path '{path}': {e}")))?;
    }
    Ok((cur, last))
}

fn set_path(root: &mut Document, path: &str, value: Bson) -> Result<(), DbError> {
    let (parent, last) = parent_mut(root, path)?;
    parent.insert(last, value);
    Ok(())
}

fn unset_path(root: &mut Document, path: &str) {
    if let Ok((parent, last)) = parent_mut(root, path) {
        parent.remove(last);
    }
}
