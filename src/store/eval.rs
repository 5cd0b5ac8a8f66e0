use bson::{Bson, Document};
use regex::{Regex, RegexBuilder};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::errors::DbError;

// Safety limits to prevent resource abuse
const MAX_PATH_DEPTH: usize = 32;
const MAX_IN_SET: usize = 1000;

/// Evaluate a `$match`-style query document against one document.
///
/// # Errors
/// Returns `DbError::Execution` for unknown operators, malformed operands or invalid regexes.
pub fn matches(doc: &Document, query: &Document) -> Result<bool, DbError> {
    Matcher::new(query).matches(doc)
}

/// A query document bound for repeated evaluation. Regexes are compiled on first use and
/// reused for every later document.
#[derive(Debug)]
pub struct Matcher<'q> {
    query: &'q Document,
    // pattern -> options -> compiled
    regexes: RefCell<HashMap<String, HashMap<String, Regex>>>,
}

impl<'q> Matcher<'q> {
    #[must_use]
    pub fn new(query: &'q Document) -> Self {
        Self { query, regexes: RefCell::new(HashMap::new()) }
    }

    /// # Errors
    /// As for [`matches`].
    pub fn matches(&self, doc: &Document) -> Result<bool, DbError> {
        self.query_matches(doc, self.query)
    }

    fn regex(&self, pattern: &str, options: &str) -> Result<Regex, DbError> {
        if let Some(r) = self.regexes.borrow().get(pattern).and_then(|m| m.get(options)) {
            return Ok(r.clone());
        }
        let r = build_regex(pattern, options)?;
        self.regexes
            .borrow_mut()
            .entry(pattern.to_string())
            .or_default()
            .insert(options.to_string(), r.clone());
        Ok(r)
    }

    fn query_matches(&self, doc: &Document, query: &Document) -> Result<bool, DbError> {
        for (key, cond) in query {
            let ok = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for q in clauses(key, cond)? {
                        if !self.query_matches(doc, q)? {
                            all = false;
                            break;
                        }
                    }
                    all
                }
                "$or" => self.any_clause(doc, key, cond)?,
                "$nor" => !self.any_clause(doc, key, cond)?,
                k if k.starts_with('$') => {
                    return Err(DbError::Execution(format!("unknown top level operator: {k}")));
                }
                path => self.field_matches(doc, path, cond)?,
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn any_clause(&self, doc: &Document, key: &str, cond: &Bson) -> Result<bool, DbError> {
        for q in clauses(key, cond)? {
            if self.query_matches(doc, q)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn field_matches(&self, doc: &Document, path: &str, cond: &Bson) -> Result<bool, DbError> {
        let found = lookup(doc, path);
        match cond {
            Bson::Document(ops) if is_operator_doc(cond) => self.apply_ops(&found, ops),
            Bson::RegularExpression(re) => {
                let r = self.regex(re.pattern.as_str(), re.options.as_str())?;
                Ok(any_string_match(&found, &r))
            }
            literal => Ok(eq_any(&found, literal)),
        }
    }

    fn apply_ops(&self, found: &[&Bson], ops: &Document) -> Result<bool, DbError> {
        for (op, operand) in ops {
            let ok = match op.as_str() {
                "$eq" => eq_any(found, operand),
                "$ne" => !eq_any(found, operand),
                "$gt" => cmp_any(found, operand, |o| o == Ordering::Greater),
                "$gte" => cmp_any(found, operand, |o| o != Ordering::Less),
                "$lt" => cmp_any(found, operand, |o| o == Ordering::Less),
                "$lte" => cmp_any(found, operand, |o| o != Ordering::Greater),
                "$in" => in_set(found, op, operand)?,
                "$nin" => !in_set(found, op, operand)?,
                "$exists" => !found.is_empty() == truthy(operand),
                "$regex" => {
                    let options = ops.get_str("$options").unwrap_or("");
                    let r = match operand {
                        Bson::String(p) => self.regex(p, options)?,
                        Bson::RegularExpression(re) => self.regex(re.pattern.as_str(), re.options.as_str())?,
                        _ => return Err(DbError::Execution("$regex has to be a string".into())),
                    };
                    any_string_match(found, &r)
                }
                "$options" => true,
                "$elemMatch" => self.elem_match(found, operand)?,
                "$not" => match operand {
                    Bson::Document(inner) => !self.apply_ops(found, inner)?,
                    Bson::RegularExpression(re) => {
                        let r = self.regex(re.pattern.as_str(), re.options.as_str())?;
                        !any_string_match(found, &r)
                    }
                    _ => return Err(DbError::Execution("$not needs a regex or a document".into())),
                },
                other => return Err(DbError::Execution(format!("unknown operator: {other}"))),
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn elem_match(&self, found: &[&Bson], operand: &Bson) -> Result<bool, DbError> {
        let Bson::Document(q) = operand else {
            return Err(DbError::Execution("$elemMatch needs an object".into()));
        };
        let value_query = is_operator_doc(operand)
            && !q.keys().any(|k| matches!(k.as_str(), "$and" | "$or" | "$nor"));
        for v in found {
            let Bson::Array(items) = v else { continue };
            for item in items {
                let hit = if value_query {
                    self.apply_ops(&[item], q)?
                } else if let Bson::Document(d) = item {
                    self.query_matches(d, q)?
                } else {
                    false
                };
                if hit {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

fn clauses<'a>(key: &str, cond: &'a Bson) -> Result<Vec<&'a Document>, DbError> {
    let Bson::Array(items) = cond else {
        return Err(DbError::Execution(format!("{key} must be an array")));
    };
    if items.is_empty() {
        return Err(DbError::Execution(format!("{key} must be a nonempty array")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => Ok(d),
            _ => Err(DbError::Execution(format!("{key} entries must be documents"))),
        })
        .collect()
}

fn is_operator_doc(cond: &Bson) -> bool {
    matches!(cond, Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')))
}

/// All values reachable at `path`, descending into arrays of documents on the way.
pub(crate) fn lookup<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut parts = path.split('.');
    let Some(first) = parts.next() else { return Vec::new() };
    let mut current: Vec<&Bson> = doc.get(first).into_iter().collect();
    for (depth, part) in parts.enumerate() {
        if depth + 1 >= MAX_PATH_DEPTH || current.is_empty() {
            return Vec::new();
        }
        let mut next = Vec::new();
        for v in current {
            match v {
                Bson::Document(d) => next.extend(d.get(part)),
                Bson::Array(items) => {
                    for item in items {
                        if let Bson::Document(d) = item {
                            next.extend(d.get(part));
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

/// Values plus, for arrays, their elements.
fn candidates<'a>(found: &'a [&'a Bson]) -> impl Iterator<Item = &'a Bson> + 'a {
    found.iter().flat_map(|v| {
        let elems: &[Bson] = match v {
            Bson::Array(items) => items.as_slice(),
            _ => &[],
        };
        std::iter::once(*v).chain(elems.iter())
    })
}

fn any_string_match(found: &[&Bson], r: &Regex) -> bool {
    candidates(found).any(|v| matches!(v, Bson::String(s) if r.is_match(s)))
}

fn eq_any(found: &[&Bson], value: &Bson) -> bool {
    if found.is_empty() {
        return matches!(value, Bson::Null);
    }
    candidates(found).any(|v| bson_eq(v, value))
}

fn in_set(found: &[&Bson], op: &str, operand: &Bson) -> Result<bool, DbError> {
    let Bson::Array(set) = operand else {
        return Err(DbError::Execution(format!("{op} needs an array")));
    };
    Ok(set.iter().take(MAX_IN_SET).any(|x| eq_any(found, x)))
}

fn cmp_any(found: &[&Bson], operand: &Bson, want: impl Fn(Ordering) -> bool) -> bool {
    candidates(found).any(|v| comparable(v, operand) && want(compare_bson(v, operand)))
}

fn build_regex(pattern: &str, options: &str) -> Result<Regex, DbError> {
    let mut re = RegexBuilder::new(pattern);
    re.case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'));
    re.build().map_err(|e| DbError::Execution(format!("invalid regex: {e}")))
}

fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        _ => true,
    }
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64_num(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        Bson::Decimal128(d) => d.to_string().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return as_f64_num(a) == as_f64_num(b);
    }
    a == b
}

/// Range operators only compare numbers with numbers and otherwise like with like.
fn comparable(a: &Bson, b: &Bson) -> bool {
    (is_num(a) && is_num(b)) || std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Total order used for sorting and range comparison.
#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        return as_f64_num(a).total_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            (x.time, x.increment).cmp(&(y.time, y.increment))
        }
        (Bson::Array(x), Bson::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let o = compare_bson(l, r);
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

const fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::Symbol(_) | Bson::String(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) => 13,
        Bson::JavaScriptCodeWithScope(_) => 14,
        Bson::MaxKey => 255,
    }
}
