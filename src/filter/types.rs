use bson::Bson;
use chrono::{DateTime, Utc};

/// Closed set of filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    And,
    Or,
    Not,
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Between,
    BetweenEq,
    Range,
    RangeEq,
    StartsWith,
    EndsWith,
    Contains,
    Exists,
    ElemMatch,
    Sort,
}

impl Op {
    /// Wire symbol. The custom range/pattern symbols never reach a compiled document.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::And => "$and",
            Self::Or => "$or",
            Self::Not => "$not",
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
            Self::Nin => "$nin",
            Self::Between => "between",
            Self::BetweenEq => "betweenEq",
            Self::Range => "$range",
            Self::RangeEq => "rangeEq",
            Self::StartsWith => "$startwith",
            Self::EndsWith => "$endwith",
            Self::Contains => "$contains",
            Self::Exists => "$exists",
            Self::ElemMatch => "$elemMatch",
            Self::Sort => "$sort",
        }
    }

    #[must_use]
    pub const fn is_combinator(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Not)
    }
}

/// Lower/upper bound pair of a range-like operator. Only these shapes are supported.
#[derive(Debug, Clone, PartialEq)]
pub enum Bounds {
    Int32(i32, i32),
    Int64(i64, i64),
    DateTime(bson::DateTime, bson::DateTime),
}

impl Bounds {
    #[must_use]
    pub fn lower(&self) -> Bson {
        match self {
            Self::Int32(lo, _) => Bson::Int32(*lo),
            Self::Int64(lo, _) => Bson::Int64(*lo),
            Self::DateTime(lo, _) => Bson::DateTime(*lo),
        }
    }

    #[must_use]
    pub fn upper(&self) -> Bson {
        match self {
            Self::Int32(_, hi) => Bson::Int32(*hi),
            Self::Int64(_, hi) => Bson::Int64(*hi),
            Self::DateTime(_, hi) => Bson::DateTime(*hi),
        }
    }
}

/// A value that can bound a `Between`/`Range` filter. Both bounds share one type.
pub trait RangeBound {
    fn bounds(lower: Self, upper: Self) -> Bounds;
}

impl RangeBound for i32 {
    fn bounds(lower: Self, upper: Self) -> Bounds {
        Bounds::Int32(lower, upper)
    }
}

impl RangeBound for i64 {
    fn bounds(lower: Self, upper: Self) -> Bounds {
        Bounds::Int64(lower, upper)
    }
}

impl RangeBound for bson::DateTime {
    fn bounds(lower: Self, upper: Self) -> Bounds {
        Bounds::DateTime(lower, upper)
    }
}

impl RangeBound for DateTime<Utc> {
    fn bounds(lower: Self, upper: Self) -> Bounds {
        Bounds::DateTime(
            bson::DateTime::from_millis(lower.timestamp_millis()),
            bson::DateTime::from_millis(upper.timestamp_millis()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum FilterValue {
    #[default]
    None,
    Scalar(Bson),
    List(Vec<Bson>),
    Pair(Bounds),
    Patterns(Vec<String>),
    Nested(Box<Filter>),
}

/// One node of a filter tree. Leaves carry `field` and `value`; `And`/`Or`/`Not` carry `items`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub items: Vec<Filter>,
    pub field: String,
    pub op: Op,
    pub value: FilterValue,
}

impl Filter {
    fn leaf(field: impl Into<String>, op: Op, value: FilterValue) -> Self {
        Self { items: Vec::new(), field: field.into(), op, value }
    }

    fn combinator(op: Op, items: Vec<Self>) -> Self {
        Self { items, field: String::new(), op, value: FilterValue::None }
    }

    pub fn and(items: impl IntoIterator<Item = Self>) -> Self {
        Self::combinator(Op::And, items.into_iter().collect())
    }

    pub fn or(items: impl IntoIterator<Item = Self>) -> Self {
        Self::combinator(Op::Or, items.into_iter().collect())
    }

    #[must_use]
    pub fn not(item: Self) -> Self {
        Self::combinator(Op::Not, vec![item])
    }

    /// True when a `Not` node appears anywhere in the tree, `$elemMatch` sub-filters included.
    #[must_use]
    pub fn has_negation(&self) -> bool {
        self.op == Op::Not
            || self.items.iter().any(Self::has_negation)
            || matches!(&self.value, FilterValue::Nested(inner) if inner.has_negation())
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(field, Op::Eq, FilterValue::Scalar(value.into()))
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(field, Op::Ne, FilterValue::Scalar(value.into()))
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(field, Op::Gt, FilterValue::Scalar(value.into()))
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(field, Op::Gte, FilterValue::Scalar(value.into()))
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(field, Op::Lt, FilterValue::Scalar(value.into()))
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(field, Op::Lte, FilterValue::Scalar(value.into()))
    }

    pub fn is_in<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self::leaf(field, Op::In, FilterValue::List(values))
    }

    pub fn not_in<V: Into<Bson>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self::leaf(field, Op::Nin, FilterValue::List(values))
    }

    /// `lower < field < upper`
    pub fn between<B: RangeBound>(field: impl Into<String>, lower: B, upper: B) -> Self {
        Self::leaf(field, Op::Between, FilterValue::Pair(B::bounds(lower, upper)))
    }

    /// `lower <= field <= upper`
    pub fn between_eq<B: RangeBound>(field: impl Into<String>, lower: B, upper: B) -> Self {
        Self::leaf(field, Op::BetweenEq, FilterValue::Pair(B::bounds(lower, upper)))
    }

    pub fn range<B: RangeBound>(field: impl Into<String>, from: B, to: B) -> Self {
        Self::leaf(field, Op::Range, FilterValue::Pair(B::bounds(from, to)))
    }

    pub fn range_eq<B: RangeBound>(field: impl Into<String>, from: B, to: B) -> Self {
        Self::leaf(field, Op::RangeEq, FilterValue::Pair(B::bounds(from, to)))
    }

    pub fn starts_with(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::leaf(field, Op::StartsWith, FilterValue::Scalar(Bson::String(prefix.into())))
    }

    pub fn ends_with(field: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self::leaf(field, Op::EndsWith, FilterValue::Scalar(Bson::String(suffix.into())))
    }

    /// Case-insensitive substring match; several substrings are OR'd.
    pub fn contains<S: Into<String>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self::leaf(field, Op::Contains, FilterValue::Patterns(values))
    }

    pub fn exists(field: impl Into<String>, exists: bool) -> Self {
        Self::leaf(field, Op::Exists, FilterValue::Scalar(Bson::Boolean(exists)))
    }

    pub fn elem_match(field: impl Into<String>, filter: Self) -> Self {
        Self::leaf(field, Op::ElemMatch, FilterValue::Nested(Box::new(filter)))
    }

    /// `direction` is `"asc"` (any case) for ascending; anything else sorts descending.
    pub fn sort(field: impl Into<String>, direction: &str) -> Self {
        let dir = crate::set::SortDirection::parse(direction);
        Self::leaf(field, Op::Sort, FilterValue::Scalar(Bson::Int32(dir.as_i32())))
    }
}
