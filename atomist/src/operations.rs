use mongodb::{
    bson::{self, Bson, Document, doc},
    error::{Error, Result},
};
use serde::ser::Error as _;
use std::{collections::BTreeMap, fmt::Display};

/// Update operators a modifier can contribute to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    Set,
    Unset,
    Inc,
    Push,
    PushAll,
    Pull,
    PullAll,
    AddToSet,
    Pop,
}

/// How a second field-map for the same operator is combined with the first one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergePolicy {
    /// The new field-map replaces the old one entirely.
    Replace,
    /// Values are added field by field; fields missing so far are inserted.
    SumPerField,
}

impl Operator {
    pub const ALL: [Self; 9] = [
        Self::Set,
        Self::Unset,
        Self::Inc,
        Self::Push,
        Self::PushAll,
        Self::Pull,
        Self::PullAll,
        Self::AddToSet,
        Self::Pop,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Set => "$set",
            Self::Unset => "$unset",
            Self::Inc => "$inc",
            Self::Push => "$push",
            Self::PushAll => "$pushAll",
            Self::Pull => "$pull",
            Self::PullAll => "$pullAll",
            Self::AddToSet => "$addToSet",
            Self::Pop => "$pop",
        }
    }

    pub const fn merge_policy(self) -> MergePolicy {
        match self {
            Self::Inc => MergePolicy::SumPerField,
            _ => MergePolicy::Replace,
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// End of an array removed by `$pop`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pop {
    First,
    Last,
}

impl From<Pop> for Bson {
    fn from(value: Pop) -> Self {
        match value {
            Pop::First => Bson::Int32(-1),
            Pop::Last => Bson::Int32(1),
        }
    }
}

/// Accumulated field-maps, at most one per [`Operator`].
///
/// Values that cannot be combined (a non-numeric increment, a failed coercion) do not
/// fail the call that supplied them. The failure is kept against its operator and
/// returned by [`to_document`](Operations::to_document), so it surfaces when the
/// update is executed. Replacing the operator's field-map discards it.
#[derive(Clone, Debug, Default)]
pub struct Operations {
    fields: BTreeMap<Operator, Document>,
    deferred: BTreeMap<Operator, Error>,
}

impl Operations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, operator: Operator, fields: Document) {
        match operator.merge_policy() {
            MergePolicy::Replace => {
                self.deferred.remove(&operator);
                self.fields.insert(operator, fields);
            }
            MergePolicy::SumPerField => {
                let existing = self.fields.entry(operator).or_default();

                for (field, delta) in fields {
                    let Some(current) = existing.get(&field) else {
                        if as_f64(&delta).is_none() {
                            let error = encoding_error(format!(
                                "cannot add {delta} to `{field}` in {operator}"
                            ));
                            self.deferred.entry(operator).or_insert(error);
                        }

                        existing.insert(field, delta);
                        continue;
                    };

                    match sum(current, &delta) {
                        Some(total) => {
                            existing.insert(field, total);
                        }
                        None => {
                            let error = encoding_error(format!(
                                "cannot add {delta} to {current} for `{field}` in {operator}"
                            ));
                            self.deferred.entry(operator).or_insert(error);
                        }
                    }
                }
            }
        }
    }

    /// Feeds the increment accumulator with the negated magnitude of every value,
    /// whatever sign it was given with.
    pub fn decrement(&mut self, fields: Document) {
        let mut negated = Document::new();
        let mut failure = None;

        for (field, value) in fields {
            match negative_magnitude(&value) {
                Some(value) => {
                    negated.insert(field, value);
                }
                None => {
                    if failure.is_none() {
                        failure = Some(encoding_error(format!(
                            "cannot decrement `{field}` by {value}"
                        )));
                    }
                    negated.insert(field, value);
                }
            }
        }

        if let Some(error) = failure {
            self.defer(Operator::Inc, error);
        }

        self.apply(Operator::Inc, negated);
    }

    /// Records a failure against `operator`. The first failure recorded wins.
    pub(crate) fn defer(&mut self, operator: Operator, error: Error) {
        self.deferred.entry(operator).or_insert(error);
    }

    pub fn get(&self, operator: Operator) -> Option<&Document> {
        self.fields.get(&operator)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Operator, &Document)> {
        self.fields.iter().map(|(operator, fields)| (*operator, fields))
    }

    /// True when no operator holds any field, i.e. the rendered update would be empty.
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(Document::is_empty)
    }

    /// Renders the update document.
    ///
    /// Every operator with at least one field becomes a top-level key. Fields given to
    /// `push_all` are rendered under `$push` with `$each`, as servers no longer accept
    /// `$pushAll`; a field pushed both singly and in bulk gets the single value first,
    /// or has the bulk values appended when it was already pushed with `$each`.
    pub fn to_document(&self) -> Result<Document> {
        if let Some(error) = self.deferred.values().next() {
            return Err(error.clone());
        }

        let mut document = Document::new();

        for (operator, fields) in &self.fields {
            if fields.is_empty() || *operator == Operator::PushAll {
                continue;
            }

            document.insert(operator.name(), fields.clone());
        }

        if let Some(bulk) = self
            .fields
            .get(&Operator::PushAll)
            .filter(|bulk| !bulk.is_empty())
        {
            let mut push = self
                .fields
                .get(&Operator::Push)
                .cloned()
                .unwrap_or_default();

            for (field, values) in bulk {
                let (mut each, modifiers) = split_each(push.remove(field));

                match values {
                    Bson::Array(values) => each.extend(values.iter().cloned()),
                    value => each.push(value.clone()),
                }

                let mut rendered = doc! { "$each": each };
                for (modifier, value) in modifiers {
                    rendered.insert(modifier, value);
                }
                push.insert(field, rendered);
            }

            document.insert(Operator::Push.name(), push);
        }

        Ok(document)
    }
}

/// Splits a `$push` value into the elements to push and the remaining push
/// modifiers (`$position`, `$slice`, `$sort`).
fn split_each(value: Option<Bson>) -> (Vec<Bson>, Document) {
    match value {
        Some(Bson::Document(mut modifiers)) if modifiers.get_array("$each").is_ok() => {
            let each = match modifiers.remove("$each") {
                Some(Bson::Array(each)) => each,
                _ => Vec::new(),
            };
            (each, modifiers)
        }
        single => (single.into_iter().collect(), Document::new()),
    }
}

fn encoding_error(message: String) -> Error {
    bson::ser::Error::custom(message).into()
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(value) => Some(i64::from(*value)),
        Bson::Int64(value) => Some(*value),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(value) => Some(f64::from(*value)),
        Bson::Int64(value) => Some(*value as f64),
        Bson::Double(value) => Some(*value),
        _ => None,
    }
}

/// Adds two BSON numbers, widening int32 to int64 and integers to double as needed.
#[allow(clippy::cast_precision_loss)]
fn sum(current: &Bson, delta: &Bson) -> Option<Bson> {
    let total = match (current, delta) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32),
        (Bson::Double(_), _) | (_, Bson::Double(_)) => {
            Bson::Double(as_f64(current)? + as_f64(delta)?)
        }
        _ => {
            let (a, b) = (as_i64(current)?, as_i64(delta)?);
            a.checked_add(b)
                .map_or_else(|| Bson::Double(a as f64 + b as f64), Bson::Int64)
        }
    };

    Some(total)
}

fn negative_magnitude(value: &Bson) -> Option<Bson> {
    match value {
        Bson::Int32(value) => {
            let negated = -i64::from(*value).abs();
            Some(i32::try_from(negated).map_or(Bson::Int64(negated), Bson::Int32))
        }
        Bson::Int64(value) => Some(Bson::Int64(value.checked_abs().map_or(i64::MIN, |m| -m))),
        Bson::Double(value) => Some(Bson::Double(-value.abs())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::error::ErrorKind;

    #[test]
    fn increments_sum_per_field() {
        let mut operations = Operations::new();

        operations.apply(Operator::Inc, doc! { "day": 1, "week": 2 });
        operations.apply(Operator::Inc, doc! { "week": 3, "month": 4 });

        assert_eq!(
            operations.get(Operator::Inc),
            Some(&doc! { "day": 1, "week": 5, "month": 4 })
        );
    }

    #[test]
    fn decrement_always_subtracts_magnitude() {
        let mut operations = Operations::new();

        operations.decrement(doc! { "a": 2, "b": -2, "c": 1.5, "d": 3_i64 });

        assert_eq!(
            operations.get(Operator::Inc),
            Some(&doc! { "a": -2, "b": -2, "c": -1.5, "d": -3_i64 })
        );
    }

    #[test]
    fn increment_then_decrement_nets_out() {
        let mut operations = Operations::new();

        operations.apply(Operator::Inc, doc! { "week": 3, "month": 2 });
        operations.decrement(doc! { "week": 2 });

        assert_eq!(
            operations.get(Operator::Inc),
            Some(&doc! { "week": 1, "month": 2 })
        );
    }

    #[test]
    fn order_of_increments_and_decrements_does_not_matter() {
        let mut forward = Operations::new();
        forward.decrement(doc! { "week": 5 });
        forward.apply(Operator::Inc, doc! { "week": 2 });
        forward.decrement(doc! { "week": -1 });

        let mut backward = Operations::new();
        backward.decrement(doc! { "week": -1 });
        backward.apply(Operator::Inc, doc! { "week": 2 });
        backward.decrement(doc! { "week": 5 });

        assert_eq!(forward.get(Operator::Inc), Some(&doc! { "week": -4 }));
        assert_eq!(forward.get(Operator::Inc), backward.get(Operator::Inc));
    }

    #[test]
    fn sums_widen_numeric_types() {
        let mut operations = Operations::new();

        operations.apply(
            Operator::Inc,
            doc! { "small": i32::MAX, "long": 1_i64, "float": 1 },
        );
        operations.apply(Operator::Inc, doc! { "small": 1, "long": 2, "float": 0.5 });

        assert_eq!(
            operations.get(Operator::Inc),
            Some(&doc! {
                "small": i64::from(i32::MAX) + 1,
                "long": 3_i64,
                "float": 1.5,
            })
        );
    }

    #[test]
    fn decrementing_minimum_values_does_not_overflow() {
        let mut operations = Operations::new();

        operations.decrement(doc! { "a": i32::MIN, "b": i64::MIN });

        assert_eq!(
            operations.get(Operator::Inc),
            Some(&doc! { "a": i32::MIN, "b": i64::MIN })
        );
    }

    #[test]
    fn non_increment_operators_replace() {
        let mut operations = Operations::new();

        operations.apply(Operator::Set, doc! { "title": "Home", "draft": true });
        operations.apply(Operator::Set, doc! { "title": "About" });
        operations.apply(Operator::Push, doc! { "tags": "foo" });
        operations.apply(Operator::Push, doc! { "links": "bar" });

        assert_eq!(
            operations.to_document().unwrap(),
            doc! {
                "$set": { "title": "About" },
                "$push": { "links": "bar" },
            }
        );
    }

    #[test]
    fn push_all_renders_as_each() {
        let mut operations = Operations::new();

        operations.apply(Operator::Push, doc! { "tags": "first", "links": "a" });
        operations.apply(Operator::PushAll, doc! { "tags": ["foo", "bar"], "ids": [1, 2] });

        assert_eq!(
            operations.to_document().unwrap(),
            doc! {
                "$push": {
                    "tags": { "$each": ["first", "foo", "bar"] },
                    "links": "a",
                    "ids": { "$each": [1, 2] },
                }
            }
        );
    }

    #[test]
    fn push_all_extends_an_existing_each() {
        let mut operations = Operations::new();

        operations.apply(
            Operator::Push,
            doc! { "tags": { "$each": ["a"], "$slice": -5 }, "links": { "url": "x" } },
        );
        operations.apply(Operator::PushAll, doc! { "tags": ["b"], "links": ["y"] });

        assert_eq!(
            operations.to_document().unwrap(),
            doc! {
                "$push": {
                    "tags": { "$each": ["a", "b"], "$slice": -5 },
                    "links": { "$each": [{ "url": "x" }, "y"] },
                }
            }
        );
    }

    #[test]
    fn pop_markers() {
        let mut operations = Operations::new();

        operations.apply(Operator::Pop, doc! { "tags": Pop::Last, "links": Pop::First });

        assert_eq!(
            operations.to_document().unwrap(),
            doc! { "$pop": { "tags": 1, "links": -1 } }
        );
    }

    #[test]
    fn empty_field_maps_render_nothing() {
        let mut operations = Operations::new();
        assert!(operations.is_empty());

        operations.apply(Operator::Unset, Document::new());

        assert!(operations.is_empty());
        assert_eq!(operations.to_document().unwrap(), Document::new());
    }

    #[test]
    fn non_numeric_increment_fails_on_render() {
        let mut operations = Operations::new();

        operations.apply(Operator::Inc, doc! { "views": 1 });
        operations.apply(Operator::Inc, doc! { "views": "many" });

        let error = operations.to_document().unwrap_err();
        assert!(matches!(*error.kind, ErrorKind::BsonSerialization(_)));
    }

    #[test]
    fn first_non_numeric_increment_fails_on_render() {
        let mut operations = Operations::new();

        operations.apply(Operator::Inc, doc! { "views": 1, "count": "many" });

        assert_eq!(
            operations.get(Operator::Inc),
            Some(&doc! { "views": 1, "count": "many" })
        );
        let error = operations.to_document().unwrap_err();
        assert!(matches!(*error.kind, ErrorKind::BsonSerialization(_)));
    }

    #[test]
    fn non_numeric_decrement_fails_on_render() {
        let mut operations = Operations::new();

        operations.decrement(doc! { "views": "many" });

        assert!(operations.to_document().is_err());
    }

    #[test]
    fn replacing_an_operator_discards_its_failure() {
        let mut operations = Operations::new();

        operations.defer(Operator::Set, encoding_error("boom".into()));
        assert!(operations.to_document().is_err());

        operations.apply(Operator::Set, doc! { "title": "Home" });

        assert_eq!(
            operations.to_document().unwrap(),
            doc! { "$set": { "title": "Home" } }
        );
    }

    #[test]
    fn operator_names_and_policies() {
        let names = Operator::ALL.map(Operator::name);

        assert_eq!(
            names,
            [
                "$set", "$unset", "$inc", "$push", "$pushAll", "$pull", "$pullAll",
                "$addToSet", "$pop"
            ]
        );

        for operator in Operator::ALL {
            let expected = if operator == Operator::Inc {
                MergePolicy::SumPerField
            } else {
                MergePolicy::Replace
            };
            assert_eq!(operator.merge_policy(), expected);
        }
    }
}
