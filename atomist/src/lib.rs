//! Atomist builds atomic `MongoDB` modifier updates for your entities.
//!
//! ## Example
//!
//! ```ignore
//! // Define an entity
//! #[derive(Serialize, Deserialize, Entity)]
//! struct Page {
//!   #[serde(rename = "_id")]
//!   id: ObjectId,
//!   title: String,
//!   day_count: i64,
//!   week_count: i64,
//!   tags: Vec<String>,
//! }
//!
//! // Accumulate several modifiers and send them as one multi-document update
//! Page::atomic()
//!   .filter(doc! { "title": "Home" })
//!   .increment(doc! { "day_count": 1, "week_count": 1 })
//!   .add_to_set(doc! { "tags": "popular" })
//!   .execute(mongo.rb())
//!   .await?;
//!
//! // The same update, scoped to a closure that executes it when it returns
//! Page::atomic()
//!   .filter_with(page::filter! { title: "Home" }, mongo.rb(), |page| {
//!     page.increment(doc! { "day_count": 1, "week_count": 1 });
//!     page.add_to_set(doc! { "tags": "popular" });
//!   })
//!   .await?;
//!
//! // One modifier, sent right away, for a list of ids
//! Page::decrement_where(mongo.rb(), vec![first_id, second_id], doc! { "week_count": 2 }).await?;
//!
//! // One modifier for the document behind an instance
//! page.pop(mongo.rb(), doc! { "tags": Pop::Last }).await?;
//! ```
//!
//! See [`guides`] module to learn more!

#![warn(clippy::pedantic)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

use futures_util::future::BoxFuture;
use mongodb::{
    ClientSession, Database,
    bson::{self, Bson, Document, doc},
    error::Result,
};
use serde::Serialize;

pub use atomist_macros::{Entity, construct_filter};
pub use mongodb;

pub mod atomic;
pub mod criteria;
pub mod guides;
pub mod operations;
pub mod store;
pub mod types;

pub use atomic::Atomic;
pub use criteria::{Criteria, ID_FIELD, Selection};
pub use operations::{MergePolicy, Operations, Operator, Pop};
pub use store::{Store, UpdateOutcome};
pub use types::{Identifier, ObjectId};

pub trait Entity: Sized + Send + 'static {
    type Id: Identifier + Copy + Send + 'static;

    const COLLECTION_NAME: &'static str;

    fn id(&self) -> Self::Id;

    /// Whether `field` is a field of this entity, by its BSON name.
    fn has_field(field: &str) -> bool;

    /// Converts a raw value into the type declared for `field`. Values for unknown
    /// fields are returned unchanged.
    fn coerce(field: &str, value: Bson) -> Result<Bson>;

    fn atomic() -> Atomic<Self> {
        Atomic::new()
    }

    fn increment_where<'a>(
        store: impl Store<'a>,
        criteria: impl Into<Criteria>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::atomic().filter_with(criteria, store, |atomic| {
            atomic.increment(fields);
        })
    }

    fn decrement_where<'a>(
        store: impl Store<'a>,
        criteria: impl Into<Criteria>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::atomic().filter_with(criteria, store, |atomic| {
            atomic.decrement(fields);
        })
    }

    fn set_where<'a>(
        store: impl Store<'a>,
        criteria: impl Into<Criteria>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::atomic().filter_with(criteria, store, |atomic| {
            atomic.set(fields);
        })
    }

    fn unset_where<'a, F: Into<String>>(
        store: impl Store<'a>,
        criteria: impl Into<Criteria>,
        fields: impl IntoIterator<Item = F>,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::atomic().filter_with(criteria, store, |atomic| {
            atomic.unset(fields);
        })
    }

    fn push_where<'a>(
        store: impl Store<'a>,
        criteria: impl Into<Criteria>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::atomic().filter_with(criteria, store, |atomic| {
            atomic.push(fields);
        })
    }

    fn push_all_where<'a>(
        store: impl Store<'a>,
        criteria: impl Into<Criteria>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::atomic().filter_with(criteria, store, |atomic| {
            atomic.push_all(fields);
        })
    }

    fn pull_where<'a>(
        store: impl Store<'a>,
        criteria: impl Into<Criteria>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::atomic().filter_with(criteria, store, |atomic| {
            atomic.pull(fields);
        })
    }

    fn pull_all_where<'a>(
        store: impl Store<'a>,
        criteria: impl Into<Criteria>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::atomic().filter_with(criteria, store, |atomic| {
            atomic.pull_all(fields);
        })
    }

    #[doc(alias = "push_uniq_where")]
    fn add_to_set_where<'a>(
        store: impl Store<'a>,
        criteria: impl Into<Criteria>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::atomic().filter_with(criteria, store, |atomic| {
            atomic.add_to_set(fields);
        })
    }

    fn pop_where<'a>(
        store: impl Store<'a>,
        criteria: impl Into<Criteria>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::atomic().filter_with(criteria, store, |atomic| {
            atomic.pop(fields);
        })
    }

    /// Criteria matching the document this instance was loaded from.
    fn criteria(&self) -> Criteria {
        Criteria::Id(self.id().into())
    }

    fn increment<'a>(
        &self,
        store: impl Store<'a>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::increment_where(store, self.criteria(), fields)
    }

    fn decrement<'a>(
        &self,
        store: impl Store<'a>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::decrement_where(store, self.criteria(), fields)
    }

    fn set<'a>(
        &self,
        store: impl Store<'a>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::set_where(store, self.criteria(), fields)
    }

    fn unset<'a, F: Into<String>>(
        &self,
        store: impl Store<'a>,
        fields: impl IntoIterator<Item = F>,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::unset_where(store, self.criteria(), fields)
    }

    fn push<'a>(
        &self,
        store: impl Store<'a>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::push_where(store, self.criteria(), fields)
    }

    fn push_all<'a>(
        &self,
        store: impl Store<'a>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::push_all_where(store, self.criteria(), fields)
    }

    fn pull<'a>(
        &self,
        store: impl Store<'a>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::pull_where(store, self.criteria(), fields)
    }

    fn pull_all<'a>(
        &self,
        store: impl Store<'a>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::pull_all_where(store, self.criteria(), fields)
    }

    #[doc(alias = "push_uniq")]
    fn add_to_set<'a>(
        &self,
        store: impl Store<'a>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::add_to_set_where(store, self.criteria(), fields)
    }

    fn pop<'a>(
        &self,
        store: impl Store<'a>,
        fields: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Self::pop_where(store, self.criteria(), fields)
    }
}

#[derive(Debug)]
pub struct Mongo<'a> {
    pub db: &'a Database,
    pub session: Option<&'a mut ClientSession>,
}

impl<'a> Mongo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db, session: None }
    }

    pub fn new_with_session(db: &'a Database, session: &'a mut ClientSession) -> Self {
        Self {
            db,
            session: Some(session),
        }
    }

    pub fn rb(&mut self) -> Mongo<'_> {
        Mongo {
            db: self.db,
            session: self.session.as_deref_mut(),
        }
    }
}

impl<'a> From<&'a Database> for Mongo<'a> {
    fn from(value: &'a Database) -> Self {
        Self::new(value)
    }
}

impl<'a> From<(&'a Database, &'a mut ClientSession)> for Mongo<'a> {
    fn from(value: (&'a Database, &'a mut ClientSession)) -> Self {
        Self::new_with_session(value.0, value.1)
    }
}

#[macro_export]
macro_rules! with_session {
    ($query: expr, $session: expr) => {
        match $session {
            Some(session) => $query.session(session),
            None => $query,
        }
    };
}

pub trait Filter<E>: Send {
    fn to_document(&self) -> Document;
}

#[derive(Debug)]
pub enum FilterOperator<'a, T: Serialize + ?Sized> {
    Eq(&'a T),
    Ne(&'a T),
    Gt(&'a T),
    Gte(&'a T),
    Lt(&'a T),
    Lte(&'a T),
    In(&'a [&'a T]),
    Nin(&'a [&'a T]),
    Exists(bool),
}

impl<T: Serialize + ?Sized> FilterOperator<'_, T> {
    /// # Panics
    ///
    /// Panics if the operand cannot be represented as BSON.
    pub fn to_document(&self) -> Document {
        fn to_bson<T: Serialize + ?Sized>(val: &T) -> Bson {
            bson::to_bson(val).expect("filter operand must serialize to BSON")
        }

        let (operator, bson) = match self {
            Self::Eq(val) => ("$eq", to_bson(*val)),
            Self::Ne(val) => ("$ne", to_bson(*val)),
            Self::Gt(val) => ("$gt", to_bson(*val)),
            Self::Gte(val) => ("$gte", to_bson(*val)),
            Self::Lt(val) => ("$lt", to_bson(*val)),
            Self::Lte(val) => ("$lte", to_bson(*val)),
            Self::In(vals) => ("$in", to_bson(*vals)),
            Self::Nin(vals) => ("$nin", to_bson(*vals)),
            Self::Exists(exists) => ("$exists", Bson::Boolean(*exists)),
        };

        doc! { operator: bson }
    }
}

#[derive(Debug)]
pub enum Field<T> {
    Set(T),
    Omit,
}

impl<T> Field<T> {
    pub fn from_opt(opt: Option<T>) -> Self {
        match opt {
            Some(val) => Self::Set(val),
            None => Self::Omit,
        }
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Omit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_operators_render_as_comparisons() {
        assert_eq!(FilterOperator::Eq("Home").to_document(), doc! { "$eq": "Home" });
        assert_eq!(FilterOperator::Gte(&3).to_document(), doc! { "$gte": 3 });
        assert_eq!(
            FilterOperator::In(&[&1, &2]).to_document(),
            doc! { "$in": [1, 2] }
        );
        assert_eq!(
            FilterOperator::<str>::Exists(false).to_document(),
            doc! { "$exists": false }
        );
    }

    #[test]
    fn field_from_opt() {
        assert!(matches!(Field::from_opt(Some(1)), Field::Set(1)));
        assert!(matches!(Field::<i32>::from_opt(None), Field::Omit));
    }
}
