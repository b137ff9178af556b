//! Accumulating modifier updates.
//!
//! An [`Atomic`] collects modifiers against one set of criteria and sends them to the
//! store as a single multi-document update. It can be driven in two ways that produce
//! the same update document for the same modifier calls:
//!
//! - fluently, with [`filter`](Atomic::filter), any number of modifiers, and an explicit
//!   [`execute`](Atomic::execute);
//! - scoped, with [`filter_with`](Atomic::filter_with), which hands the builder to a
//!   closure and executes once the closure returns.

use crate::{
    Entity,
    criteria::{Criteria, Selection},
    operations::{Operations, Operator},
    store::{Store, UpdateOutcome},
};
use futures_util::{FutureExt, future::BoxFuture};
use mongodb::{
    bson::{Bson, Document},
    error::Result,
};
use std::{fmt, marker::PhantomData};

pub struct Atomic<E> {
    selection: Selection,
    operations: Operations,
    entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Atomic<E> {
    pub fn new() -> Self {
        Self {
            selection: Selection::default(),
            operations: Operations::new(),
            entity: PhantomData,
        }
    }

    /// Replaces the criteria of this update.
    pub fn filter(mut self, criteria: impl Into<Criteria>) -> Self {
        self.selection = criteria.into().normalize::<E::Id>();
        self
    }

    /// Sets the criteria, lets `block` add modifiers, then executes the update once.
    pub fn filter_with<'a>(
        self,
        criteria: impl Into<Criteria>,
        store: impl Store<'a>,
        block: impl FnOnce(&mut Self),
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        let mut atomic = self.filter(criteria);
        block(&mut atomic);
        atomic.execute(store)
    }

    pub fn selector(&self) -> &Document {
        &self.selection.selector
    }

    /// Candidates dropped from an id list while normalizing the criteria.
    pub fn rejected(&self) -> &[Bson] {
        &self.selection.rejected
    }

    pub fn operations(&self) -> &Operations {
        &self.operations
    }

    /// The update document [`execute`](Atomic::execute) would send.
    pub fn to_document(&self) -> Result<Document> {
        self.operations.to_document()
    }

    /// Adds to numeric fields. Repeated calls add up per field.
    pub fn increment(&mut self, fields: Document) -> &mut Self {
        self.operations.apply(Operator::Inc, fields);
        self
    }

    /// Subtracts the magnitude of each value, so `{ count: 2 }` and `{ count: -2 }`
    /// both subtract two. Shares its accumulator with [`increment`](Atomic::increment).
    pub fn decrement(&mut self, fields: Document) -> &mut Self {
        self.operations.decrement(fields);
        self
    }

    /// Sets fields, coercing values of declared fields to their declared type.
    ///
    /// A value that cannot be coerced does not fail here; the update fails with the
    /// conversion error when executed.
    pub fn set(&mut self, fields: Document) -> &mut Self {
        let mut coerced = Document::new();
        let mut failure = None;

        for (field, value) in fields {
            if !E::has_field(&field) {
                coerced.insert(field, value);
                continue;
            }

            match E::coerce(&field, value.clone()) {
                Ok(value) => {
                    coerced.insert(field, value);
                }
                Err(error) => {
                    if failure.is_none() {
                        failure = Some(error);
                    }
                    coerced.insert(field, value);
                }
            }
        }

        self.operations.apply(Operator::Set, coerced);

        if let Some(error) = failure {
            self.operations.defer(Operator::Set, error);
        }

        self
    }

    pub fn unset<F: Into<String>>(&mut self, fields: impl IntoIterator<Item = F>) -> &mut Self {
        let fields = fields
            .into_iter()
            .map(|field| (field.into(), Bson::Int32(1)))
            .collect();

        self.operations.apply(Operator::Unset, fields);
        self
    }

    pub fn push(&mut self, fields: Document) -> &mut Self {
        self.operations.apply(Operator::Push, fields);
        self
    }

    /// Appends every element of each array value.
    pub fn push_all(&mut self, fields: Document) -> &mut Self {
        self.operations.apply(Operator::PushAll, fields);
        self
    }

    pub fn pull(&mut self, fields: Document) -> &mut Self {
        self.operations.apply(Operator::Pull, fields);
        self
    }

    pub fn pull_all(&mut self, fields: Document) -> &mut Self {
        self.operations.apply(Operator::PullAll, fields);
        self
    }

    #[doc(alias = "push_uniq")]
    pub fn add_to_set(&mut self, fields: Document) -> &mut Self {
        self.operations.apply(Operator::AddToSet, fields);
        self
    }

    /// Removes the last element of an array for a positive value, the first one for a
    /// negative value. See [`Pop`](crate::Pop).
    pub fn pop(&mut self, fields: Document) -> &mut Self {
        self.operations.apply(Operator::Pop, fields);
        self
    }

    /// Sends the accumulated modifiers to `store`, applied to every matching document.
    ///
    /// Each call issues a new update with the modifiers accumulated so far. When no
    /// modifier holds any field, nothing is sent and an empty outcome is returned.
    pub fn execute<'a>(&self, store: impl Store<'a>) -> BoxFuture<'a, Result<UpdateOutcome>> {
        let selector = self.selection.selector.clone();
        let update = self.operations.to_document();

        async move {
            let update = update?;

            if update.is_empty() {
                tracing::debug!(
                    collection = E::COLLECTION_NAME,
                    %selector,
                    "skipping update without modifiers"
                );
                return Ok(UpdateOutcome::default());
            }

            if selector.is_empty() {
                tracing::warn!(
                    collection = E::COLLECTION_NAME,
                    "updating every document: criteria are empty"
                );
            }

            tracing::debug!(
                collection = E::COLLECTION_NAME,
                %selector,
                %update,
                "executing atomic update"
            );

            store
                .update(E::COLLECTION_NAME, selector, update, true)
                .await
        }
        .boxed()
    }
}

impl<E: Entity> Default for Atomic<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Atomic<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atomic")
            .field("selection", &self.selection)
            .field("operations", &self.operations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{self, doc, oid::ObjectId};

    struct Page {
        id: ObjectId,
    }

    impl Entity for Page {
        type Id = ObjectId;

        const COLLECTION_NAME: &'static str = "page";

        fn id(&self) -> Self::Id {
            self.id
        }

        fn has_field(field: &str) -> bool {
            matches!(field, "_id" | "title" | "views")
        }

        fn coerce(field: &str, value: Bson) -> Result<Bson> {
            match field {
                "title" => Ok(bson::to_bson(&bson::from_bson::<String>(value)?)?),
                "views" => Ok(bson::to_bson(&bson::from_bson::<i64>(value)?)?),
                _ => Ok(value),
            }
        }
    }

    #[derive(Debug, PartialEq)]
    struct Call {
        collection: &'static str,
        selector: Document,
        update: Document,
        multi: bool,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl<'a> Store<'a> for &'a mut Recorder {
        fn update(
            self,
            collection: &'static str,
            selector: Document,
            update: Document,
            multi: bool,
        ) -> BoxFuture<'a, Result<UpdateOutcome>> {
            self.calls.push(Call {
                collection,
                selector,
                update,
                multi,
            });

            async {
                Ok(UpdateOutcome {
                    matched_count: 2,
                    modified_count: 2,
                    upserted_id: None,
                })
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn executes_accumulated_increments_as_multi_update() {
        let mut recorder = Recorder::default();

        let outcome = Page::atomic()
            .filter(doc! { "title": "Home" })
            .increment(doc! { "day": 1, "week": 2 })
            .execute(&mut recorder)
            .await
            .unwrap();

        assert_eq!(outcome.matched_count, 2);
        assert_eq!(
            recorder.calls,
            vec![Call {
                collection: "page",
                selector: doc! { "title": "Home" },
                update: doc! { "$inc": { "day": 1, "week": 2 } },
                multi: true,
            }]
        );
    }

    #[tokio::test]
    async fn nothing_is_sent_before_execute() {
        let mut recorder = Recorder::default();

        let mut atomic = Page::atomic().filter(doc! { "title": "Home" });
        atomic
            .increment(doc! { "day": 1 })
            .add_to_set(doc! { "tags": "foo" });

        assert!(recorder.calls.is_empty());

        atomic.execute(&mut recorder).await.unwrap();

        assert_eq!(recorder.calls.len(), 1);
        assert_eq!(
            recorder.calls[0].update,
            doc! { "$inc": { "day": 1 }, "$addToSet": { "tags": "foo" } }
        );
    }

    #[tokio::test]
    async fn executing_twice_sends_twice() {
        let mut recorder = Recorder::default();

        let mut atomic = Page::atomic().filter(doc! { "title": "Home" });
        atomic.increment(doc! { "day": 1 });

        atomic.execute(&mut recorder).await.unwrap();
        atomic.increment(doc! { "day": 1 });
        atomic.execute(&mut recorder).await.unwrap();

        assert_eq!(recorder.calls.len(), 2);
        assert_eq!(recorder.calls[0].update, doc! { "$inc": { "day": 1 } });
        assert_eq!(recorder.calls[1].update, doc! { "$inc": { "day": 2 } });
    }

    #[tokio::test]
    async fn scoped_block_executes_once_with_same_document_as_chain() {
        let mut recorder = Recorder::default();

        Page::atomic()
            .filter_with(doc! { "title": "Home" }, &mut recorder, |page| {
                page.increment(doc! { "month": 1 });
                page.increment(doc! { "day": 5 });
                page.add_to_set(doc! { "tags": "foo" });
            })
            .await
            .unwrap();

        let mut chained = Page::atomic().filter(doc! { "title": "Home" });
        chained
            .increment(doc! { "month": 1 })
            .increment(doc! { "day": 5 })
            .add_to_set(doc! { "tags": "foo" });

        assert_eq!(recorder.calls.len(), 1);
        assert_eq!(recorder.calls[0].update, chained.to_document().unwrap());
        assert_eq!(
            bson::to_vec(&recorder.calls[0].update).unwrap(),
            bson::to_vec(&chained.to_document().unwrap()).unwrap()
        );
    }

    #[tokio::test]
    async fn empty_modifiers_skip_the_store() {
        let mut recorder = Recorder::default();

        let outcome = Page::atomic()
            .filter(doc! { "title": "Home" })
            .execute(&mut recorder)
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::default());
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn set_coerces_declared_fields_only() {
        let mut atomic = Page::atomic();
        atomic.set(doc! { "views": 3, "colors": ["red", "green"] });

        let update = atomic.to_document().unwrap();
        let set = update.get_document("$set").unwrap();

        assert_eq!(set.get("views"), Some(&Bson::Int64(3)));
        assert_eq!(set.get("colors"), Some(&bson::bson!(["red", "green"])));
    }

    #[tokio::test]
    async fn coercion_failure_surfaces_on_execute() {
        let mut recorder = Recorder::default();

        let mut atomic = Page::atomic().filter(doc! { "title": "Home" });
        atomic.set(doc! { "title": 12 });

        assert!(atomic.execute(&mut recorder).await.is_err());
        assert!(recorder.calls.is_empty());

        atomic.set(doc! { "title": "Twelve" });
        atomic.execute(&mut recorder).await.unwrap();

        assert_eq!(
            recorder.calls[0].update,
            doc! { "$set": { "title": "Twelve" } }
        );
    }

    #[test]
    fn unset_marks_fields() {
        let mut atomic = Page::atomic();
        atomic.unset(["title", "tags"]);

        assert_eq!(
            atomic.to_document().unwrap(),
            doc! { "$unset": { "title": 1, "tags": 1 } }
        );
    }

    #[test]
    fn filter_normalizes_id_lists_with_entity_identifier() {
        let id = ObjectId::new();

        let atomic = Page::atomic().filter(vec![id.to_hex(), "bogus".to_string()]);

        assert_eq!(atomic.selector(), &doc! { "_id": { "$in": [id] } });
        assert_eq!(atomic.rejected(), &[Bson::String("bogus".into())]);
    }
}
