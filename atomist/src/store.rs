use crate::{Mongo, with_session};
use futures_util::{FutureExt, future::BoxFuture};
use mongodb::{
    Database,
    bson::{Bson, Document},
    error::Result,
    results::UpdateResult,
};

/// Destination of modifier updates.
///
/// [`Mongo`] and `&Database` are the stores used in practice. The trait exists so
/// an update can be pointed at anything that accepts `(selector, update, multi)`.
pub trait Store<'a>: Send + 'a {
    /// Applies `update` to the documents of `collection` matching `selector`: all of
    /// them when `multi` is set, the first one otherwise.
    fn update(
        self,
        collection: &'static str,
        selector: Document,
        update: Document,
        multi: bool,
    ) -> BoxFuture<'a, Result<UpdateOutcome>>;
}

/// Acknowledgement of an update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

impl From<UpdateResult> for UpdateOutcome {
    fn from(value: UpdateResult) -> Self {
        Self {
            matched_count: value.matched_count,
            modified_count: value.modified_count,
            upserted_id: value.upserted_id,
        }
    }
}

impl<'a> Store<'a> for Mongo<'a> {
    fn update(
        self,
        collection: &'static str,
        selector: Document,
        update: Document,
        multi: bool,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        async move {
            let Mongo { db, session } = self;
            let collection = db.collection::<Document>(collection);

            let result = if multi {
                with_session!(collection.update_many(selector, update), session).await?
            } else {
                with_session!(collection.update_one(selector, update), session).await?
            };

            Ok(result.into())
        }
        .boxed()
    }
}

impl<'a> Store<'a> for &'a Database {
    fn update(
        self,
        collection: &'static str,
        selector: Document,
        update: Document,
        multi: bool,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        Mongo::new(self).update(collection, selector, update, multi)
    }
}
