use crate::types::{Identifier, ObjectId};
use mongodb::bson::{self, Bson, Document, doc};

/// Name of the field every document is keyed by.
pub const ID_FIELD: &str = "_id";

/// Raw criteria selecting the documents a modifier update applies to.
///
/// Most callers never spell out a variant: anything convertible into `Criteria`
/// is accepted, so an id, a list of ids, a `doc!` or an entity's `filter!` can be
/// passed directly.
///
/// | Input                                  | Variant                    | Selector                        |
/// |----------------------------------------|----------------------------|---------------------------------|
/// | `ObjectId`, `&str`, `String`           | [`Criteria::Id`]           | `{ _id: id }`                   |
/// | `Vec<_>`, `&[_]`, `[_; N]`             | [`Criteria::Ids`]          | `{ _id: { $in: [ids..] } }`     |
/// | `Document`, `TypedFilter`              | [`Criteria::Document`]     | the document itself             |
/// | `None`, `Bson::Null`, other scalars    | [`Criteria::Empty`]        | `{}`                            |
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Criteria {
    /// A single identifier. Strings in the entity's identifier format are parsed,
    /// anything else is used as given.
    Id(Bson),
    /// Identifier candidates. Only the ones recognized by the entity's
    /// [`Identifier`] survive normalization.
    Ids(Vec<Bson>),
    /// A selector passed through untouched.
    Document(Document),
    /// No constraint at all. An update with empty criteria touches every
    /// document in the collection.
    #[default]
    Empty,
}

/// Normalized criteria.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pub selector: Document,
    /// Candidates dropped from a [`Criteria::Ids`] list, in their original order.
    pub rejected: Vec<Bson>,
}

impl Criteria {
    pub fn normalize<I: Identifier>(self) -> Selection {
        match self {
            Self::Id(id) => Selection {
                selector: doc! { ID_FIELD: I::recognize(id.clone()).unwrap_or(id) },
                rejected: Vec::new(),
            },
            Self::Ids(candidates) => {
                let mut ids = Vec::with_capacity(candidates.len());
                let mut rejected = Vec::new();

                for candidate in candidates {
                    match I::recognize(candidate.clone()) {
                        Some(id) => ids.push(id),
                        None => rejected.push(candidate),
                    }
                }

                if !rejected.is_empty() {
                    tracing::debug!(
                        kept = ids.len(),
                        rejected = rejected.len(),
                        "dropped malformed identifiers from criteria"
                    );
                }

                Selection {
                    selector: doc! { ID_FIELD: { "$in": ids } },
                    rejected,
                }
            }
            Self::Document(selector) => Selection {
                selector,
                rejected: Vec::new(),
            },
            Self::Empty => Selection::default(),
        }
    }
}

impl From<Bson> for Criteria {
    fn from(value: Bson) -> Self {
        match value {
            Bson::String(_) | Bson::ObjectId(_) => Self::Id(value),
            Bson::Array(candidates) => Self::Ids(candidates),
            Bson::Document(document) => Self::Document(document),
            _ => Self::Empty,
        }
    }
}

impl From<bson::oid::ObjectId> for Criteria {
    fn from(value: bson::oid::ObjectId) -> Self {
        Self::Id(value.into())
    }
}

impl From<ObjectId> for Criteria {
    fn from(value: ObjectId) -> Self {
        Self::Id(value.into())
    }
}

impl From<&str> for Criteria {
    fn from(value: &str) -> Self {
        Self::Id(value.into())
    }
}

impl From<String> for Criteria {
    fn from(value: String) -> Self {
        Self::Id(value.into())
    }
}

impl<T: Into<Bson>> From<Vec<T>> for Criteria {
    fn from(value: Vec<T>) -> Self {
        Self::Ids(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Bson> + Clone> From<&[T]> for Criteria {
    fn from(value: &[T]) -> Self {
        Self::Ids(value.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<Bson>, const N: usize> From<[T; N]> for Criteria {
    fn from(value: [T; N]) -> Self {
        Self::Ids(value.into_iter().map(Into::into).collect())
    }
}

impl From<Document> for Criteria {
    fn from(value: Document) -> Self {
        Self::Document(value)
    }
}

impl<C: Into<Criteria>> From<Option<C>> for Criteria {
    fn from(value: Option<C>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}
