use mongodb::bson::{self, Bson};
use serde::{Deserialize, Serialize};
use std::borrow::{Borrow, BorrowMut};
use std::fmt::Display;
use std::ops::{Deref, DerefMut};

/// A document key type that can be recognized in loosely typed criteria.
///
/// Criteria given as a list of candidates (see [`Criteria::Ids`](crate::Criteria::Ids))
/// keep only the entries [`recognize`](Identifier::recognize) accepts: strings in the
/// identifier's textual format are parsed, values that already are native identifiers
/// are kept as they are, anything else is dropped.
pub trait Identifier: Into<Bson> + Sized {
    fn is_valid_identifier(s: &str) -> bool;

    fn parse_identifier(s: &str) -> Option<Self>;

    /// Whether `value` already holds an identifier in its native BSON form.
    fn is_identifier(value: &Bson) -> bool;

    fn recognize(candidate: Bson) -> Option<Bson> {
        match candidate {
            Bson::String(s) if Self::is_valid_identifier(&s) => {
                Self::parse_identifier(&s).map(Into::into)
            }
            other if Self::is_identifier(&other) => Some(other),
            _ => None,
        }
    }
}

impl Identifier for bson::oid::ObjectId {
    fn is_valid_identifier(s: &str) -> bool {
        s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
    }

    fn parse_identifier(s: &str) -> Option<Self> {
        Self::parse_str(s).ok()
    }

    fn is_identifier(value: &Bson) -> bool {
        matches!(value, Bson::ObjectId(_))
    }
}

macro_rules! impl_wrapper {
    ($outer:ty, $inner:ty) => {
        impl AsRef<$inner> for $outer {
            fn as_ref(&self) -> &$inner {
                &self.0
            }
        }

        impl AsMut<$inner> for $outer {
            fn as_mut(&mut self) -> &mut $inner {
                &mut self.0
            }
        }

        impl Borrow<$inner> for $outer {
            fn borrow(&self) -> &$inner {
                &self.0
            }
        }

        impl BorrowMut<$inner> for $outer {
            fn borrow_mut(&mut self) -> &mut $inner {
                &mut self.0
            }
        }

        impl Deref for $outer {
            type Target = $inner;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl DerefMut for $outer {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }

        impl From<$inner> for $outer {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$outer> for $inner {
            fn from(value: $outer) -> Self {
                value.0
            }
        }

        impl Display for $outer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Newtype over [`bson::oid::ObjectId`], usable as an entity id.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct ObjectId(pub bson::oid::ObjectId);

impl_wrapper!(ObjectId, bson::oid::ObjectId);

impl ObjectId {
    pub fn new() -> Self {
        Self(bson::oid::ObjectId::new())
    }
}

impl From<ObjectId> for Bson {
    fn from(value: ObjectId) -> Self {
        Bson::ObjectId(value.0)
    }
}

impl Identifier for ObjectId {
    fn is_valid_identifier(s: &str) -> bool {
        bson::oid::ObjectId::is_valid_identifier(s)
    }

    fn parse_identifier(s: &str) -> Option<Self> {
        bson::oid::ObjectId::parse_identifier(s).map(Self)
    }

    fn is_identifier(value: &Bson) -> bool {
        bson::oid::ObjectId::is_identifier(value)
    }
}
