/// ## Getting started
///
/// The [`Entity`](crate::Entity) trait maps a Rust type to a `MongoDB` collection and
/// gives it a set of atomic modifier updates: increments, `$set`, `$unset` and the
/// array operators. Updates are applied server-side to every matching document, so
/// nothing has to be loaded first.
///
/// A type that derives [`Entity`](crate::Entity) must:
/// - be a struct with named fields
/// - implement [`Serialize`](serde::Serialize) and [`Deserialize`](serde::Deserialize)
/// - have a field named `id`, annotated with `#[serde(rename = "_id")]`
/// - use an [`Identifier`](crate::Identifier) for `id`, such as
///   [`ObjectId`](mongodb::bson::oid::ObjectId) or the [`ObjectId`](crate::ObjectId)
///   newtype.
///
/// ### Example
///
/// ```ignore
/// use serde::{Serialize, Deserialize};
/// use atomist::Entity;
/// use mongodb::bson::oid::ObjectId;
///
/// #[derive(Serialize, Deserialize, Entity)]
/// struct Page {
///   #[serde(rename = "_id")]
///   id: ObjectId,
///   title: String,
///   day_count: i64,
///   tags: Vec<String>,
/// }
/// ```
///
/// The collection name is the `snake_case` form of the struct name with a trailing
/// `_entity` removed (`PageEntity` → `page`). Override it with
/// `#[entity(collection = "pages")]`.
///
/// ### Stores
///
/// Updates are sent to a [`Store`](crate::Store). [`Mongo`](crate::Mongo) wraps a
/// [`Database`](mongodb::Database) and an optional
/// [`ClientSession`](mongodb::ClientSession), so updates can take part in a
/// transaction; a plain `&Database` works as well.
///
/// ```ignore
/// let client = Client::with_uri_str("mongodb://example.com").await?;
/// let db = client.database("mydb");
/// let mut mongo: Mongo = (&db).into();
/// Page::increment_where(mongo.rb(), doc! { "title": "Home" }, doc! { "day_count": 1 }).await?;
/// ```
///
/// Connection settings, timeouts and retries belong to the
/// [`mongodb` client](mongodb::Client).
mod getting_started {}

/// ### Criteria
///
/// Every modifier update starts from [`Criteria`](crate::Criteria). Anything that
/// converts into it can be passed where criteria are expected:
///
/// | Given                               | Selector                          |
/// |-------------------------------------|-----------------------------------|
/// | an id (`ObjectId`, `&str`)          | `{ _id: id }`                     |
/// | a list of ids                       | `{ _id: { $in: [ids...] } }`      |
/// | a `Document`                        | the document, untouched           |
/// | a `filter!` from the helper module  | the rendered filter               |
/// | `None`                              | `{}`, every document              |
///
/// Id strings in the identifier's format are parsed, so `"507f191e810c19729de860ea"`
/// selects the document keyed by that `ObjectId`.
///
/// A list of ids is checked entry by entry: strings that are not valid identifiers,
/// and values of other types, are dropped without an error. The dropped entries are
/// available from [`Atomic::rejected`](crate::Atomic::rejected).
///
/// ```ignore
/// let atomic = Page::atomic().filter(vec!["507f191e810c19729de860ea", "oops"]);
/// assert_eq!(atomic.rejected(), &[Bson::String("oops".into())]);
/// ```
///
/// ### Typed filters
///
/// Deriving [`Entity`](crate::Entity) generates a helper module named after the entity
/// (`page` for `Page`) with a `TypedFilter` struct, a `filter!` macro and a `Fields`
/// enum naming the BSON fields.
///
/// ```ignore
/// let criteria = page::filter! {
///     title: "Home",
///     day_count: Gte(&10),
///     tags: Exists(true),
/// };
/// ```
///
/// Fields without an operator compare with `$eq`.
mod criteria {}

/// ### Chaining modifiers
///
/// [`Entity::atomic`](crate::Entity::atomic) starts an [`Atomic`](crate::Atomic)
/// builder. Modifiers accumulate until [`execute`](crate::Atomic::execute) is called,
/// which sends one `updateMany` with everything collected so far.
///
/// ```ignore
/// let mut atomic = Page::atomic().filter(doc! { "title": "Home" });
/// atomic
///     .increment(doc! { "week_count": 3 })
///     .decrement(doc! { "week_count": 2 })
///     .push(doc! { "tags": "friendly" });
///
/// // db.page.updateMany(
/// //     { title: "Home" },
/// //     { $inc: { week_count: 1 }, $push: { tags: "friendly" } },
/// // )
/// atomic.execute(mongo.rb()).await?;
/// ```
///
/// The same update can be written as a closure. It is executed exactly once, right
/// after the closure returns:
///
/// ```ignore
/// Page::atomic()
///     .filter_with(doc! { "title": "Home" }, mongo.rb(), |page| {
///         page.increment(doc! { "week_count": 3 });
///         page.decrement(doc! { "week_count": 2 });
///         page.push(doc! { "tags": "friendly" });
///     })
///     .await?;
/// ```
///
/// ### Merging
///
/// | Modifier                      | Operator     | Repeated calls                        |
/// |-------------------------------|--------------|---------------------------------------|
/// | `increment`                   | `$inc`       | summed per field                      |
/// | `decrement`                   | `$inc`       | summed per field, always subtracts    |
/// | `set`                         | `$set`       | last call wins                        |
/// | `unset`                       | `$unset`     | last call wins                        |
/// | `push`                        | `$push`      | last call wins                        |
/// | `push_all`                    | `$push`      | last call wins, rendered with `$each` |
/// | `pull`                        | `$pull`      | last call wins                        |
/// | `pull_all`                    | `$pullAll`   | last call wins                        |
/// | `add_to_set`                  | `$addToSet`  | last call wins                        |
/// | `pop`                         | `$pop`       | last call wins                        |
///
/// `decrement` subtracts the magnitude of its values: `{ week_count: 2 }` and
/// `{ week_count: -2 }` both subtract two.
///
/// `set` runs every value for a declared field through
/// [`Entity::coerce`](crate::Entity::coerce), so `{ day_count: 3 }` is stored as an
/// `i64` for an `i64` field. Fields the entity does not declare are sent as given. A
/// value that cannot be coerced fails the update when it is executed.
///
/// `pop` takes [`Pop::Last`](crate::Pop::Last) (`1`) or [`Pop::First`](crate::Pop::First)
/// (`-1`).
///
/// An `Atomic` without any modifier field does not contact the store on `execute`.
mod chaining {}

/// ### One-shot updates
///
/// When a single modifier is enough, the `*_where` functions on
/// [`Entity`](crate::Entity) build and execute it in one call:
///
/// ```ignore
/// Page::push_where(mongo.rb(), page::filter! { title: "Home" }, doc! { "tags": "foo" }).await?;
/// Page::unset_where(mongo.rb(), vec![first_id, second_id], ["title", "tags"]).await?;
/// ```
///
/// Instances have the same modifiers without the criteria, scoped to their own id:
///
/// ```ignore
/// page.increment(mongo.rb(), doc! { "day_count": 1 }).await?;
/// page.pop(mongo.rb(), doc! { "tags": Pop::First }).await?;
/// ```
///
/// These go through the same builder, so merging and coercion rules are identical.
/// The instance itself is not changed; reload it to see the new values.
mod one_shot_updates {}

/// This library is named "Atomist" because every update it sends is atomic per document.
mod naming {}
