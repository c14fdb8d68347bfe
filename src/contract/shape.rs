use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use super::direction::{Direction, Visibility};
use super::value::FieldValue;
use crate::error::SqlMapperError;
use crate::types::RowValues;

pub(crate) type Getter = Arc<dyn Fn(&dyn Any) -> Option<RowValues> + Send + Sync>;
pub(crate) type Setter =
    Arc<dyn Fn(&mut dyn Any, RowValues) -> Option<Result<(), SqlMapperError>> + Send + Sync>;

/// One declared member of a record type, with its mapping annotations.
#[derive(Clone)]
pub struct FieldDecl {
    pub(crate) name: String,
    pub(crate) visibility: Visibility,
    pub(crate) storage: &'static str,
    pub(crate) column: Option<String>,
    /// `Some(true)` forces inclusion, `Some(false)` forces exclusion.
    pub(crate) inclusion: Option<bool>,
    pub(crate) direction: Direction,
    pub(crate) key: bool,
    pub(crate) getter: Getter,
    pub(crate) setter: Setter,
}

impl FieldDecl {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }
}

impl fmt::Debug for FieldDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDecl")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("storage", &self.storage)
            .field("column", &self.column)
            .field("inclusion", &self.inclusion)
            .field("direction", &self.direction)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// The declared members of one record type.
#[derive(Debug)]
pub struct TypedShape {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) fields: Vec<FieldDecl>,
}

impl TypedShape {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    /// Members in walk order: public ones first, then non-public, each in
    /// declaration order.
    pub(crate) fn walk(&self) -> impl Iterator<Item = &FieldDecl> {
        let public = self
            .fields
            .iter()
            .filter(|f| f.visibility == Visibility::Public);
        let hidden = self
            .fields
            .iter()
            .filter(|f| f.visibility == Visibility::NonPublic);
        public.chain(hidden)
    }
}

/// The shape of the records a query produces.
#[derive(Debug, Clone)]
pub enum RecordShape {
    /// A Rust type with declared members.
    Typed(Arc<TypedShape>),
    /// Rows are taken as-is; no field mapping exists.
    Dynamic,
}

impl RecordShape {
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, RecordShape::Dynamic)
    }
}

/// Declares the members of `T` once, in place of runtime reflection.
///
/// Annotation methods (`column`, `ignore`, `include`, `direction`, `key`) apply to
/// the most recently declared field.
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// #[derive(Default)]
/// struct Person {
///     id: i64,
///     name: String,
/// }
///
/// let shape = ShapeBuilder::<Person>::new()
///     .field("id", |p| p.id, |p, v| p.id = v)
///     .key()
///     .field("name", |p| p.name.clone(), |p, v| p.name = v)
///     .column("full_name")
///     .build();
/// assert!(!shape.is_dynamic());
/// ```
pub struct ShapeBuilder<T> {
    fields: Vec<FieldDecl>,
    _record: std::marker::PhantomData<fn() -> T>,
}

impl<T: Any> Default for ShapeBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any> ShapeBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            _record: std::marker::PhantomData,
        }
    }

    /// Declare a public member.
    #[must_use]
    pub fn field<V, G, S>(self, name: &str, get: G, set: S) -> Self
    where
        V: FieldValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.member(name, Visibility::Public, get, set)
    }

    /// Declare a non-public member; excluded unless annotated with `include`.
    #[must_use]
    pub fn private_field<V, G, S>(self, name: &str, get: G, set: S) -> Self
    where
        V: FieldValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.member(name, Visibility::NonPublic, get, set)
    }

    fn member<V, G, S>(mut self, name: &str, visibility: Visibility, get: G, set: S) -> Self
    where
        V: FieldValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let getter: Getter = Arc::new(move |record: &dyn Any| {
            record.downcast_ref::<T>().map(|r| get(r).to_value())
        });
        let setter: Setter = Arc::new(move |record: &mut dyn Any, value: RowValues| {
            let record = record.downcast_mut::<T>()?;
            Some(V::from_value(value).map(|v| set(record, v)))
        });
        self.fields.push(FieldDecl {
            name: name.to_string(),
            visibility,
            storage: V::STORAGE,
            column: None,
            inclusion: None,
            direction: Direction::UNRESTRICTED,
            key: false,
            getter,
            setter,
        });
        self
    }

    fn annotate(mut self, f: impl FnOnce(&mut FieldDecl)) -> Self {
        if let Some(last) = self.fields.last_mut() {
            f(last);
        }
        self
    }

    /// Explicit column name.
    #[must_use]
    pub fn column(self, column: &str) -> Self {
        let column = column.to_string();
        self.annotate(|f| f.column = Some(column))
    }

    #[must_use]
    pub fn ignore(self) -> Self {
        self.annotate(|f| f.inclusion = Some(false))
    }

    #[must_use]
    pub fn include(self) -> Self {
        self.annotate(|f| f.inclusion = Some(true))
    }

    #[must_use]
    pub fn direction(self, direction: Direction) -> Self {
        self.annotate(|f| f.direction |= direction)
    }

    #[must_use]
    pub fn key(self) -> Self {
        self.annotate(|f| f.key = true)
    }

    #[must_use]
    pub fn build(self) -> RecordShape {
        RecordShape::Typed(Arc::new(TypedShape {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            fields: self.fields,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Row {
        id: i64,
        note: Option<String>,
    }

    #[test]
    fn walk_puts_public_members_first() {
        let RecordShape::Typed(shape) = ShapeBuilder::<Row>::new()
            .private_field("note", |r| r.note.clone(), |r, v| r.note = v)
            .field("id", |r| r.id, |r, v| r.id = v)
            .build()
        else {
            panic!("typed shape expected");
        };
        let names: Vec<_> = shape.walk().map(FieldDecl::name).collect();
        assert_eq!(names, ["id", "note"]);
        assert_eq!(shape.fields()[0].storage, "text");
    }

    #[test]
    fn accessors_are_bound_to_the_type() {
        let RecordShape::Typed(shape) = ShapeBuilder::<Row>::new()
            .field("id", |r| r.id, |r, v| r.id = v)
            .build()
        else {
            panic!("typed shape expected");
        };
        let field = &shape.fields()[0];
        let mut row = Row::default();
        (field.setter)(&mut row, RowValues::Int(9)).unwrap().unwrap();
        assert_eq!((field.getter)(&row), Some(RowValues::Int(9)));
        assert!((field.getter)(&"not a row").is_none());
    }
}
