use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::direction::Direction;

pub type ColumnNameFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type DirectionFn = Arc<dyn Fn(&str) -> Direction + Send + Sync>;
pub type IgnoreFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// How field names become column names.
///
/// Policies compare by case sensitivity and by the identity of their functions:
/// two policies sharing the same `Arc`s are equal, two separately allocated
/// closures are not.
#[derive(Clone, Default)]
pub struct NamingPolicy {
    case_sensitive: bool,
    column_name: Option<ColumnNameFn>,
    direction: Option<DirectionFn>,
    ignore: Option<IgnoreFn>,
}

impl NamingPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    #[must_use]
    pub fn with_column_name(mut self, f: ColumnNameFn) -> Self {
        self.column_name = Some(f);
        self
    }

    #[must_use]
    pub fn with_direction(mut self, f: DirectionFn) -> Self {
        self.direction = Some(f);
        self
    }

    #[must_use]
    pub fn with_ignore(mut self, f: IgnoreFn) -> Self {
        self.ignore = Some(f);
        self
    }

    #[must_use]
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// True when any field-redirecting function is set.
    #[must_use]
    pub fn has_overrides(&self) -> bool {
        self.column_name.is_some() || self.direction.is_some() || self.ignore.is_some()
    }

    pub(crate) fn column_for(&self, field: &str) -> String {
        self.column_name
            .as_ref()
            .map_or_else(|| field.to_string(), |f| f(field))
    }

    pub(crate) fn direction_for(&self, field: &str) -> Direction {
        self.direction
            .as_ref()
            .map_or(Direction::UNRESTRICTED, |f| f(field))
    }

    pub(crate) fn ignores(&self, field: &str) -> bool {
        self.ignore.as_ref().is_some_and(|f| f(field))
    }

    /// Column-name comparison under this policy.
    pub(crate) fn names_match(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }

    pub(crate) fn lookup_key(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        }
    }
}

fn same_fn<F: ?Sized>(a: Option<&Arc<F>>, b: Option<&Arc<F>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

fn fn_address<F: ?Sized>(f: Option<&Arc<F>>) -> usize {
    f.map_or(0, |f| Arc::as_ptr(f).cast::<()>() as usize)
}

impl PartialEq for NamingPolicy {
    fn eq(&self, other: &Self) -> bool {
        self.case_sensitive == other.case_sensitive
            && same_fn(self.column_name.as_ref(), other.column_name.as_ref())
            && same_fn(self.direction.as_ref(), other.direction.as_ref())
            && same_fn(self.ignore.as_ref(), other.ignore.as_ref())
    }
}

impl Eq for NamingPolicy {}

impl Hash for NamingPolicy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.case_sensitive.hash(state);
        fn_address(self.column_name.as_ref()).hash(state);
        fn_address(self.direction.as_ref()).hash(state);
        fn_address(self.ignore.as_ref()).hash(state);
    }
}

impl fmt::Debug for NamingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamingPolicy")
            .field("case_sensitive", &self.case_sensitive)
            .field("column_name", &self.column_name.is_some())
            .field("direction", &self.direction.is_some())
            .field("ignore", &self.ignore.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_function_identity() {
        let snake: ColumnNameFn = Arc::new(|s: &str| s.to_ascii_lowercase());
        let a = NamingPolicy::new().with_column_name(Arc::clone(&snake));
        let b = NamingPolicy::new().with_column_name(snake);
        assert_eq!(a, b);

        let other: ColumnNameFn = Arc::new(|s: &str| s.to_ascii_lowercase());
        let c = NamingPolicy::new().with_column_name(other);
        assert_ne!(a, c);
        assert_ne!(NamingPolicy::new(), NamingPolicy::new().case_sensitive(true));
        assert_eq!(NamingPolicy::new(), NamingPolicy::default());
    }

    #[test]
    fn defaults_pass_names_through() {
        let p = NamingPolicy::new();
        assert_eq!(p.column_for("Name"), "Name");
        assert_eq!(p.direction_for("Name"), Direction::UNRESTRICTED);
        assert!(!p.ignores("Name"));
        assert!(p.names_match("NAME", "name"));
        assert!(!p.clone().case_sensitive(true).names_match("NAME", "name"));
    }
}
