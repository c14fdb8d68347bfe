use std::sync::Arc;

use tracing::debug;

use super::key::DataContractKey;
use super::model::DataContract;
use super::policy::NamingPolicy;
use super::shape::RecordShape;
use crate::cache::KeyedStore;
use crate::error::SqlMapperError;

/// Memoizes [`DataContract`]s by [`DataContractKey`].
///
/// Build one per application and share it; every caller asking for an equal key
/// gets the same `Arc`.
#[derive(Default)]
pub struct DataContractStore {
    contracts: KeyedStore<DataContractKey, DataContract>,
}

impl DataContractStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The contract for `shape` selecting `columns` under `policy`.
    ///
    /// # Errors
    /// Caller-input errors (`DynamicShapeOverride`, `ColumnResolution`) are returned
    /// before or during derivation and leave nothing cached.
    pub fn get(
        &self,
        shape: &RecordShape,
        columns: Option<&str>,
        policy: &NamingPolicy,
    ) -> Result<Arc<DataContract>, SqlMapperError> {
        let key = DataContractKey::new(shape, columns, policy)?;
        self.contracts.get_or_try_insert_with(&key, || match shape {
            RecordShape::Dynamic => Ok(DataContract::dynamic()),
            RecordShape::Typed(typed) => {
                debug!(
                    record = typed.type_name(),
                    columns = key.columns().unwrap_or("*"),
                    "deriving data contract"
                );
                DataContract::derive(typed, key.columns(), key.policy())
            }
        })
    }

    /// Number of contracts derived so far, including failed attempts.
    #[must_use]
    pub fn derivations(&self) -> usize {
        self.contracts.derivations()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    pub fn clear(&self) {
        self.contracts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Direction, ShapeBuilder};
    use crate::results::CustomDbRow;
    use crate::types::RowValues;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: i64,
        name: String,
        email: Option<String>,
        secret: String,
        audit: String,
        created_by: String,
    }

    fn person_shape() -> RecordShape {
        ShapeBuilder::<Person>::new()
            .field("id", |p| p.id, |p, v| p.id = v)
            .key()
            .field("name", |p| p.name.clone(), |p, v| p.name = v)
            .column("full_name")
            .field("email", |p| p.email.clone(), |p, v| p.email = v)
            .private_field("secret", |p| p.secret.clone(), |p, v| p.secret = v)
            .private_field("audit", |p| p.audit.clone(), |p, v| p.audit = v)
            .include()
            .field("created_by", |p| p.created_by.clone(), |p, v| p.created_by = v)
            .direction(Direction::WRITE)
            .build()
    }

    #[derive(Default)]
    struct Hidden {
        x: i64,
    }

    #[test]
    fn equal_keys_share_one_contract() {
        let store = DataContractStore::new();
        let policy = NamingPolicy::new();
        let a = store.get(&person_shape(), Some("*"), &policy).unwrap();
        let b = store.get(&person_shape(), None, &policy).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.derivations(), 1);
        assert_eq!(store.len(), 1);
    }

    #[derive(Default)]
    struct Account {
        id: i64,
        token: String,
    }

    #[test]
    fn divergent_declarations_of_one_type_get_their_own_contracts() {
        let store = DataContractStore::new();
        let policy = NamingPolicy::new();
        let full = ShapeBuilder::<Account>::new()
            .field("id", |a| a.id, |a, v| a.id = v)
            .field("token", |a| a.token.clone(), |a, v| a.token = v)
            .build();
        let narrowed = ShapeBuilder::<Account>::new()
            .field("id", |a| a.id, |a, v| a.id = v)
            .field("token", |a| a.token.clone(), |a, v| a.token = v)
            .ignore()
            .build();

        let full = store.get(&full, None, &policy).unwrap();
        let narrowed = store.get(&narrowed, None, &policy).unwrap();
        assert!(!Arc::ptr_eq(&full, &narrowed));
        assert_eq!(full.read_columns(), ["id", "token"]);
        assert_eq!(narrowed.read_columns(), ["id"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn concurrent_gets_derive_once() {
        let store = DataContractStore::new();
        let shape = person_shape();
        let policy = NamingPolicy::new();
        let contracts: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..6)
                .map(|_| scope.spawn(|| store.get(&shape, None, &policy).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(contracts.iter().all(|c| Arc::ptr_eq(c, &contracts[0])));
        assert_eq!(store.derivations(), 1);
    }

    #[test]
    fn walk_applies_visibility_annotations_and_direction() {
        let store = DataContractStore::new();
        let contract = store.get(&person_shape(), None, &NamingPolicy::new()).unwrap();
        // public first, then the included non-public member; write-only is not read
        assert_eq!(contract.read_columns(), ["id", "full_name", "email", "audit"]);
        assert!(contract.is_mapped("created_by"));
        assert!(!contract.is_mapped("secret"));
        assert!(contract.is_mapped("FULL_NAME"));
        let keys: Vec<_> = contract.key_fields().map(|f| f.name()).collect();
        assert_eq!(keys, ["id"]);
    }

    #[test]
    fn policy_directions_are_combined() {
        let store = DataContractStore::new();
        let policy = NamingPolicy::new().with_direction(Arc::new(|field: &str| {
            if field == "created_by" {
                Direction::READ
            } else {
                Direction::UNRESTRICTED
            }
        }));
        let contract = store.get(&person_shape(), None, &policy).unwrap();
        let created_by = contract.field_for_column("created_by").unwrap();
        assert_eq!(created_by.direction(), Direction::BOTH);
        assert!(contract.read_columns().iter().any(|c| c == "created_by"));
    }

    #[test]
    fn policy_names_and_ignores() {
        let store = DataContractStore::new();
        let policy = NamingPolicy::new()
            .with_column_name(Arc::new(|f: &str| format!("c_{f}")))
            .with_ignore(Arc::new(|f: &str| f == "email"));
        let contract = store.get(&person_shape(), None, &policy).unwrap();
        // explicit column annotations win over the policy function
        assert_eq!(contract.read_columns(), ["c_id", "full_name", "c_audit"]);
    }

    #[test]
    fn literal_columns_resolve_by_field_or_column() {
        let store = DataContractStore::new();
        let contract = store
            .get(&person_shape(), Some("id, full_name, secret"), &NamingPolicy::new())
            .unwrap();
        assert_eq!(contract.read_columns(), ["id", "full_name", "secret"]);
        assert_eq!(contract.column_list(), "id, full_name, secret");
        assert!(!contract.is_mapped("email"));
    }

    #[test]
    fn literal_columns_fail_on_missing_or_duplicate() {
        let store = DataContractStore::new();
        let policy = NamingPolicy::new();
        let missing = store.get(&person_shape(), Some("id, nope"), &policy).unwrap_err();
        assert!(matches!(missing, SqlMapperError::ColumnResolution(_)));
        let duplicate = store.get(&person_shape(), Some("id, ID"), &policy).unwrap_err();
        assert!(matches!(duplicate, SqlMapperError::ColumnResolution(_)));
        let write_only = store
            .get(&person_shape(), Some("created_by"), &policy)
            .unwrap_err();
        assert!(write_only.is_caller_input());
        assert!(store.is_empty());
    }

    #[test]
    fn no_eligible_members_selects_everything() {
        let store = DataContractStore::new();
        let shape = ShapeBuilder::<Hidden>::new()
            .private_field("x", |h| h.x, |h, v| h.x = v)
            .build();
        let contract = store.get(&shape, Some("*"), &NamingPolicy::new()).unwrap();
        assert!(contract.read_columns().is_empty());
        assert_eq!(contract.column_list(), "*");

        let dynamic = store.get(&RecordShape::Dynamic, None, &NamingPolicy::new()).unwrap();
        assert!(dynamic.is_dynamic());
        assert_eq!(dynamic.column_list(), "*");
    }

    #[test]
    fn dynamic_override_is_not_cached() {
        let store = DataContractStore::new();
        let policy = NamingPolicy::new().with_column_name(Arc::new(|f: &str| f.to_string()));
        assert!(store.get(&RecordShape::Dynamic, None, &policy).is_err());
        assert_eq!(store.derivations(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn rows_map_into_records_and_back() {
        let store = DataContractStore::new();
        let contract = store.get(&person_shape(), None, &NamingPolicy::new()).unwrap();
        let row = CustomDbRow::new(
            Arc::new(vec![
                "id".into(),
                "full_name".into(),
                "email".into(),
                "RowNumber".into(),
            ]),
            vec![
                RowValues::Int(4),
                RowValues::Text("Ada".into()),
                RowValues::Null,
                RowValues::Int(1),
            ],
        );
        let person: Person = contract.map_row(&row).unwrap();
        assert_eq!(person.id, 4);
        assert_eq!(person.name, "Ada");
        assert_eq!(person.email, None);

        let values = contract.write_values(&person).unwrap();
        let columns: Vec<_> = values.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(columns, ["id", "full_name", "email", "created_by", "audit"]);
    }

    #[test]
    fn direction_violations_fail_loudly() {
        let store = DataContractStore::new();
        let contract = store.get(&person_shape(), None, &NamingPolicy::new()).unwrap();
        let created_by = contract.field_for_column("created_by").unwrap();
        let mut person = Person::default();
        let err = created_by
            .set(&mut person, RowValues::Text("x".into()))
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::ContractViolation(_)));

        let read_only = ShapeBuilder::<Hidden>::new()
            .field("x", |h| h.x, |h, v| h.x = v)
            .direction(Direction::READ)
            .build();
        let contract = store.get(&read_only, None, &NamingPolicy::new()).unwrap();
        let x = contract.field_for_column("x").unwrap();
        assert!(x.get(&Hidden::default()).is_err());
        assert!(x.get(&person).is_err());
    }
}
