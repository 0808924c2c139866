use super::*;
use crate::metadata::{ColumnMetadata, RelationKind, ResolvedTable, TableLookup};
use crate::source::{MapParameterSource, SerdeParameterSource};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio_postgres::Row;

// ── Recording MockClient for tests ──

struct Executed {
    sql: String,
    params: Vec<String>,
    types: Vec<Type>,
}

#[derive(Default)]
struct MockClient {
    table: Option<ResolvedTable>,
    fail_next_lookup: AtomicBool,
    closed: bool,
    lookups: AtomicUsize,
    last_lookup: Mutex<Option<TableLookup>>,
    executed: Mutex<Vec<Executed>>,
}

impl MockClient {
    fn with_dummy_table() -> Self {
        Self {
            table: Some(dummy_table()),
            ..Self::default()
        }
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn last_lookup(&self) -> Option<TableLookup> {
        self.last_lookup.lock().unwrap().clone()
    }

    fn last_execution(&self) -> (String, Vec<String>, Vec<Type>) {
        let executed = self.executed.lock().unwrap();
        let last = executed.last().expect("nothing executed");
        (last.sql.clone(), last.params.clone(), last.types.clone())
    }
}

impl GenericClient for MockClient {
    async fn query(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> UpdateResult<Vec<Row>> {
        Ok(vec![])
    }

    async fn execute_typed(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        types: &[Type],
    ) -> UpdateResult<u64> {
        self.executed.lock().unwrap().push(Executed {
            sql: sql.to_string(),
            params: params.iter().map(|p| format!("{p:?}")).collect(),
            types: types.to_vec(),
        });
        Ok(1)
    }

    fn is_ready(&self) -> bool {
        !self.closed
    }

    async fn table_columns(&self, lookup: &TableLookup) -> UpdateResult<Option<ResolvedTable>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        *self.last_lookup.lock().unwrap() = Some(lookup.clone());
        tokio::task::yield_now().await;
        if self.fail_next_lookup.swap(false, Ordering::SeqCst) {
            return Err(UpdateError::Connection("connection reset".into()));
        }
        Ok(self.table.clone())
    }
}

fn dummy_table() -> ResolvedTable {
    ResolvedTable {
        schema: "public".into(),
        name: "dummy_table".into(),
        kind: RelationKind::Table,
        columns: vec![
            ColumnMetadata::new("key_1", Type::VARCHAR),
            ColumnMetadata::new("key_2", Type::INT4),
            ColumnMetadata::new("a_string", Type::VARCHAR),
            ColumnMetadata::new("an_int", Type::INT4),
            ColumnMetadata::new("a_bool", Type::BOOL),
        ],
    }
}

fn values<const N: usize>(entries: [(&str, SqlValue); N]) -> HashMap<String, SqlValue> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn debug(values: &[SqlValue]) -> Vec<String> {
    values.iter().map(|v| format!("{v:?}")).collect()
}

fn dummy_update(client: &MockClient) -> SimpleUpdate<&MockClient> {
    SimpleUpdate::new(client)
        .with_table_name("dummy_table")
        .unwrap()
        .updating_columns(["a_string", "an_int", "a_bool"])
        .unwrap()
        .restricting_columns_with([("key_1", Operator::Equals), ("key_2", Operator::LessThan)])
        .unwrap()
}

#[test]
fn operator_tokens() {
    assert_eq!(Operator::Equals.to_string(), "=");
    assert_eq!(Operator::LessThan.as_str(), "<");
    assert_eq!(Operator::GreaterThan.as_str(), ">");
    assert_eq!(Operator::default(), Operator::Equals);
}

#[tokio::test]
async fn end_to_end_update_of_dummy_table() {
    let client = MockClient::with_dummy_table();
    let update = dummy_update(&client);

    let affected = update
        .execute(
            &values([
                ("a_string", SqlValue::from("Hello")),
                ("an_int", SqlValue::from(42)),
                ("a_bool", SqlValue::from(true)),
            ]),
            &values([("key_1", SqlValue::from("Pwet")), ("key_2", SqlValue::from(3))]),
        )
        .await
        .unwrap();

    assert_eq!(affected, 1);
    let (sql, params, types) = client.last_execution();
    assert_eq!(
        sql,
        "UPDATE dummy_table SET a_string = $1, an_int = $2, a_bool = $3 WHERE key_1 = $4 AND key_2 < $5"
    );
    assert_eq!(
        params,
        debug(&[
            SqlValue::from("Hello"),
            SqlValue::from(42),
            SqlValue::from(true),
            SqlValue::from("Pwet"),
            SqlValue::from(3),
        ])
    );
    assert_eq!(
        types,
        vec![Type::VARCHAR, Type::INT4, Type::BOOL, Type::VARCHAR, Type::INT4]
    );
}

#[tokio::test]
async fn metadata_columns_fill_in_when_none_declared() {
    let client = MockClient::with_dummy_table();
    let update = SimpleUpdate::new(&client)
        .with_table_name("dummy_table")
        .unwrap()
        .restricting_columns(["key_1"])
        .unwrap();

    update.compile().await.unwrap();
    assert_eq!(
        update.sql(),
        Some(
            "UPDATE dummy_table SET key_1 = $1, key_2 = $2, a_string = $3, an_int = $4, a_bool = $5 WHERE key_1 = $6"
        )
    );
    assert_eq!(
        update.update_columns().unwrap(),
        ["key_1", "key_2", "a_string", "an_int", "a_bool"]
    );
    assert_eq!(update.column_types().unwrap().len(), 6);
}

#[tokio::test]
async fn no_where_clause_without_restricting_columns() {
    let client = MockClient::with_dummy_table();
    let update = SimpleUpdate::new(&client)
        .with_table_name("dummy_table")
        .unwrap()
        .updating_columns(["a_bool"])
        .unwrap();

    update.compile().await.unwrap();
    assert_eq!(update.sql(), Some("UPDATE dummy_table SET a_bool = $1"));
    assert_eq!(update.column_types(), Some(&[Type::BOOL][..]));
}

#[tokio::test]
async fn compile_is_idempotent() {
    let client = MockClient::with_dummy_table();
    let update = dummy_update(&client);

    let first = update.compile().await.unwrap().clone();
    let second = update.compile().await.unwrap();
    assert_eq!(first.sql(), second.sql());
    assert_eq!(first.column_types(), second.column_types());
    assert_eq!(first.update_columns(), second.update_columns());
    assert!(!first.column_types().is_empty());
    assert_eq!(&first, second);
    assert_eq!(update.column_types(), Some(first.column_types()));
    assert_eq!(client.lookups(), 1);
}

#[tokio::test]
async fn configuration_is_locked_after_compile() {
    let client = MockClient::with_dummy_table();
    let mut update = dummy_update(&client);
    assert!(update.set_schema_name("app").is_ok());
    update.set_schema_name("public").unwrap();

    update.compile().await.unwrap();

    assert!(update.set_table_name("other").unwrap_err().is_configuration_locked());
    assert!(
        update
            .set_updating_columns(["a_string"])
            .unwrap_err()
            .is_configuration_locked()
    );
    assert!(
        update
            .set_access_table_column_metadata(false)
            .unwrap_err()
            .is_configuration_locked()
    );
    assert!(
        update
            .add_compile_hook(|_: &CompiledUpdate| {})
            .unwrap_err()
            .is_configuration_locked()
    );
    assert!(matches!(
        update.with_catalog_name("db"),
        Err(UpdateError::ConfigurationLocked)
    ));
}

#[tokio::test]
async fn concurrent_compiles_run_once() {
    let client = MockClient::with_dummy_table();
    let update = dummy_update(&client);
    let no_values = HashMap::new();

    let (a, b, c) = tokio::join!(
        update.compile(),
        update.compile(),
        update.execute(&no_values, &no_values)
    );
    assert_eq!(a.unwrap().sql(), b.unwrap().sql());
    assert_eq!(c.unwrap(), 1);
    assert_eq!(client.lookups(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_update_compiles_once_across_tasks() {
    let client: &'static MockClient = Box::leak(Box::new(MockClient::with_dummy_table()));
    let update = Arc::new(dummy_update(client));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let update = update.clone();
            tokio::spawn(async move { update.compile().await.map(|c| c.sql().to_string()) })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(client.lookups(), 1);
}

#[tokio::test]
async fn missing_table_name_fails_fast() {
    let client = MockClient::with_dummy_table();
    let update = SimpleUpdate::new(&client);

    let err = update.compile().await.unwrap_err();
    assert!(matches!(err, UpdateError::MissingTableName));
    assert!(!update.is_compiled());
    assert_eq!(client.lookups(), 0);
}

#[tokio::test]
async fn failed_metadata_leaves_update_uncompiled() {
    let client = MockClient::with_dummy_table();
    client.fail_next_lookup.store(true, Ordering::SeqCst);
    let mut update = dummy_update(&client);

    let err = update.compile().await.unwrap_err();
    assert!(err.is_metadata_access(), "{err}");
    assert!(err.to_string().contains("connection reset"));
    assert!(!update.is_compiled());
    assert!(update.sql().is_none());

    // Still configurable, and the next attempt retries.
    update.set_schema_name("public").unwrap();
    update.compile().await.unwrap();
    assert!(update.is_compiled());
    assert_eq!(client.lookups(), 2);
}

#[tokio::test]
async fn unknown_table_is_a_metadata_error() {
    let client = MockClient::default();
    let update = SimpleUpdate::new(&client)
        .with_table_name("missing")
        .unwrap()
        .updating_columns(["a"])
        .unwrap();

    let err = update
        .execute(&HashMap::new(), &HashMap::new())
        .await
        .unwrap_err();
    assert!(err.is_metadata_access());
    assert!(err.to_string().contains("missing"));
    assert!(client.executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn closed_client_is_rejected() {
    let client = MockClient {
        closed: true,
        ..MockClient::with_dummy_table()
    };
    let update = dummy_update(&client);

    let err = update.compile().await.unwrap_err();
    assert!(matches!(err, UpdateError::Connection(_)));
    assert_eq!(client.lookups(), 0);
}

#[tokio::test]
async fn metadata_access_can_be_disabled() {
    let client = MockClient::with_dummy_table();
    let update = dummy_update(&client)
        .without_table_column_metadata_access()
        .unwrap();

    update.compile().await.unwrap();
    assert_eq!(client.lookups(), 0);
    assert_eq!(update.column_types().unwrap(), vec![Type::UNKNOWN; 5]);
    assert!(update.compiled().unwrap().provider().table().is_none());
}

#[tokio::test]
async fn metadata_options_apply_as_a_whole() {
    let client = MockClient::with_dummy_table();
    let update = dummy_update(&client)
        .with_metadata_options(MetadataOptions::new().include_synonyms(true))
        .unwrap();

    update.compile().await.unwrap();
    assert!(client.last_lookup().unwrap().include_synonyms);
    assert_eq!(
        update.metadata_context().options(),
        &MetadataOptions {
            access_table_column_metadata: true,
            include_synonyms: true,
        }
    );
}

#[tokio::test]
async fn disabled_metadata_without_declared_columns_is_rejected() {
    let client = MockClient::with_dummy_table();
    let update = SimpleUpdate::new(&client)
        .with_table_name("dummy_table")
        .unwrap()
        .without_table_column_metadata_access()
        .unwrap();

    let err = update.compile().await.unwrap_err();
    assert!(matches!(err, UpdateError::Validation(_)));
    assert!(!update.is_compiled());
}

#[tokio::test]
async fn schema_prefix_and_lookup_options() {
    let client = MockClient::with_dummy_table();
    let update = dummy_update(&client)
        .with_schema_name("App")
        .unwrap()
        .with_catalog_name("appdb")
        .unwrap()
        .include_synonyms_for_table_column_metadata()
        .unwrap();

    update.compile().await.unwrap();
    assert!(update.sql().unwrap().starts_with("UPDATE App.dummy_table SET"));
    assert_eq!(
        client.last_lookup(),
        Some(TableLookup {
            catalog: Some("appdb".into()),
            schema: Some("app".into()),
            table: "dummy_table".into(),
            include_synonyms: true,
        })
    );
}

#[tokio::test]
async fn restricting_columns_keep_first_position() {
    let client = MockClient::with_dummy_table();
    let update = SimpleUpdate::new(&client)
        .with_table_name("dummy_table")
        .unwrap()
        .updating_columns(["a_string"])
        .unwrap()
        .restricting_columns_with([
            ("key_2", Operator::Equals),
            ("key_1", Operator::Equals),
            ("key_2", Operator::GreaterThan),
        ])
        .unwrap();

    assert_eq!(
        update.restricting_columns_list(),
        [
            ("key_2".to_string(), Operator::GreaterThan),
            ("key_1".to_string(), Operator::Equals)
        ]
    );
    update.compile().await.unwrap();
    assert_eq!(
        update.sql(),
        Some("UPDATE dummy_table SET a_string = $1 WHERE key_2 > $2 AND key_1 = $3")
    );
}

#[tokio::test]
async fn missing_values_bind_null() {
    let client = MockClient::with_dummy_table();
    let update = dummy_update(&client);

    update
        .execute(
            &values([("A_STRING", SqlValue::from("Hello"))]),
            &values([("key_1", SqlValue::from("Pwet"))]),
        )
        .await
        .unwrap();

    let (_, params, _) = client.last_execution();
    assert_eq!(
        params,
        debug(&[
            SqlValue::from("Hello"),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::from("Pwet"),
            SqlValue::Null,
        ])
    );
}

#[tokio::test]
async fn parameter_sources_resolve_naming_conventions() {
    #[derive(serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Changes {
        a_string: String,
        an_int: i32,
        a_bool: bool,
    }

    let client = MockClient::with_dummy_table();
    let update = dummy_update(&client);

    let changes = SerdeParameterSource::from_serialize(&Changes {
        a_string: "Hello".into(),
        an_int: 42,
        a_bool: true,
    })
    .unwrap();
    let keys = MapParameterSource::new()
        .add_value("KEY_1", "Pwet")
        .add_value("key2", 3);

    update.execute_source(&changes, &keys).await.unwrap();

    let (_, params, _) = client.last_execution();
    assert_eq!(
        params,
        debug(&[
            SqlValue::from("Hello"),
            SqlValue::Int8(42),
            SqlValue::from(true),
            SqlValue::from("Pwet"),
            SqlValue::from(3),
        ])
    );
}

#[tokio::test]
async fn source_type_hints_override_metadata_types() {
    let client = MockClient::with_dummy_table();
    let update = dummy_update(&client);

    let changes = MapParameterSource::new()
        .add_value("a_string", "Hello")
        .add_typed_value("an_int", 42i64, Type::INT8);
    update
        .execute_source(&changes, &MapParameterSource::new())
        .await
        .unwrap();

    let (_, _, types) = client.last_execution();
    assert_eq!(
        types,
        vec![Type::VARCHAR, Type::INT8, Type::BOOL, Type::VARCHAR, Type::INT4]
    );
    // The compiled vector is untouched.
    assert_eq!(update.column_types().unwrap()[1], Type::INT4);
}

#[tokio::test]
async fn execution_compiles_implicitly() {
    let client = MockClient::with_dummy_table();
    let update = dummy_update(&client);
    assert!(!update.is_compiled());

    update
        .execute(&HashMap::new(), &HashMap::new())
        .await
        .unwrap();
    assert!(update.is_compiled());

    update
        .execute(&HashMap::new(), &HashMap::new())
        .await
        .unwrap();
    assert_eq!(client.lookups(), 1);
    assert_eq!(client.executed.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn compile_hooks_run_once_after_compilation() {
    let client = MockClient::with_dummy_table();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();

    let update = dummy_update(&client)
        .on_compile(move |compiled: &CompiledUpdate| {
            recorder.lock().unwrap().push(compiled.sql().to_string());
        })
        .unwrap()
        .on_compile(TracingCompileHook::new().level(tracing::Level::INFO))
        .unwrap();

    update.compile().await.unwrap();
    update.compile().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(Some(seen[0].as_str()), update.sql());
}
