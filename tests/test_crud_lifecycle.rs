use chrono::NaiveDate;
use metacrud::{
    ColumnOrder, DbColumn, DbTable, DialectRegistry, Engine, EngineConfig, Error, PoolConfig,
    Predicate, RowId, SelectQuery, SqlType, SqlitePool, Value,
};

fn open(dir: &tempfile::TempDir, config: EngineConfig) -> Engine<SqlitePool> {
    let path = dir.path().join("crud.db");
    let pool = SqlitePool::open(PoolConfig::new(path.to_string_lossy())).unwrap();
    Engine::with_config(pool, config).unwrap()
}

fn account_table() -> DbTable {
    DbTable::builder("ACCOUNT")
        .column(DbColumn::new("id", SqlType::Integer).nullable(false))
        .column(DbColumn::new("name", SqlType::Varchar).size(50))
        .primary_key(["id"])
        .build()
        .unwrap()
}

fn numbered(engine: &Engine<SqlitePool>, rows: i64) {
    engine
        .create_table(
            &DbTable::builder("SEQ")
                .column(DbColumn::new("n", SqlType::Integer).nullable(false))
                .primary_key(["n"])
                .build()
                .unwrap(),
        )
        .unwrap();
    for n in 1..=rows {
        engine.insert("SEQ", [("n", n)]).unwrap();
    }
}

fn numbers(engine: &Engine<SqlitePool>, offset: usize, count: usize) -> Vec<i64> {
    let query = SelectQuery::new()
        .offset(offset)
        .count(count)
        .order_by(ColumnOrder::asc("n"));
    engine
        .select("SEQ", &query)
        .unwrap()
        .iter()
        .map(|row| row.get("n").unwrap())
        .collect()
}

#[test]
fn test_account_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&dir, EngineConfig::new());

    engine.create_table(&account_table()).unwrap();
    assert_eq!(engine.table_names().unwrap(), vec!["ACCOUNT"]);

    // INSERT
    let inserted = engine
        .insert("ACCOUNT", [("id", Value::from(99)), ("name", Value::from("account 99"))])
        .unwrap();
    assert_eq!(inserted, 1);

    // UPDATE ... WHERE (id = ?) OR (name = ?)
    let predicate = Predicate::equals("id", 99).or(Predicate::equals("name", "account 99"));
    let updated = engine
        .update_where("ACCOUNT", &predicate, [("name", "Account 99")])
        .unwrap();
    assert_eq!(updated, 1);

    // SELECT
    let data = engine.select_all("ACCOUNT").unwrap();
    assert_eq!(data.columns(), ["id", "name"]);
    assert_eq!(data.len(), 1);
    assert_eq!(data.rows()[0].get::<String>("name").unwrap(), "Account 99");

    // DELETE
    assert_eq!(engine.delete("ACCOUNT", 99).unwrap(), 1);
    assert!(engine.select_by_id("ACCOUNT", 99).unwrap().is_none());
}

#[test]
fn test_or_update_touches_only_matching_row() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&dir, EngineConfig::new());
    let table = DbTable::builder("ACCOUNT")
        .column(DbColumn::new("id", SqlType::Integer).nullable(false))
        .column(DbColumn::new("name", SqlType::Varchar).size(50))
        .column(DbColumn::new("opened_at", SqlType::Date))
        .primary_key(["id"])
        .build()
        .unwrap();
    engine.create_table(&table).unwrap();

    let opened = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
    for (id, name) in [(1, "account 1"), (99, "account 99")] {
        let inserted = engine
            .insert(
                "ACCOUNT",
                [
                    ("id", Value::from(id)),
                    ("name", Value::from(name)),
                    ("opened_at", Value::from(opened)),
                ],
            )
            .unwrap();
        assert_eq!(inserted, 1);
    }

    let data = engine
        .select(
            "ACCOUNT",
            &SelectQuery::new().filter(Predicate::equals("name", "account 1")),
        )
        .unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data.rows()[0].get::<i64>("id").unwrap(), 1);
    assert_eq!(data.rows()[0].get::<NaiveDate>("opened_at").unwrap(), opened);

    let predicate = Predicate::equals("id", 99).or(Predicate::equals("name", "account 99"));
    let updated = engine
        .update_where("ACCOUNT", &predicate, [("name", "Account 99")])
        .unwrap();
    assert_eq!(updated, 1);

    let untouched = engine.select_by_id("ACCOUNT", 1).unwrap().unwrap();
    assert_eq!(untouched.get::<String>("name").unwrap(), "account 1");
    let changed = engine.select_by_id("ACCOUNT", 99).unwrap().unwrap();
    assert_eq!(changed.get::<String>("name").unwrap(), "Account 99");
    assert_eq!(changed.get::<NaiveDate>("opened_at").unwrap(), opened);
}

#[test]
fn test_catalog_persists_across_engines() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = open(&dir, EngineConfig::new());
        engine.create_table(&account_table()).unwrap();
        engine.insert("ACCOUNT", [("id", 1)]).unwrap();
    }

    let engine = open(&dir, EngineConfig::new());
    let table = engine.table_def("account").unwrap().unwrap();
    assert_eq!(*table, account_table());
    assert_eq!(table.primary_key(), ["id"]);
    assert_eq!(engine.select_all("ACCOUNT").unwrap().len(), 1);
}

#[test]
fn test_declared_types_survive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&dir, EngineConfig::new());
    let table = DbTable::builder("EVENT")
        .column(DbColumn::new("id", SqlType::BigInt).nullable(false))
        .column(DbColumn::new("title", SqlType::Varchar).size(100))
        .column(DbColumn::new("day", SqlType::Date))
        .column(DbColumn::new("at", SqlType::Timestamp))
        .column(DbColumn::new("score", SqlType::Double))
        .column(DbColumn::new("active", SqlType::Boolean))
        .column(DbColumn::new("payload", SqlType::Blob))
        .primary_key(["id"])
        .build()
        .unwrap();
    engine.create_table(&table).unwrap();

    let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let at = day.and_hms_opt(10, 30, 0).unwrap();
    engine
        .insert(
            "EVENT",
            [
                ("id", Value::from(7)),
                ("title", Value::from("launch")),
                ("day", Value::from(day)),
                ("at", Value::from(at)),
                ("score", Value::from(2.5)),
                ("active", Value::from(true)),
                ("payload", Value::from(vec![0xde_u8, 0xad])),
            ],
        )
        .unwrap();

    let row = engine.select_by_id("EVENT", 7_i64).unwrap().unwrap();
    assert_eq!(row.get::<i64>("id").unwrap(), 7);
    assert_eq!(row.get::<NaiveDate>("day").unwrap(), day);
    assert_eq!(row.value("at"), Some(&Value::Timestamp(at)));
    assert_eq!(row.get::<f64>("score").unwrap(), 2.5);
    assert_eq!(row.get::<bool>("active").unwrap(), true);
    assert_eq!(row.get::<Vec<u8>>("payload").unwrap(), vec![0xde, 0xad]);
}

#[test]
fn test_text_input_is_coerced_by_column_type() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&dir, EngineConfig::new());
    engine.create_table(&account_table()).unwrap();
    let table = engine.table_def("ACCOUNT").unwrap().unwrap();

    let values = table.coerce_all([("id", "12"), ("name", "twelve")]).unwrap();
    assert_eq!(values["id"], Value::Integer(12));
    engine.insert("ACCOUNT", values).unwrap();

    let predicate = table.conditions_from_strings([("id", "12")]).unwrap();
    let data = engine
        .select("ACCOUNT", &SelectQuery::new().filter(predicate))
        .unwrap();
    assert_eq!(data.len(), 1);

    match table.coerce_all([("id", "twelve")]) {
        Err(Error::InvalidFields(failures)) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].column.as_deref(), Some("id"));
        }
        other => panic!("expected invalid fields, got {:?}", other),
    }
}

#[test]
fn test_null_condition() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&dir, EngineConfig::new());
    engine.create_table(&account_table()).unwrap();
    engine.insert("ACCOUNT", [("id", Value::from(1)), ("name", Value::Null)]).unwrap();
    engine.insert("ACCOUNT", [("id", Value::from(2)), ("name", Value::from("b"))]).unwrap();

    let data = engine
        .select(
            "ACCOUNT",
            &SelectQuery::new().filter(Predicate::equals("name", Value::Null)),
        )
        .unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data.rows()[0].get::<i64>("id").unwrap(), 1);
    assert_eq!(data.rows()[0].get::<Option<String>>("name").unwrap(), None);
}

#[test]
fn test_update_all_counts_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&dir, EngineConfig::new());
    engine.create_table(&account_table()).unwrap();
    for id in 1..=4 {
        engine.insert("ACCOUNT", [("id", id)]).unwrap();
    }
    assert_eq!(engine.update_all("ACCOUNT", [("name", "same")]).unwrap(), 4);

    let predicate = Predicate::conditions([("name", "same")]);
    assert_eq!(engine.delete_where("ACCOUNT", &predicate).unwrap(), 4);
    assert!(engine.select_all("ACCOUNT").unwrap().is_empty());
}

#[test]
fn test_pagination_with_native_dialect() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&dir, EngineConfig::new());
    numbered(&engine, 10);

    assert_eq!(numbers(&engine, 0, 3), vec![1, 2, 3]);
    assert_eq!(numbers(&engine, 3, 4), vec![4, 5, 6, 7]);
    assert_eq!(numbers(&engine, 8, 0), vec![9, 10]);
    assert!(numbers(&engine, 20, 5).is_empty());
    assert!(numbers(&engine, usize::MAX, 0).is_empty());
    assert!(numbers(&engine, usize::MAX, 5).is_empty());
}

#[test]
fn test_pagination_by_skipping_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::new().dialects(DialectRegistry::empty());
    let engine = open(&dir, config);
    assert_eq!(engine.dialect().name(), "Generic");
    numbered(&engine, 10);

    assert_eq!(numbers(&engine, 0, 3), vec![1, 2, 3]);
    assert_eq!(numbers(&engine, 3, 4), vec![4, 5, 6, 7]);
    assert_eq!(numbers(&engine, 8, 0), vec![9, 10]);
    assert!(numbers(&engine, 20, 5).is_empty());
    assert!(numbers(&engine, usize::MAX, 0).is_empty());
    assert!(numbers(&engine, usize::MAX, 5).is_empty());
}

#[test]
fn test_composite_key() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&dir, EngineConfig::new());
    let table = DbTable::builder("MEMBERSHIP")
        .column(DbColumn::new("group_id", SqlType::Integer).nullable(false))
        .column(DbColumn::new("user_id", SqlType::Integer).nullable(false))
        .column(DbColumn::new("role", SqlType::Varchar).size(20))
        .primary_key(["group_id", "user_id"])
        .build()
        .unwrap();
    engine.create_table(&table).unwrap();
    assert_eq!(
        engine.table_def("MEMBERSHIP").unwrap().unwrap().primary_key(),
        ["group_id", "user_id"]
    );

    engine
        .insert(
            "MEMBERSHIP",
            [
                ("group_id", Value::from(1)),
                ("user_id", Value::from(2)),
                ("role", Value::from("member")),
            ],
        )
        .unwrap();
    let id = RowId::composite([("group_id", 1), ("user_id", 2)]);
    assert_eq!(engine.update("MEMBERSHIP", id.clone(), [("role", "owner")]).unwrap(), 1);

    let row = engine.select_by_id("MEMBERSHIP", id.clone()).unwrap().unwrap();
    assert_eq!(row.get::<String>("role").unwrap(), "owner");

    assert!(matches!(
        engine.select_by_id("MEMBERSHIP", RowId::composite([("group_id", 1)])),
        Err(Error::InvalidKey { .. })
    ));
    assert_eq!(engine.delete("MEMBERSHIP", id).unwrap(), 1);
}

#[test]
#[should_panic(expected = "exactly one primary-key column")]
fn test_scalar_id_on_composite_key_panics() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&dir, EngineConfig::new());
    let table = DbTable::builder("PAIR")
        .column(DbColumn::new("a", SqlType::Integer))
        .column(DbColumn::new("b", SqlType::Integer))
        .primary_key(["a", "b"])
        .build()
        .unwrap();
    engine.create_table(&table).unwrap();
    let _ = engine.update("PAIR", 1, [("a", 2)]);
}

#[test]
fn test_unknown_table() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&dir, EngineConfig::new());
    assert!(engine.table_def("GHOST").unwrap().is_none());
    assert!(matches!(
        engine.select_by_id("GHOST", 1),
        Err(Error::TableNotFound(_))
    ));
    assert!(matches!(
        engine.select_all("GHOST"),
        Err(Error::Database(_))
    ));
}
