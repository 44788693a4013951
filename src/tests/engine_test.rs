#[cfg(test)]
pub mod test {
    use std::{env, time::Duration};

    use tempfile::TempDir;

    use crate::{
        catalog::schema::{Field, Schema, SchemaBuilder},
        config::{
            StorageOptions, DEFAULT_POOL_PAGES, ENV_LOCK_TIMEOUT_MS, ENV_PAGE_SIZE,
            ENV_POOL_PAGES, ENV_REPLACER_K,
        },
        engine::StorageEngine,
        error::StorageError,
        iterators::iterator::DbFileIterator,
        storage::page::page::page_constants::DEFAULT_PAGE_SIZE,
        transaction::TransactionId,
    };

    fn people() -> Schema {
        SchemaBuilder::new()
            .add_int("id")
            .add_char("name", 12)
            .build()
    }

    fn person(id: i32, name: &str) -> Vec<Field> {
        vec![Field::Int(id), Field::Char(name.to_string())]
    }

    fn scan_all(engine: &StorageEngine, txn: TransactionId, name: &str) -> Vec<Vec<Field>> {
        let table_id = engine.catalog().table_id_by_name(name).unwrap();
        let schema = engine.catalog().schema(table_id).unwrap();

        let mut iter = engine.scan(txn, table_id).unwrap();
        if iter.open().is_err() {
            return Vec::new();
        }

        iter.tuples()
            .map(|tuple| schema.decode(&tuple.unwrap()).unwrap())
            .collect()
    }

    fn small_options() -> StorageOptions {
        StorageOptions::default()
            .with_page_size(128)
            .with_buffer_pool_pages(4)
            .with_lock_timeout(Duration::from_millis(200))
    }

    #[test]
    fn insert_commit_scan() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let dir = TempDir::new().unwrap();
        let engine = StorageEngine::open(small_options()).unwrap();
        let table_id = engine
            .create_table("people", dir.path().join("people.dat"), people())
            .unwrap();

        let txn = engine.begin();
        for (id, name) in [(1, "ada"), (2, "grace"), (3, "edsger")] {
            engine.insert(txn, table_id, &person(id, name)).unwrap();
        }
        engine.commit(txn).unwrap();

        let reader = engine.begin();
        assert_eq!(
            scan_all(&engine, reader, "people"),
            vec![person(1, "ada"), person(2, "grace"), person(3, "edsger")]
        );
        engine.commit(reader).unwrap();
    }

    #[test]
    fn committed_rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.dat");

        {
            let engine = StorageEngine::open(small_options()).unwrap();
            let table_id = engine.create_table("people", &path, people()).unwrap();

            // 16 byte rows on 128 byte pages: 7 per page, so this spans three pages
            let txn = engine.begin();
            for id in 0..20 {
                engine.insert(txn, table_id, &person(id, "row")).unwrap();
            }
            engine.commit(txn).unwrap();
            engine.shutdown().unwrap();
        }

        let engine = StorageEngine::open(small_options()).unwrap();
        engine.create_table("people", &path, people()).unwrap();

        let txn = engine.begin();
        let ids: Vec<Field> = scan_all(&engine, txn, "people")
            .into_iter()
            .map(|mut fields| fields.remove(0))
            .collect();
        assert_eq!(ids, (0..20).map(Field::Int).collect::<Vec<_>>());
    }

    #[test]
    fn abort_leaves_no_trace() {
        let dir = TempDir::new().unwrap();
        let engine = StorageEngine::open(small_options()).unwrap();
        let table_id = engine
            .create_table("people", dir.path().join("people.dat"), people())
            .unwrap();

        let setup = engine.begin();
        engine.insert(setup, table_id, &person(1, "kept")).unwrap();
        engine.commit(setup).unwrap();

        let txn = engine.begin();
        engine.insert(txn, table_id, &person(2, "dropped")).unwrap();
        let mut iter = engine.scan(txn, table_id).unwrap();
        iter.open().unwrap();
        let first = iter.next().unwrap();
        iter.close();
        engine.delete(txn, first.record_id().unwrap()).unwrap();
        engine.abort(txn).unwrap();

        let reader = engine.begin();
        assert_eq!(scan_all(&engine, reader, "people"), vec![person(1, "kept")]);
    }

    #[test]
    fn insert_with_wrong_fields_fails() {
        let dir = TempDir::new().unwrap();
        let engine = StorageEngine::open(small_options()).unwrap();
        let table_id = engine
            .create_table("people", dir.path().join("people.dat"), people())
            .unwrap();

        let txn = engine.begin();
        assert!(matches!(
            engine.insert(txn, table_id, &[Field::Int(1)]),
            Err(StorageError::SchemaMismatch { .. })
        ));
        engine.abort(txn).unwrap();
    }

    #[test]
    fn storage_options() {
        let defaults = StorageOptions::default();
        assert_eq!(defaults.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(defaults.buffer_pool_pages, DEFAULT_POOL_PAGES);
        assert!(defaults.validate().is_ok());

        assert!(matches!(
            defaults.clone().with_page_size(16).validate(),
            Err(StorageError::InvalidConfig { .. })
        ));
        assert!(defaults.clone().with_buffer_pool_pages(0).validate().is_err());
        assert!(defaults.clone().with_replacer_k(0).validate().is_err());
        assert!(StorageEngine::open(defaults.clone().with_buffer_pool_pages(0)).is_err());

        // Every environment case lives in this one test, variables are process wide
        env::set_var(ENV_PAGE_SIZE, "8192");
        env::set_var(ENV_POOL_PAGES, "12");
        env::set_var(ENV_REPLACER_K, "3");
        env::set_var(ENV_LOCK_TIMEOUT_MS, "250");

        let options = StorageOptions::from_env().unwrap();
        assert_eq!(options.page_size, 8192);
        assert_eq!(options.buffer_pool_pages, 12);
        assert_eq!(options.replacer_k, 3);
        assert_eq!(options.lock_timeout, Duration::from_millis(250));

        env::set_var(ENV_POOL_PAGES, "lots");
        assert!(matches!(
            StorageOptions::from_env(),
            Err(StorageError::InvalidConfig { .. })
        ));

        for key in [ENV_PAGE_SIZE, ENV_POOL_PAGES, ENV_REPLACER_K, ENV_LOCK_TIMEOUT_MS] {
            env::remove_var(key);
        }
        assert_eq!(StorageOptions::from_env().unwrap(), StorageOptions::default());
    }
}
