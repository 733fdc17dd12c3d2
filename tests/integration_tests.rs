use asset_ledger::{
    Asset, AssetContract, CreateAssetRequest, HistoryEntry, LedgerError, MemoryStore, StateStore,
    StoreConfig, UpdateBalanceRequest,
};
use std::sync::Arc;

fn create_request(dealer_id: &str, balance: &str) -> CreateAssetRequest {
    CreateAssetRequest {
        dealer_id: dealer_id.to_string(),
        msisdn: "255712345678".to_string(),
        mpin: "4321".to_string(),
        balance: balance.to_string(),
        status: "ACTIVE".to_string(),
        trans_amount: "25.75".to_string(),
        trans_type: "CREDIT".to_string(),
        remarks: "opening float".to_string(),
    }
}

// Shared behaviour every store must show through the contract.

async fn check_create_then_read<S: StateStore + ?Sized>(store: &S) {
    let created = AssetContract::create(store, &create_request("D1", "100.0"))
        .await
        .unwrap();
    let read = AssetContract::read(store, "D1").await.unwrap();

    assert_eq!(read, created);
    assert_eq!(
        read,
        Asset {
            dealer_id: "D1".to_string(),
            msisdn: "255712345678".to_string(),
            mpin: "4321".to_string(),
            balance: 100.0,
            status: "ACTIVE".to_string(),
            trans_amount: 25.75,
            trans_type: "CREDIT".to_string(),
            remarks: "opening float".to_string(),
        }
    );
}

async fn check_duplicate_create<S: StateStore + ?Sized>(store: &S) {
    AssetContract::create(store, &create_request("D2", "1"))
        .await
        .unwrap();

    let err = AssetContract::create(store, &create_request("D2", "999"))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::AlreadyExists("D2".to_string()));

    let asset = AssetContract::read(store, "D2").await.unwrap();
    assert_eq!(asset.balance, 1.0);
    assert_eq!(store.history_of("D2").await.unwrap().len(), 1);
}

async fn check_read_missing<S: StateStore + ?Sized>(store: &S) {
    let err = AssetContract::read(store, "missing").await.unwrap_err();
    assert_eq!(err, LedgerError::NotFound("missing".to_string()));

    let err = AssetContract::update_balance(store, "missing", "1.0")
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("missing".to_string()));
}

async fn check_invalid_balance_writes_nothing<S: StateStore + ?Sized>(store: &S) {
    let err = AssetContract::create(store, &create_request("D3", "abc"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::InvalidNumber {
            field: "balance",
            input: "abc".to_string()
        }
    );

    assert!(!AssetContract::exists(store, "D3").await.unwrap());
    assert!(store.history_of("D3").await.unwrap().is_empty());
}

async fn check_update_changes_only_balance<S: StateStore + ?Sized>(store: &S) {
    let before = AssetContract::create(store, &create_request("D4", "10"))
        .await
        .unwrap();
    let after = AssetContract::update_balance(store, "D4", "-3.25")
        .await
        .unwrap();

    assert_eq!(after.balance, -3.25);
    assert_eq!(
        after,
        Asset {
            balance: -3.25,
            ..before
        }
    );
    assert_eq!(AssetContract::read(store, "D4").await.unwrap(), after);
}

async fn check_balance_scenario<S: StateStore + ?Sized>(store: &S) {
    AssetContract::create(store, &create_request("D5", "100.0"))
        .await
        .unwrap();
    assert_eq!(
        AssetContract::read(store, "D5").await.unwrap().balance,
        100.0
    );

    AssetContract::update_balance(store, "D5", "150.5")
        .await
        .unwrap();
    assert_eq!(
        AssetContract::read(store, "D5").await.unwrap().balance,
        150.5
    );

    let history = AssetContract::history(store, "D5").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| !e.is_delete()));
    assert_eq!(history[0].asset().map(|a| a.balance), Some(100.0));
    assert_eq!(history[1].asset().map(|a| a.balance), Some(150.5));
    assert!(history[0].timestamp() <= history[1].timestamp());
    assert_ne!(history[0].tx_id(), history[1].tx_id());
}

async fn check_delete_marker_in_history<S: StateStore + ?Sized>(store: &S) {
    AssetContract::create(store, &create_request("D6", "7"))
        .await
        .unwrap();
    assert!(store.delete("D6").await.unwrap());
    assert!(!AssetContract::exists(store, "D6").await.unwrap());

    let history = AssetContract::history(store, "D6").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(matches!(history[0], HistoryEntry::Present { .. }));
    assert!(matches!(history[1], HistoryEntry::Deleted { .. }));
    assert!(history[1].asset().is_none());

    // the id is free again once deleted
    AssetContract::create(store, &create_request("D6", "8"))
        .await
        .unwrap();
    assert_eq!(AssetContract::history(store, "D6").await.unwrap().len(), 3);
}

async fn check_corrupt_record<S: StateStore + ?Sized>(store: &S) {
    store
        .put("D7", b"{\"dealerId\": 42}".to_vec())
        .await
        .unwrap();

    let err = AssetContract::read(store, "D7").await.unwrap_err();
    assert!(matches!(err, LedgerError::Corrupt(_)));

    let err = AssetContract::update_balance(store, "D7", "1")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Corrupt(_)));

    let err = AssetContract::history(store, "D7").await.unwrap_err();
    assert!(matches!(err, LedgerError::Corrupt(_)));
}

async fn run_contract_suite<S: StateStore + ?Sized>(store: &S) {
    check_create_then_read(store).await;
    check_duplicate_create(store).await;
    check_read_missing(store).await;
    check_invalid_balance_writes_nothing(store).await;
    check_update_changes_only_balance(store).await;
    check_balance_scenario(store).await;
    check_delete_marker_in_history(store).await;
    check_corrupt_record(store).await;
}

#[tokio::test]
async fn test_contract_on_memory_store() {
    let store = MemoryStore::new();
    run_contract_suite(&store).await;
}

#[tokio::test]
async fn test_contract_on_boxed_store() {
    let store = StoreConfig::Memory.connect().await.unwrap();
    run_contract_suite(store.as_ref()).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_contract_on_sqlite_memory() {
    let store = asset_ledger::SqliteStore::new_memory().await.unwrap();
    if let Err(err) = store.init_schema().await {
        panic!("Error: {:#?}", err);
    }
    run_contract_suite(&store).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let config = StoreConfig::Sqlite {
        path: path.to_string_lossy().into_owned(),
    };

    {
        let store = config.connect().await.unwrap();
        AssetContract::create(&store, &create_request("D1", "100.0"))
            .await
            .unwrap();
        AssetContract::update_balance(&store, "D1", "150.5")
            .await
            .unwrap();
    }

    let store = config.connect().await.unwrap();
    assert_eq!(
        AssetContract::read(&store, "D1").await.unwrap().balance,
        150.5
    );
    let history = AssetContract::history(&store, "D1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].asset().map(|a| a.balance), Some(100.0));
}

#[tokio::test]
async fn test_requests_decode_from_api_json() {
    let store = MemoryStore::new();

    let create: CreateAssetRequest = serde_json::from_str(
        r#"{
            "dealerId": "D9",
            "msisdn": "255700000009",
            "mpin": "9999",
            "balance": "100.0",
            "status": "ACTIVE",
            "transAmount": "0",
            "transType": "OPEN",
            "remarks": "via api"
        }"#,
    )
    .unwrap();
    AssetContract::create(&store, &create).await.unwrap();

    let update: UpdateBalanceRequest =
        serde_json::from_str(r#"{"dealerId": "D9", "newBalance": "150.5"}"#).unwrap();
    AssetContract::update_balance(&store, &update.dealer_id, &update.new_balance)
        .await
        .unwrap();

    let asset_json = serde_json::to_value(AssetContract::read(&store, "D9").await.unwrap()).unwrap();
    assert_eq!(asset_json["dealerId"], "D9");
    assert_eq!(asset_json["balance"], 150.5);
    assert_eq!(asset_json["transAmount"], 0.0);

    let history_json =
        serde_json::to_value(AssetContract::history(&store, "D9").await.unwrap()).unwrap();
    let entries = history_json.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert!(entry["txId"].is_string());
        assert_eq!(entry["isDelete"], false);
        assert!(entry["timestamp"].is_string());
    }
    assert_eq!(entries[0]["value"]["balance"], 100.0);
    assert_eq!(entries[1]["value"]["balance"], 150.5);
}

/// Races `writers` creates of one dealer id; exactly one may win.
async fn check_concurrent_create<S: StateStore + 'static>(store: Arc<S>, dealer_id: &str) {
    let writers = 5;
    let mut handles = Vec::new();
    for i in 0..writers {
        let store = Arc::clone(&store);
        let req = create_request(dealer_id, &format!("{}.0", i));
        handles.push(tokio::spawn(async move {
            AssetContract::create(&*store, &req).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(LedgerError::AlreadyExists(id)) => assert_eq!(id, dealer_id),
            Err(err) => panic!("Error: {:#?}", err),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(store.history_of(dealer_id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_on_memory_store() {
    let store = Arc::new(MemoryStore::new());
    for round in 0..20 {
        check_concurrent_create(Arc::clone(&store), &format!("D{}", round)).await;
    }
}

#[cfg(feature = "sqlite")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_on_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");
    let store = asset_ledger::SqliteStore::new_file(&path.to_string_lossy())
        .await
        .unwrap();
    store.init_schema().await.unwrap();

    let store = Arc::new(store);
    for round in 0..20 {
        check_concurrent_create(Arc::clone(&store), &format!("D{}", round)).await;
    }
}
