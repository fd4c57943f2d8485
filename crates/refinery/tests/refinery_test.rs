//! End-to-end runs of the refinery against a local warehouse.

use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use medallion_core::table::{
    AppendOptions, Catalog, ColumnType, MergeOutcome, MergeStats, Row, TableSchema,
};
use refinery::records::{CountrySales, SaleItemRecord, SaleRecord, TopCustomer};
use refinery::silver::WriteOutcome;
use refinery::{Config, RefineError, RefineReport, Refinery, Stage};

/// 2021-10-01 00:00:00 UTC.
const OCT_1: i64 = 1633046400;
const DAY: i64 = 86400;

fn rows(values: Vec<Value>) -> Vec<Row> {
    values
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
}

fn raw_sales_schema() -> TableSchema {
    TableSchema::of(&[
        ("SaleID", ColumnType::String),
        ("ts", ColumnType::Long),
        ("Location", ColumnType::String),
        ("CustomerID", ColumnType::String),
        ("OrderSource", ColumnType::String),
        ("STATE", ColumnType::String),
        ("SaleItems", ColumnType::String),
        ("exported_ts", ColumnType::Long),
    ])
}

fn sale(
    id: &str,
    store: &str,
    customer: Option<&str>,
    day: i64,
    exported: Option<i64>,
    state: &str,
    items: &str,
) -> Value {
    json!({
        "SaleID": id,
        "ts": OCT_1 + day * DAY,
        "Location": store,
        "CustomerID": customer,
        "OrderSource": "ONLINE",
        "STATE": state,
        "SaleItems": items,
        "exported_ts": exported,
    })
}

fn line_items(costs: &[f64]) -> String {
    let items: Vec<Value> = costs
        .iter()
        .enumerate()
        .map(|(i, cost)| json!({"id": format!("P{i}"), "size": "regular", "cost": cost, "ingredients": ["bun"]}))
        .collect();
    Value::Array(items).to_string()
}

struct Fixture {
    _dir: TempDir,
    uri: String,
    catalog: Catalog,
}

impl Fixture {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let uri = dir.path().to_str().unwrap().to_string();
        let catalog = Catalog::open(&uri, Default::default()).await.unwrap();

        catalog
            .table("stores")
            .unwrap()
            .overwrite(
                &TableSchema::of(&[("id", ColumnType::String), ("name", ColumnType::String)]),
                &rows(vec![
                    json!({"id": "SYD01", "name": "Sydney"}),
                    json!({"id": "MEL01", "name": "Melbourne"}),
                    json!({"id": "AKL01", "name": "Auckland"}),
                ]),
            )
            .await
            .unwrap();

        let customers: Vec<Value> = [
            (1, "SYD01", "Ada"),
            (5, "AKL01", "Eve"),
            (11, "MEL01", "Cam"),
            (12, "MEL01", "Dan"),
            (13, "MEL01", "Fay"),
            (14, "MEL01", "Gus"),
            (15, "MEL01", "Hal"),
        ]
        .into_iter()
        .map(|(id, store, name)| json!({"id": id, "store_id": store, "name": name}))
        .collect();
        catalog
            .table("customers")
            .unwrap()
            .overwrite(
                &TableSchema::of(&[
                    ("id", ColumnType::Long),
                    ("store_id", ColumnType::String),
                    ("name", ColumnType::String),
                ]),
                &rows(customers),
            )
            .await
            .unwrap();

        catalog
            .table("products")
            .unwrap()
            .overwrite(
                &TableSchema::of(&[("id", ColumnType::String), ("name", ColumnType::String)]),
                &rows(vec![json!({"id": "P0", "name": "Burger"})]),
            )
            .await
            .unwrap();

        Self {
            _dir: dir,
            uri,
            catalog,
        }
    }

    /// Append one ingestion batch to the raw sales table.
    async fn ingest(&self, sales: Vec<Value>) {
        self.catalog
            .table("sales_raw")
            .unwrap()
            .append(&rows(sales), &raw_sales_schema(), AppendOptions::default())
            .await
            .unwrap();
    }

    fn config(&self, extra: &str) -> Config {
        Config::parse(&format!("warehouse:\n  uri: {}\n{extra}", self.uri)).unwrap()
    }

    async fn run(&self, stage: Stage, extra: &str) -> Result<RefineReport, RefineError> {
        Refinery::new(self.catalog.clone(), self.config(extra))?
            .run(stage, &CancellationToken::new())
            .await
    }

    async fn sales(&self) -> Vec<SaleRecord> {
        let mut sales: Vec<SaleRecord> = self
            .catalog
            .table("silver_sales")
            .unwrap()
            .read_records()
            .await
            .unwrap();
        sales.sort_by(|a, b| a.id.cmp(&b.id));
        sales
    }

    async fn items(&self) -> Vec<SaleItemRecord> {
        let mut items: Vec<SaleItemRecord> = self
            .catalog
            .table("silver_sale_items")
            .unwrap()
            .read_records()
            .await
            .unwrap();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    async fn country_sales(&self) -> Vec<CountrySales> {
        let mut rows: Vec<CountrySales> = self
            .catalog
            .table("gold_country_sales")
            .unwrap()
            .read_records()
            .await
            .unwrap();
        rows.sort_by(|a, b| {
            (&a.country_code, &a.sales_month).cmp(&(&b.country_code, &b.sales_month))
        });
        rows
    }

    fn rescued(&self, channel: &str) -> Vec<Value> {
        let dir = std::path::Path::new(&self.uri).join("_rescued").join(channel);
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        entries
            .flat_map(|entry| {
                let text = std::fs::read_to_string(entry.unwrap().path()).unwrap();
                text.lines()
                    .map(|line| serde_json::from_str(line).unwrap())
                    .collect::<Vec<Value>>()
            })
            .collect()
    }
}

fn standard_sales() -> (Vec<Value>, Vec<Value>) {
    let first = vec![
        sale("S1", "SYD01", Some("1"), 2, Some(100), "PENDING", &line_items(&[10.0])),
        sale("S2", "AKL01", Some("5"), 4, Some(150), "COMPLETED", &line_items(&[7.5])),
    ];
    let second = vec![
        sale("S1", "SYD01", Some("1"), 2, Some(200), "COMPLETED", &line_items(&[10.0, 20.0])),
        sale("S3", "SYD01", None, 6, Some(300), "COMPLETED", "[{\"id\": \"P1\""),
    ];
    (first, second)
}

#[tokio::test]
async fn test_full_run_builds_silver_and_gold() {
    let fixture = Fixture::new().await;
    let (first, second) = standard_sales();
    fixture.ingest(first).await;
    fixture.ingest(second).await;

    let report = fixture.run(Stage::All, "").await.unwrap();
    let silver = report.silver.unwrap();
    assert_eq!(silver.sales, 3);
    assert_eq!(silver.items, 3);
    assert_eq!(silver.discarded, 1);
    assert_eq!(silver.malformed.len(), 1);
    assert!(report.gold.is_some());

    let sales = fixture.sales().await;
    assert_eq!(sales.len(), 3);
    assert_eq!(sales[0].order_state.as_deref(), Some("COMPLETED"));
    assert_eq!(sales[0].ts.as_deref(), Some("2021-10-03 00:00:00"));
    assert_eq!(sales[0].unique_customer_id.as_deref(), Some("SYD01-1"));
    assert_eq!(sales[2].unique_customer_id, None);

    let items = fixture.items().await;
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["S1-0", "S1-1", "S2-0"]);

    let locations = fixture
        .catalog
        .table("dim_locations")
        .unwrap()
        .read_rows()
        .await
        .unwrap();
    assert!(locations.iter().all(|row| row["country_code"] != Value::Null));

    let customers = fixture
        .catalog
        .table("dim_customers")
        .unwrap()
        .read_rows()
        .await
        .unwrap();
    assert!(customers.iter().any(|row| row["unique_id"] == json!("MEL01-11")));

    let country: Vec<CountrySales> = fixture
        .catalog
        .table("gold_country_sales")
        .unwrap()
        .read_records()
        .await
        .unwrap();
    assert_eq!(
        country,
        vec![
            CountrySales {
                country_code: Some("AUS".to_string()),
                sales_month: Some("2021-10".to_string()),
                total_sales: Some(30.0),
                number_of_sales: 1,
            },
            CountrySales {
                country_code: Some("NZL".to_string()),
                sales_month: Some("2021-10".to_string()),
                total_sales: Some(7.5),
                number_of_sales: 1,
            },
        ]
    );
}

#[tokio::test]
async fn test_malformed_items_are_rescued_and_sale_kept() {
    let fixture = Fixture::new().await;
    let (first, second) = standard_sales();
    fixture.ingest(first).await;
    fixture.ingest(second).await;

    fixture.run(Stage::Silver, "").await.unwrap();

    assert!(fixture.sales().await.iter().any(|s| s.id == "S3"));
    assert!(fixture.items().await.iter().all(|i| i.sale_id != "S3"));

    let rescued = fixture.rescued("silver_sale_items");
    assert_eq!(rescued.len(), 1);
    assert_eq!(rescued[0]["stage"], "expand");
    assert_eq!(rescued[0]["field"], "SaleItems");
    assert_eq!(rescued[0]["raw_payload"], "[{\"id\": \"P1\"");
}

#[tokio::test]
async fn test_rerun_on_unchanged_input_is_identical() {
    let fixture = Fixture::new().await;
    let (first, second) = standard_sales();
    fixture.ingest(first).await;
    fixture.ingest(second).await;

    fixture.run(Stage::Silver, "").await.unwrap();
    let sales = fixture.sales().await;
    let items = fixture.items().await;

    fixture.run(Stage::Silver, "").await.unwrap();
    assert_eq!(fixture.sales().await, sales);
    assert_eq!(fixture.items().await, items);
}

#[tokio::test]
async fn test_top_customers_keep_tied_ranks() {
    let fixture = Fixture::new().await;
    let spends = [
        ("M1", "11", 50.0),
        ("M2", "12", 40.0),
        ("M3", "13", 40.0),
        ("M4", "14", 30.0),
        ("M5", "15", 10.0),
    ];
    fixture
        .ingest(
            spends
                .into_iter()
                .map(|(id, customer, cost)| {
                    sale(id, "MEL01", Some(customer), 1, Some(1), "COMPLETED", &line_items(&[cost]))
                })
                .collect(),
        )
        .await;

    fixture.run(Stage::All, "").await.unwrap();

    let top: Vec<TopCustomer> = fixture
        .catalog
        .table("gold_store_top_customers")
        .unwrap()
        .read_records()
        .await
        .unwrap();
    let ranked: Vec<(Option<f64>, u64)> = top
        .iter()
        .map(|t| (t.customer_spend, t.customer_rank))
        .collect();
    assert_eq!(ranked, vec![(Some(50.0), 1), (Some(40.0), 2), (Some(40.0), 2)]);
    assert_eq!(top[0].customer_name.as_deref(), Some("Cam"));

    let spend_rows = fixture
        .catalog
        .table("gold_top_customers")
        .unwrap()
        .read_rows()
        .await
        .unwrap();
    assert_eq!(spend_rows.len(), 5);
}

#[tokio::test]
async fn test_top_n_is_configurable() {
    let fixture = Fixture::new().await;
    fixture
        .ingest(vec![
            sale("M1", "MEL01", Some("11"), 1, Some(1), "COMPLETED", &line_items(&[5.0])),
            sale("M2", "MEL01", Some("12"), 1, Some(1), "COMPLETED", &line_items(&[4.0])),
        ])
        .await;

    fixture.run(Stage::All, "gold:\n  top_n: 1\n").await.unwrap();

    let top: Vec<TopCustomer> = fixture
        .catalog
        .table("gold_store_top_customers")
        .unwrap()
        .read_records()
        .await
        .unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].unique_customer_id, "MEL01-11");
}

#[tokio::test]
async fn test_merge_mode_rewrites_only_changed_rows() {
    let merge = "silver:\n  sales:\n    write_mode: merge\n";
    let fixture = Fixture::new().await;
    let (first, _) = standard_sales();
    fixture.ingest(first).await;

    let report = fixture.run(Stage::Silver, merge).await.unwrap().silver.unwrap();
    assert!(matches!(
        report.sales_write,
        WriteOutcome::Merged(MergeOutcome::Committed { .. })
    ));
    let version = report.sales_write.version();

    // Nothing new: no commit at all
    let report = fixture.run(Stage::Silver, merge).await.unwrap().silver.unwrap();
    assert_eq!(
        report.sales_write,
        WriteOutcome::Merged(MergeOutcome::Unchanged(MergeStats {
            inserted: 0,
            updated: 0,
            unchanged: 2,
            deleted: 0,
        }))
    );
    let latest = fixture
        .catalog
        .table("silver_sales")
        .unwrap()
        .latest_version()
        .await
        .unwrap();
    assert_eq!(latest, version);

    // A newer export of S1 and a new sale S4
    fixture
        .ingest(vec![
            sale("S1", "SYD01", Some("1"), 2, Some(500), "REFUNDED", &line_items(&[10.0])),
            sale("S4", "AKL01", Some("5"), 3, Some(500), "COMPLETED", &line_items(&[1.0])),
        ])
        .await;
    let report = fixture.run(Stage::Silver, merge).await.unwrap().silver.unwrap();
    match &report.sales_write {
        WriteOutcome::Merged(outcome @ MergeOutcome::Committed { .. }) => assert_eq!(
            outcome.stats(),
            MergeStats {
                inserted: 1,
                updated: 1,
                unchanged: 1,
                deleted: 0,
            }
        ),
        other => panic!("expected a merge commit, got {other:?}"),
    }

    let sales = fixture.sales().await;
    assert_eq!(sales.len(), 3);
    assert_eq!(sales[0].order_state.as_deref(), Some("REFUNDED"));
}

#[tokio::test]
async fn test_merge_mode_drops_items_removed_from_a_sale() {
    let merge = "silver:\n  sales:\n    write_mode: merge\n";
    let fixture = Fixture::new().await;
    fixture
        .ingest(vec![sale(
            "S1", "SYD01", Some("1"), 2, Some(100), "COMPLETED", &line_items(&[10.0, 20.0]),
        )])
        .await;
    fixture.run(Stage::All, merge).await.unwrap();
    assert_eq!(fixture.items().await.len(), 2);

    fixture
        .ingest(vec![sale(
            "S1", "SYD01", Some("1"), 2, Some(200), "COMPLETED", &line_items(&[10.0]),
        )])
        .await;
    let report = fixture.run(Stage::All, merge).await.unwrap().silver.unwrap();
    match &report.items_write {
        WriteOutcome::Merged(outcome @ MergeOutcome::Committed { .. }) => assert_eq!(
            outcome.stats(),
            MergeStats {
                inserted: 0,
                updated: 0,
                unchanged: 1,
                deleted: 1,
            }
        ),
        other => panic!("expected a merge commit, got {other:?}"),
    }

    let items: Vec<(String, Option<f64>)> = fixture
        .items()
        .await
        .into_iter()
        .map(|item| (item.id, item.product_cost))
        .collect();
    assert_eq!(items, vec![("S1-0".to_string(), Some(10.0))]);

    let gold = fixture.country_sales().await;
    assert_eq!(gold.len(), 1);
    assert_eq!(gold[0].total_sales, Some(10.0));
}

#[tokio::test]
async fn test_merge_and_overwrite_modes_agree() {
    let merge = "silver:\n  sales:\n    write_mode: merge\n";
    let history = vec![
        vec![
            sale("S1", "SYD01", Some("1"), 2, Some(100), "PENDING", &line_items(&[10.0, 20.0, 5.0])),
            sale("S2", "AKL01", Some("5"), 4, Some(100), "COMPLETED", &line_items(&[7.5])),
        ],
        vec![
            // Fewer items, a payload turning malformed and a new sale
            sale("S1", "SYD01", Some("1"), 2, Some(200), "COMPLETED", &line_items(&[10.0])),
            sale("S2", "AKL01", Some("5"), 4, Some(200), "COMPLETED", "{\"id\": \"P0\"}"),
            sale("S3", "MEL01", Some("11"), 6, Some(200), "COMPLETED", &line_items(&[4.0, 6.0])),
        ],
        vec![
            sale("S2", "AKL01", Some("5"), 4, Some(300), "COMPLETED", &line_items(&[8.0, 1.0])),
            sale("S3", "MEL01", Some("11"), 6, Some(300), "COMPLETED", "[]"),
        ],
    ];

    let replaced = Fixture::new().await;
    let merged = Fixture::new().await;
    for batch in history {
        replaced.ingest(batch.clone()).await;
        merged.ingest(batch).await;
        replaced.run(Stage::All, "").await.unwrap();
        merged.run(Stage::All, merge).await.unwrap();

        assert_eq!(merged.sales().await, replaced.sales().await);
        assert_eq!(merged.items().await, replaced.items().await);
        assert_eq!(merged.country_sales().await, replaced.country_sales().await);
    }

    let ids: Vec<String> = merged.items().await.into_iter().map(|i| i.id).collect();
    assert_eq!(ids, vec!["S1-0", "S2-0", "S2-1"]);
}

#[tokio::test]
async fn test_gold_without_silver_fails() {
    let fixture = Fixture::new().await;
    let err = fixture.run(Stage::Gold, "").await.unwrap_err();
    assert!(matches!(err, RefineError::Table { .. }));
}

#[tokio::test]
async fn test_raw_table_without_key_column_fails() {
    let fixture = Fixture::new().await;
    fixture
        .catalog
        .table("sales_raw")
        .unwrap()
        .overwrite(
            &TableSchema::of(&[("sale", ColumnType::String)]),
            &rows(vec![json!({"sale": "S1"})]),
        )
        .await
        .unwrap();

    let err = fixture.run(Stage::Silver, "").await.unwrap_err();
    assert!(matches!(
        err,
        RefineError::MissingColumn { ref column, .. } if column == "SaleID"
    ));
}

#[tokio::test]
async fn test_cancelled_run_skips_gold() {
    let fixture = Fixture::new().await;
    let (first, _) = standard_sales();
    fixture.ingest(first).await;

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let report = Refinery::new(fixture.catalog.clone(), fixture.config(""))
        .unwrap()
        .run(Stage::All, &shutdown)
        .await
        .unwrap();

    assert!(report.silver.is_some());
    assert!(report.gold.is_none());
    assert!(!fixture
        .catalog
        .table("gold_country_sales")
        .unwrap()
        .exists()
        .await
        .unwrap());
}
