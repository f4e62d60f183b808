use branch_report_engine::*;
use serde_json::Value;

const DATE: &str = "2026-02-03";

const SALES: &str = "\
일자,거래처그룹1코드명,거래처코드,판매처명,창고명,품목코드,품목명_규격_,수량,중량,공급가액,합_계,품목그룹1코드,품목그룹3코드
2026-02-03,창원지사,C100,대한기계,창원,P1,MOBIL DELVAC 1300,2,400,\"900,000\",\"990,000\",CVL,FLA
2026-02-03,창원지사,C101,테크젠 주식회사,창원,P2,MOBIL DTE 25,1,200,\"450,000\",\"495,000\",IL,
2026-02-03,화성지사,C200,화성산업,화성,P3,MOBIL SHC 630,3,600,\"1,200,000\",\"1,320,000\",AA,
2026-02-02,창원지사,C100,대한기계,창원,P1,MOBIL DELVAC 1300,1,200,\"450,000\",\"495,000\",CVL,FLA
2026-02-03,본사,C900,본사고객,본사,P2,MOBIL DTE 25,5,1000,\"2,250,000\",\"2,475,000\",IL,
2026-01-15,화성지사,C200,화성산업,화성,P4,TOTAL QUARTZ,4,800,\"400,000\",\"440,000\",ZZ,
";

const PURCHASES: &str = "\
일자,거래처그룹1명,구매처명,창고명,품목코드,품목명,수량,중량,공급가액,합_계,품목그룹1코드,품목그룹3코드
2026-02-03,창원지사,모빌코리아윤활유(주),창원,P1,MOBIL DELVAC 1300,5,1000,\"2,000,000\",\"2,200,000\",CVL,FLA
2026-02-01,창원지사,모빌코리아윤활유(주),창원,P2,MOBIL DTE 25,10,2000,\"4,000,000\",\"4,400,000\",IL,
";

const INVENTORY: &str = "\
창고명,품목코드,품목명_규격_,재고수량
창원,P1,MOBIL DELVAC 1300,20
창원,P2,MOBIL DTE 25,9
화성,P3,MOBIL SHC 630,6
화성,P1,MOBIL DELVAC 1300,0
본사,P2,MOBIL DTE 25,50
";

const TRANSFERS: &str = "\
월_일,출고창고,입고창고,품목코드,수량,중량,품목그룹3코드
02-03,화성,창원,P1,1,200,FLA
02-04,창원,화성,P2,7,1400,
";

const PURCHASE_ORDERS: &str = "\
월_일,품명_및_규격,품목그룹1코드,합계,거래처명,창고명
02-03,MOBIL DELVAC 1300,CVL,\"1,000,000\",모빌코리아윤활유(주),창원
02-03,MOBIL DTE 25,IL,\"300,000\",모빌코리아윤활유(주),창원
02-03,SHELL OMALA,IL,\"999,999\",한국쉘석유,창원
02-02,MOBIL DTE 25,IL,\"5,000\",모빌코리아윤활유(주),화성
";

const DEPOSITS: &str = "\
전표번호,계좌,계정명,부서명,거래처코드,거래처명,금액
2026-02-03,우리-창원,외상매출금,창원지사,C100,대한기계,\"1,000\"
2026-02-03,신한카드,외상매출금,창원지사,C101,테크젠 주식회사,500
2026-02-02,우리-창원,외상매출금,창원지사,C100,대한기계,\"2,000\"
2026-02-03,기업-화성,외상매출금,화성지사,C200,화성산업,\"3,000\"
2026-02-03,우리-본사,미수금,본사,C900,본사고객,\"9,999\"
";

const NOTES: &str = "\
일자,증감구분,부서명,증가금액,감소금액,잔액
2026-02-03,증가,창원지사,300,0,300
2026-02-03,감소,화성지사,0,100,0
";

const LEDGER: &str = "\
id,일자_no_,계정명,거래처코드,거래처명,차변금액,대변금액,잔액
1,2026/02/01,보통예금,,,\"1,000,000\",0,\"5,000,000\"
2,2026/02/02,보통예금,,,0,\"200,000\",\"4,800,000\"
3,2026/02/03 -1,보통예금,,,\"300,000\",\"100,000\",\"5,000,000\"
4,2026/02/02,단기차입금,,,0,\"9,300,000\",\"9,300,000\"
5,2026/01/20,외상매출금,C100,대한기계,\"2,000\",0,\"2,000\"
6,2026/02/01,외상매출금,C100,대한기계,0,500,\"1,500\"
7,2026/02/03,외상매출금,C100,대한기계,\"990,000\",0,\"991,500\"
8,2026/01/31,외화예금(USD),,,\"211,342\",0,\"211,342\"
";

const EXPENSES: &str = "\
일자,계정명,부서명,금액
2026-02-03,소모품비,창원지사,\"50,000\"
";

const PENDING_SALES: &str = "\
품목코드,품명_및_규격,거래처명,잔량,공급가액,납기일자,적요
P2,MOBIL DTE 25,대한기계,4,\"1,800,000\",2026-02-10,분할납품
P1,MOBIL DELVAC 1300,화성산업,2,\"900,000\",2026-02-07,
";

const PENDING_PURCHASES: &str = "\
품목코드,품명_및_규격,거래처명,잔량,합계,납기일자,창고명
P1,MOBIL DELVAC 1300,모빌코리아윤활유(주),10,\"4,400,000\",2026-02-12,창원
";

fn load_csv(store: &mut InMemoryStore, relation: Relation, text: &str) -> anyhow::Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    for record in reader.records() {
        let record = record?;
        let mut row = SourceRow::new();
        for (column, value) in headers.iter().zip(record.iter()) {
            row.insert(column, value);
        }
        store.insert(relation, row);
    }
    Ok(())
}

fn fixture() -> anyhow::Result<InMemoryStore> {
    let mut store = InMemoryStore::new();
    load_csv(&mut store, Relation::Sales, SALES)?;
    load_csv(&mut store, Relation::Purchases, PURCHASES)?;
    load_csv(&mut store, Relation::Inventory, INVENTORY)?;
    load_csv(&mut store, Relation::InventoryTransfers, TRANSFERS)?;
    load_csv(&mut store, Relation::PurchaseOrders, PURCHASE_ORDERS)?;
    load_csv(&mut store, Relation::Deposits, DEPOSITS)?;
    load_csv(&mut store, Relation::PromissoryNotes, NOTES)?;
    load_csv(&mut store, Relation::Ledger, LEDGER)?;
    load_csv(&mut store, Relation::Expenses, EXPENSES)?;
    load_csv(&mut store, Relation::PendingSales, PENDING_SALES)?;
    load_csv(&mut store, Relation::PendingPurchases, PENDING_PURCHASES)?;
    Ok(store)
}

fn engine() -> anyhow::Result<ReportEngine<InMemoryStore>> {
    Ok(ReportEngine::new(fixture()?))
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_fixture_loads_every_relation() -> anyhow::Result<()> {
    let store = fixture()?;
    assert_eq!(store.len(Relation::Sales), 6);
    assert_eq!(store.len(Relation::Ledger), 8);
    assert_eq!(store.len(Relation::InternalUses), 0);
    assert!(!store.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_daily_collections_scenario() -> anyhow::Result<()> {
    let report = engine()?.daily_collections(DATE).await?;

    let branches: Vec<_> = report.data.iter().map(|r| r.branch.as_str()).collect();
    assert_eq!(branches, vec!["화성", "창원"]);

    let changwon = &report.data[1];
    assert_close(changwon.cash, 1_000.0);
    assert_close(changwon.card, 500.0);
    assert_close(changwon.notes, 300.0);
    assert_close(changwon.total_collection, 1_800.0);

    let hwaseong = &report.data[0];
    assert_close(hwaseong.cash, 3_000.0);
    assert_close(hwaseong.notes, 0.0);
    Ok(())
}

#[tokio::test]
async fn test_daily_inventory_identity() -> anyhow::Result<()> {
    let report = engine()?.daily_inventory(DATE).await?;
    assert_eq!(report.branches, vec!["창원".to_string(), "화성".to_string()]);

    let flagship = report.stats["창원"]["Auto_Flagship"];
    assert_close(flagship.inventory, 20.0);
    assert_close(flagship.purchase, 5.0);
    assert_close(flagship.sales, 2.0);
    assert_close(flagship.transfer, 1.0);
    assert_close(flagship.beginning, 16.0);

    let il = report.stats["창원"]["IL_Others"];
    assert_close(il.sales, 1.0);
    assert_close(il.beginning, 10.0);
    assert_close(il.transfer, 0.0);

    assert_close(report.stats["화성"]["Auto_Flagship"].transfer, -1.0);
    assert_close(report.stats["화성"]["Others_Others"].beginning, 9.0);
    Ok(())
}

#[tokio::test]
async fn test_daily_closing_for_changwon() -> anyhow::Result<()> {
    let report = engine()?.daily_closing(DATE, "창원").await?;
    assert_eq!(report.division, "창원");

    let categories: Vec<_> = report.sales_data.iter().map(|r| r.category.as_str()).collect();
    assert_eq!(
        categories,
        vec!["Mobil", "Mobil-MB", "블라자", "훅스", "기타(셸 외 타사제품)"]
    );

    let mobil = &report.sales_data[0];
    assert_close(mobil.prev_total, 495_000.0);
    assert_close(mobil.today, 1_485_000.0);
    assert_close(mobil.total, 1_980_000.0);
    assert_eq!(mobil.remarks, "3.00 D/M");
    assert_eq!(report.sales_data[3].remarks, "-");

    let methods: Vec<_> = report
        .collection_data
        .iter()
        .map(|r| (r.method.as_str(), r.prev_total, r.today))
        .collect();
    assert_eq!(
        methods,
        vec![("Cash", 2_000.0, 1_000.0), ("어음", 0.0, 300.0), ("카드", 0.0, 500.0)]
    );

    let stock = &report.inventory_data[0];
    assert_eq!(stock.category, "Mobil");
    assert_close(stock.prev_stock, 9.0);
    assert_close(stock.inflow, 5.0);
    assert_close(stock.outflow, 3.0);
    assert_close(stock.stock, 11.0);

    assert_close(report.flagship.sales_vol, 400.0);
    assert_close(report.flagship.purchase_vol, 1_000.0);
    Ok(())
}

#[tokio::test]
async fn test_daily_sales_and_misc_footnote() -> anyhow::Result<()> {
    let report = engine()?.daily_sales(DATE).await?;

    let changwon = &report.data[0];
    assert_eq!(changwon.branch, "창원");
    assert_close(changwon.total_sales, 1_485_000.0);
    assert_close(changwon.mobil_sales_amount, 1_350_000.0);
    assert_close(changwon.mobil_sales_weight, 600.0);
    assert_close(changwon.flagship_sales_weight, 400.0);
    assert_close(changwon.mobil_purchase_weight, 1_000.0);
    assert_close(changwon.flagship_purchase_weight, 1_000.0);

    let hwaseong = &report.data[1];
    assert_eq!(hwaseong.branch, "화성");
    assert_close(hwaseong.mobil_sales_amount, 0.0);

    assert_eq!(report.misc_mobil.count, 1);
    assert_close(report.misc_mobil.amount, 1_200_000.0);
    assert_close(report.misc_mobil.weight, 600.0);
    Ok(())
}

#[tokio::test]
async fn test_mobil_payments_for_day() -> anyhow::Result<()> {
    let report = engine()?.mobil_payments(DATE).await?;
    assert_eq!(report.data.len(), 1);
    let row = &report.data[0];
    assert_eq!(row.branch, "창원");
    assert_eq!(row.industry_group, "AUTO");
    assert_close(row.amounts["auto"], 1_000_000.0);
    assert_close(row.amounts["il"], 300_000.0);
    assert_close(row.total, 1_300_000.0);
    Ok(())
}

#[tokio::test]
async fn test_funds_balances_and_flows() -> anyhow::Result<()> {
    let report = engine()?.funds(DATE).await?;

    let deposits = &report.krw[0];
    assert_eq!(deposits.category, "보통예금");
    assert_close(deposits.prev, 4_800_000.0);
    assert_close(deposits.inc, 300_000.0);
    assert_close(deposits.dec, 100_000.0);
    assert_close(deposits.current, 5_000_000.0);

    let notes = &report.krw[1];
    assert_eq!(notes.category, "받을어음");
    assert_close(notes.inc, 300.0);
    assert_close(notes.dec, 100.0);

    let loan = report
        .loans
        .iter()
        .find(|l| l.category == "단기차입금")
        .expect("loan line");
    assert_close(loan.prev, 9_300_000.0);
    assert_close(loan.current, 9_300_000.0);
    assert_close(loan.inc, 0.0);

    let usd = report
        .foreign
        .iter()
        .find(|l| l.category == "외화예금 (USD)")
        .expect("usd line");
    assert_close(usd.current, 211_342.0);
    assert_eq!(usd.currency.as_deref(), Some("USD"));
    assert!(report.foreign.iter().any(|l| l.category == "외화예금 (GBP)"));

    match report.verify(0.5) {
        Err(ReportError::BalanceMismatch { account, .. }) => assert_eq!(account, "받을어음"),
        other => panic!("expected the notes fallback to fail the cross-check, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_customer_detail_for_changwon() -> anyhow::Result<()> {
    let report = engine()?.customer_detail(DATE, "창원").await?;
    assert_eq!(report.data.len(), 2);

    let first = &report.data[0];
    assert_eq!(first.customer, "대한기계");
    assert_close(first.prev_balance, 1_500.0);
    assert_close(first.sales_amount, 990_000.0);
    assert_close(first.collection_amount, 1_000.0);
    assert_close(first.current_balance, 990_500.0);

    let second = &report.data[1];
    assert_eq!(second.customer, "테크젠 주식회사");
    assert_close(second.current_balance, 494_500.0);
    Ok(())
}

#[tokio::test]
async fn test_stock_overview_filters() -> anyhow::Result<()> {
    let report = engine()?.stock_overview("창원", Some("2026-02")).await?;

    let sold: Vec<_> = report
        .sales_by_item
        .iter()
        .map(|r| (r.item_code.as_str(), r.sold_qty))
        .collect();
    assert_eq!(sold, vec![("P1", 3.0), ("P2", 1.0)]);

    assert_eq!(report.inventory_by_item.len(), 4);
    assert_eq!(report.warehouses, vec!["본사", "창원", "화성"]);
    assert_eq!(report.divisions, vec!["창원", "화성"]);
    assert_eq!(report.months, vec!["2026-02", "2026-01"]);
    assert_eq!(report.pending_sales[0].item_code, "P1");
    assert_eq!(report.pending_sales[1].memo, "분할납품");
    assert_close(report.pending_purchases[0].outstanding_total, 4_400_000.0);
    Ok(())
}

#[tokio::test]
async fn test_monthly_reports_cover_the_year() -> anyhow::Result<()> {
    let engine = engine()?;
    let collections = engine.monthly_collections("2026").await?;
    let keys: Vec<_> = collections
        .data
        .iter()
        .map(|r| (r.month.as_str(), r.row.branch.as_str(), r.row.total_collection))
        .collect();
    assert_eq!(keys, vec![("2026-02", "창원", 3_800.0), ("2026-02", "화성", 3_000.0)]);

    let sales = engine.monthly_sales("2026").await?;
    let keys: Vec<_> = sales
        .data
        .iter()
        .map(|r| (r.month.as_str(), r.row.branch.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![("2026-01", "화성"), ("2026-02", "창원"), ("2026-02", "화성")]
    );
    assert_eq!(sales.misc_mobil.count, 1);
    Ok(())
}

/// Reports that look at the same rows through different lenses must agree on branch totals.
#[tokio::test]
async fn test_branch_totals_reconcile_across_reports() -> anyhow::Result<()> {
    let engine = engine()?;

    let daily = engine.daily_collections(DATE).await?;
    let closing = engine.daily_closing(DATE, "창원").await?;
    let changwon_daily = daily
        .data
        .iter()
        .find(|r| r.branch == "창원")
        .expect("창원 collections");
    let closing_today: f64 = closing.collection_data.iter().map(|r| r.today).sum();
    assert_close(changwon_daily.total_collection, closing_today);

    let previous = engine.daily_collections("2026-02-02").await?;
    let monthly = engine.monthly_collections("2026").await?;
    for row in monthly.data.iter().filter(|r| r.month == "2026-02") {
        let per_day: f64 = [&daily, &previous]
            .iter()
            .flat_map(|report| report.data.iter())
            .filter(|r| r.branch == row.row.branch)
            .map(|r| r.total_collection)
            .sum();
        assert_close(row.row.total_collection, per_day);
    }

    let sales_today = engine.daily_sales(DATE).await?;
    let sales_before = engine.daily_sales("2026-02-02").await?;
    let monthly_sales = engine.monthly_sales("2026").await?;
    for row in monthly_sales.data.iter().filter(|r| r.month == "2026-02") {
        let per_day: f64 = sales_today
            .data
            .iter()
            .chain(&sales_before.data)
            .filter(|r| r.branch == row.row.branch)
            .map(|r| r.total_sales)
            .sum();
        assert_close(row.row.total_sales, per_day);
    }

    let whole = engine.daily_closing(DATE, "전체").await?;
    let closing_sales: f64 = whole.sales_data.iter().map(|r| r.today).sum();
    let status_sales: f64 = sales_today.data.iter().map(|r| r.total_sales).sum();
    assert_close(closing_sales, status_sales);
    Ok(())
}

#[tokio::test]
async fn test_every_report_responds_successfully() -> anyhow::Result<()> {
    let engine = engine()?;
    for kind in ReportKind::ALL {
        let params = ReportParams::on(DATE).with_division("창원");
        let response = engine.respond(&ReportRequest::new(kind, params)).await;
        assert!(response.success, "{} failed: {:?}", kind.name(), response.error);
        assert_eq!(response.status_code(), 200);

        let json: Value = serde_json::from_str(&response.to_json()?)?;
        assert_eq!(json["success"], Value::Bool(true));
        assert!(json.get("error").is_none());
    }
    Ok(())
}

#[tokio::test]
async fn test_closing_payload_shape() -> anyhow::Result<()> {
    let request = ReportRequest::new(
        ReportKind::DailyClosing,
        ReportParams::on(DATE).with_division("창원"),
    );
    let response = run_default_report(fixture()?, &request).await;
    let json: Value = serde_json::from_str(&response.to_json()?)?;

    assert_eq!(json["success"], Value::Bool(true));
    assert_eq!(json["salesData"][0]["category"], "Mobil");
    assert_eq!(json["collectionData"][1]["method"], "어음");
    assert_eq!(json["inventoryData"][0]["unit"], "D/M");
    assert_eq!(json["inventoryData"][0]["in"], 5.0);
    assert_eq!(json["flagship"]["salesVol"], 400.0);
    assert_eq!(json["division"], "창원");
    Ok(())
}

#[tokio::test]
async fn test_failed_read_fails_whole_report() -> anyhow::Result<()> {
    let store = FailingStore::new(fixture()?, vec![Relation::PromissoryNotes]);
    let engine = ReportEngine::new(store);
    let request = ReportRequest::new(ReportKind::DailyCollections, ReportParams::on(DATE));

    let response = engine.respond(&request).await;
    assert!(!response.success);
    assert_eq!(response.status_code(), 500);
    assert!(response.data.is_none());

    let json: Value = serde_json::from_str(&response.to_json()?)?;
    assert_eq!(json["success"], Value::Bool(false));
    assert!(json["error"]
        .as_str()
        .unwrap_or_default()
        .contains("promissory_notes"));
    assert!(json.get("data").is_none());
    Ok(())
}

#[tokio::test]
async fn test_invalid_year_is_rejected() -> anyhow::Result<()> {
    let request = ReportRequest::new(ReportKind::MonthlySales, ReportParams::for_year("26"));
    let response = run_default_report(fixture()?, &request).await;
    assert!(!response.success);
    assert_eq!(response.status_code(), 400);
    Ok(())
}

#[tokio::test]
async fn test_custom_rules_apply_to_every_report() -> anyhow::Result<()> {
    let mut rules = RuleTables::default();
    rules.collection.card_markers.clear();

    let request = ReportRequest::new(ReportKind::DailyCollections, ReportParams::on(DATE));
    let response = run_report(fixture()?, rules, &request).await;
    match response.data {
        Some(ReportPayload::DailyCollections(report)) => {
            let changwon = report
                .data
                .iter()
                .find(|r| r.branch == "창원")
                .expect("창원 collections");
            assert_close(changwon.cash, 1_500.0);
            assert_close(changwon.card, 0.0);
            assert_close(changwon.total_collection, 1_800.0);
        }
        other => panic!("unexpected payload {:?}", other),
    }

    let mut broken = RuleTables::default();
    broken.kg_per_drum = 0.0;
    let response = run_report(fixture()?, broken, &request).await;
    assert!(!response.success);
    Ok(())
}

#[test]
fn test_rule_schema_generation() -> anyhow::Result<()> {
    let schema = RuleTables::schema_as_json()?;
    assert!(schema.contains("kg_per_drum"));
    let round_trip = RuleTables::from_json_str(&serde_json::to_string(&RuleTables::default())?)?;
    assert_eq!(round_trip.version, RuleTables::default().version);
    Ok(())
}
