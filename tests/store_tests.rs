mod common;

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use shelfkeeper::auth::tokens;
use shelfkeeper::config::ReportSchedule;
use shelfkeeper::db;
use shelfkeeper::db::books::BookInput;
use shelfkeeper::error::AppError;
use shelfkeeper::inventory;
use shelfkeeper::email::Notification;
use shelfkeeper::reports::{self, Delivery};
use shelfkeeper::scheduler;
use tokio::sync::watch;
use uuid::Uuid;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

async fn seed_user(app: &common::TestApp, email: &str) -> Uuid {
    db::users::create(&app.pool, "Reader", email, "not-a-real-hash")
        .await
        .unwrap()
        .id
}

async fn seed_book(app: &common::TestApp, name: &str, total: i32) -> Uuid {
    let input = BookInput {
        name,
        description: "A book",
        genre_id: None,
        inventory_total_qty: total,
    };
    db::books::create(&app.pool, &input).await.unwrap().id
}

async fn seed_checkout(
    app: &common::TestApp,
    user_id: Uuid,
    book_id: Uuid,
    due: &str,
    returned: Option<&str>,
) -> Uuid {
    let checkout = db::checkouts::create(&app.pool, date("2024-05-01"), date(due))
        .await
        .unwrap();
    db::checkouts::link(&app.pool, user_id, book_id, checkout.id)
        .await
        .unwrap();
    if let Some(returned) = returned {
        db::checkouts::close(&app.pool, checkout.id, date(returned))
            .await
            .unwrap();
    }
    checkout.id
}

// ── Token Store ─────────────────────────────────────────────────

#[tokio::test]
async fn issued_token_resolves_until_revoked() {
    let app = common::spawn_app().await;
    let user_id = seed_user(&app, "ada@test.com").await;

    let issued = tokens::issue(&app.pool, user_id, "api", &["*".to_string()], None)
        .await
        .unwrap();
    let resolved = tokens::resolve(&app.pool, &issued.plaintext).await.unwrap().unwrap();
    assert_eq!(resolved.id, issued.token.id);
    assert_eq!(resolved.user_id, user_id);

    tokens::revoke(&app.pool, issued.token.id).await.unwrap();
    assert!(tokens::resolve(&app.pool, &issued.plaintext).await.unwrap().is_none());

    // Revoking twice is fine
    tokens::revoke(&app.pool, issued.token.id).await.unwrap();

    common::cleanup(app).await;
}

#[tokio::test]
async fn revoke_all_removes_every_session() {
    let app = common::spawn_app().await;
    let user_id = seed_user(&app, "ada@test.com").await;
    let other = seed_user(&app, "bob@test.com").await;

    for _ in 0..3 {
        tokens::issue(&app.pool, user_id, "api", &[], None).await.unwrap();
    }
    tokens::issue(&app.pool, other, "api", &[], None).await.unwrap();

    assert_eq!(tokens::revoke_all(&app.pool, user_id).await.unwrap(), 3);
    assert_eq!(db::tokens::count_for_user(&app.pool, user_id).await.unwrap(), 0);
    assert_eq!(db::tokens::count_for_user(&app.pool, other).await.unwrap(), 1);

    common::cleanup(app).await;
}

#[tokio::test]
async fn expired_token_still_resolves() {
    let app = common::spawn_app().await;
    let user_id = seed_user(&app, "ada@test.com").await;

    let expired_at = Utc::now() - chrono::Duration::minutes(1);
    let issued = tokens::issue(&app.pool, user_id, "api", &[], Some(expired_at))
        .await
        .unwrap();

    let resolved = tokens::resolve(&app.pool, &issued.plaintext).await.unwrap().unwrap();
    assert!(resolved.is_expired_at(Utc::now()));

    common::cleanup(app).await;
}

// ── Inventory Ledger ────────────────────────────────────────────

#[tokio::test]
async fn ledger_holds_between_zero_and_total() {
    let app = common::spawn_app().await;
    let book_id = seed_book(&app, "Dune", 2).await;

    let mut conn = app.pool.acquire().await.unwrap();
    assert_eq!(inventory::checkout(&mut conn, book_id, 2).await.unwrap().checked_qty, 2);
    assert!(matches!(
        inventory::checkout(&mut conn, book_id, 1).await,
        Err(AppError::InventoryExceeded)
    ));
    assert_eq!(inventory::checkin(&mut conn, book_id, 2).await.unwrap().checked_qty, 0);
    assert!(matches!(
        inventory::checkin(&mut conn, book_id, 1).await,
        Err(AppError::NothingToReturn)
    ));
    assert!(matches!(
        inventory::checkout(&mut conn, Uuid::now_v7(), 1).await,
        Err(AppError::NotFound(_))
    ));

    common::cleanup(app).await;
}

#[tokio::test]
async fn database_rejects_out_of_range_counts() {
    let app = common::spawn_app().await;
    let book_id = seed_book(&app, "Dune", 2).await;

    assert!(db::books::set_checked_qty(&app.pool, book_id, 3).await.is_err());
    assert!(db::books::set_checked_qty(&app.pool, book_id, -1).await.is_err());

    common::cleanup(app).await;
}

// ── Reporting ───────────────────────────────────────────────────

#[tokio::test]
async fn find_overdue_as_of_date() {
    let app = common::spawn_app().await;
    let ada = seed_user(&app, "ada@test.com").await;
    let bob = seed_user(&app, "bob@test.com").await;
    let dune = seed_book(&app, "Dune", 5).await;
    let emma = seed_book(&app, "Emma", 5).await;

    let late = seed_checkout(&app, ada, dune, "2024-05-20", None).await;
    let due_today = seed_checkout(&app, bob, emma, "2024-06-01", None).await;
    seed_checkout(&app, ada, emma, "2024-06-02", None).await;
    seed_checkout(&app, bob, dune, "2024-05-10", Some("2024-05-09")).await;

    let overdue = reports::find_overdue(&app.pool, date("2024-06-01")).await.unwrap();
    let ids: Vec<Uuid> = overdue.iter().map(|c| c.checkout_id).collect();
    assert_eq!(ids, vec![late, due_today]);
    assert_eq!(overdue[0].user_email, "ada@test.com");
    assert_eq!(overdue[0].book_name, "Dune");
    assert_eq!(overdue[0].days_overdue(date("2024-06-01")), 12);

    // Running the query again yields the same rows
    let again = reports::find_overdue(&app.pool, date("2024-06-01")).await.unwrap();
    assert_eq!(again.len(), 2);

    common::cleanup(app).await;
}

#[tokio::test]
async fn overdue_report_goes_to_notifier() {
    let app = common::spawn_app().await;
    let ada = seed_user(&app, "ada@test.com").await;
    let dune = seed_book(&app, "Dune", 1).await;
    seed_checkout(&app, ada, dune, "2024-05-20", None).await;

    let outcome = reports::send_overdue_report(
        &app.pool,
        app.notifier.as_ref(),
        "librarian@test.com",
        date("2024-06-01"),
    )
    .await
    .unwrap();
    assert_eq!(outcome.delivery, Delivery::Sent);
    assert_eq!(app.notifier.sent()[0].0, vec!["librarian@test.com".to_string()]);

    app.notifier.set_failing(true);
    let outcome = reports::send_overdue_report(
        &app.pool,
        app.notifier.as_ref(),
        "librarian@test.com",
        date("2024-06-01"),
    )
    .await
    .unwrap();
    assert!(matches!(outcome.delivery, Delivery::Failed(_)));
    assert_eq!(outcome.overdue.len(), 1);

    let outcome = reports::send_overdue_report(
        &app.pool,
        app.notifier.as_ref(),
        "librarian@test.com",
        date("2024-05-01"),
    )
    .await
    .unwrap();
    assert_eq!(outcome.delivery, Delivery::NothingOverdue);

    common::cleanup(app).await;
}

// ── Report schedule ─────────────────────────────────────────────

#[tokio::test]
async fn scheduled_report_runs_until_shutdown() {
    let app = common::spawn_app().await;
    let ada = seed_user(&app, "ada@test.com").await;
    let dune = seed_book(&app, "Dune", 1).await;
    seed_checkout(&app, ada, dune, "2024-05-20", None).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let schedule = ReportSchedule {
        interval: Duration::from_millis(200),
        recipient: "librarian@test.com".to_string(),
    };
    let handle = scheduler::spawn(app.state.clone(), schedule, shutdown_rx);

    let mut waited = Duration::ZERO;
    while app.notifier.sent().is_empty() && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }

    let sent = app.notifier.sent();
    assert!(!sent.is_empty(), "no report within 5s");
    assert_eq!(sent[0].0, vec!["librarian@test.com".to_string()]);
    match &sent[0].1 {
        Notification::OverdueReport { checkouts, .. } => {
            assert_eq!(checkouts.len(), 1);
            assert_eq!(checkouts[0].user_email, "ada@test.com");
        }
        other => panic!("unexpected notification {other:?}"),
    }

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    // Nothing more goes out once stopped
    let count = app.notifier.sent().len();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(app.notifier.sent().len(), count);

    common::cleanup(app).await;
}

#[tokio::test]
async fn scheduler_stops_before_first_tick() {
    let app = common::spawn_app().await;
    let ada = seed_user(&app, "ada@test.com").await;
    let dune = seed_book(&app, "Dune", 1).await;
    seed_checkout(&app, ada, dune, "2024-05-20", None).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let schedule = ReportSchedule {
        interval: Duration::from_secs(3600),
        recipient: "librarian@test.com".to_string(),
    };
    let handle = scheduler::spawn(app.state.clone(), schedule, shutdown_rx);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert!(app.notifier.sent().is_empty());

    common::cleanup(app).await;
}
