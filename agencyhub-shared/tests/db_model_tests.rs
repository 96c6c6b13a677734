/// Model behavior that depends on PostgreSQL constraints and locking
///
/// Ignored by default; see `db_pool_tests.rs` for how to run them.

use agencyhub_shared::auth::authorization::{change_member_role, remove_member, AuthzError};
use agencyhub_shared::db::migrations::run_migrations;
use agencyhub_shared::models::{
    billing::{BillingError, LineItem, MAX_UNIT_PRICE_CENTS},
    client::{Client, CreateClient},
    invoice::{CreateInvoice, Invoice},
    membership::{CreateMembership, MemberRole, Membership},
    organization::{CreateOrganization, Organization},
    quotation::{CreateQuotation, Quotation, QuotationError, QuotationStatus},
    task::{CreateTask, Task},
    project::{CreateProject, Project},
    time_log::{TimeLog, TimerError},
    user::{CreateUser, User},
};
use sqlx::PgPool;
use uuid::Uuid;

struct Fixture {
    pool: PgPool,
    organization_id: Uuid,
    user_id: Uuid,
    client_id: Uuid,
}

impl Fixture {
    async fn new() -> Self {
        dotenvy::dotenv().ok();
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.expect("connect");
        run_migrations(&pool).await.expect("migrations");

        let organization = Organization::create(
            &pool,
            CreateOrganization {
                name: "Fixture Studio".to_string(),
                settings: None,
            },
        )
        .await
        .expect("organization");
        let user = User::create(
            &pool,
            CreateUser {
                email: format!("fixture-{}@agency.test", Uuid::new_v4()),
                ..Default::default()
            },
        )
        .await
        .expect("user");
        Membership::create(
            &pool,
            CreateMembership {
                organization_id: organization.id,
                user_id: user.id,
                role: MemberRole::Owner,
            },
        )
        .await
        .expect("membership");
        let client = Client::create(
            &pool,
            organization.id,
            CreateClient {
                name: "Fixture Client".to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("client");

        Fixture {
            pool,
            organization_id: organization.id,
            user_id: user.id,
            client_id: client.id,
        }
    }

    async fn task(&self) -> Task {
        let project = Project::create(
            &self.pool,
            self.organization_id,
            self.user_id,
            CreateProject {
                name: "Fixture Project".to_string(),
                client_id: Some(self.client_id),
                ..Default::default()
            },
        )
        .await
        .expect("project");

        Task::create(
            &self.pool,
            self.organization_id,
            self.user_id,
            CreateTask {
                project_id: project.id,
                title: "Fixture Task".to_string(),
                description: None,
                status: None,
                priority: None,
                assignee_id: None,
                due_date: None,
                estimated_minutes: None,
            },
        )
        .await
        .expect("task")
    }

    async fn accepted_quotation(&self) -> Quotation {
        let quotation = Quotation::create(
            &self.pool,
            self.organization_id,
            self.user_id,
            CreateQuotation {
                client_id: self.client_id,
                quotation_number: None,
                title: "Brand identity".to_string(),
                description: None,
                valid_until: None,
                items: vec![line_item(3.0, 10_000)],
                tax_rate_bps: 0,
            },
        )
        .await
        .expect("quotation");

        for next in [QuotationStatus::Sent, QuotationStatus::Accepted] {
            Quotation::update_status(&self.pool, self.organization_id, quotation.id, next)
                .await
                .expect("status change");
        }
        Quotation::find(&self.pool, self.organization_id, quotation.id)
            .await
            .expect("find")
            .expect("quotation exists")
    }

    /// A second owner, returned so the test can delete the account
    async fn second_owner(&self) -> Uuid {
        let user = User::create(
            &self.pool,
            CreateUser {
                email: format!("co-owner-{}@agency.test", Uuid::new_v4()),
                ..Default::default()
            },
        )
        .await
        .expect("user");
        Membership::create(
            &self.pool,
            CreateMembership {
                organization_id: self.organization_id,
                user_id: user.id,
                role: MemberRole::Owner,
            },
        )
        .await
        .expect("membership");
        user.id
    }

    async fn owner_ids(&self) -> Vec<Uuid> {
        sqlx::query_scalar(
            "SELECT user_id FROM memberships WHERE organization_id = $1 AND role = 'owner'",
        )
        .bind(self.organization_id)
        .fetch_all(&self.pool)
        .await
        .expect("owners")
    }

    async fn delete_user(&self, user_id: Uuid) {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .expect("cleanup user");
    }

    async fn cleanup(self) {
        sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(self.organization_id)
            .execute(&self.pool)
            .await
            .expect("cleanup organization");
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(self.user_id)
            .execute(&self.pool)
            .await
            .expect("cleanup user");
    }
}

fn line_item(quantity: f64, unit_price_cents: i64) -> LineItem {
    LineItem {
        description: "Design work".to_string(),
        quantity,
        unit_price_cents,
    }
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_one_running_timer_per_user_and_task() {
    let fx = Fixture::new().await;
    let task = fx.task().await;

    TimeLog::start(&fx.pool, fx.organization_id, task.id, fx.user_id, None)
        .await
        .expect("first start");
    let second = TimeLog::start(&fx.pool, fx.organization_id, task.id, fx.user_id, None).await;
    assert!(matches!(second, Err(TimerError::AlreadyRunning)));

    let stopped = TimeLog::stop(&fx.pool, fx.organization_id, task.id, fx.user_id)
        .await
        .expect("stop");
    let stopped = stopped.expect("a running timer");
    assert!(stopped.end_time.is_some());
    assert!(stopped.duration_seconds.unwrap_or(-1) >= 0);

    let again = TimeLog::stop(&fx.pool, fx.organization_id, task.id, fx.user_id)
        .await
        .expect("stop");
    assert!(again.is_none());

    fx.cleanup().await;
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_concurrent_conversions_create_one_project() {
    let fx = Fixture::new().await;
    let quotation = fx.accepted_quotation().await;

    let (a, b) = tokio::join!(
        Quotation::convert_to_project(&fx.pool, fx.organization_id, quotation.id, fx.user_id),
        Quotation::convert_to_project(&fx.pool, fx.organization_id, quotation.id, fx.user_id),
    );

    let (ok, err) = match (a, b) {
        (Ok(pair), Err(e)) | (Err(e), Ok(pair)) => (pair, e),
        other => panic!("expected exactly one conversion, got {other:?}"),
    };
    assert!(matches!(err, QuotationError::AlreadyConverted));

    let (converted, project) = ok;
    assert_eq!(converted.status, QuotationStatus::Converted);
    assert_eq!(converted.project_id, Some(project.id));
    assert_eq!(project.budget_cents, Some(30_000));

    fx.cleanup().await;
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_records_are_scoped_to_their_organization() {
    let fx = Fixture::new().await;
    let other = Uuid::new_v4();

    assert!(Client::find(&fx.pool, fx.organization_id, fx.client_id)
        .await
        .expect("find")
        .is_some());
    assert!(Client::find(&fx.pool, other, fx.client_id)
        .await
        .expect("find")
        .is_none());
    assert!(!Client::soft_delete(&fx.pool, other, fx.client_id)
        .await
        .expect("delete"));

    fx.cleanup().await;
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_invoice_numbers_are_sequential() {
    let fx = Fixture::new().await;

    let create = || CreateInvoice {
        client_id: fx.client_id,
        project_id: None,
        invoice_number: None,
        status: None,
        issue_date: None,
        due_date: None,
        items: vec![line_item(1.5, 999)],
        tax_rate_bps: 1_000,
        notes: None,
    };

    let first = Invoice::create(&fx.pool, fx.organization_id, fx.user_id, create())
        .await
        .expect("first invoice");
    let second = Invoice::create(&fx.pool, fx.organization_id, fx.user_id, create())
        .await
        .expect("second invoice");

    assert_ne!(first.invoice_number, second.invoice_number);
    assert!(first.invoice_number < second.invoice_number);
    assert_eq!(first.subtotal_cents, 1_499);
    assert_eq!(first.tax_cents, 150);
    assert_eq!(first.total_cents, 1_649);

    fx.cleanup().await;
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_owners_removing_each_other_keep_one_owner() {
    let fx = Fixture::new().await;
    let co_owner = fx.second_owner().await;

    let (a, b) = tokio::join!(
        remove_member(&fx.pool, fx.organization_id, co_owner),
        remove_member(&fx.pool, fx.organization_id, fx.user_id),
    );

    let err = match (a, b) {
        (Ok(true), Err(e)) | (Err(e), Ok(true)) => e,
        other => panic!("expected exactly one removal, got {other:?}"),
    };
    assert!(matches!(err, AuthzError::LastOwner));
    assert_eq!(fx.owner_ids().await.len(), 1);

    fx.delete_user(co_owner).await;
    fx.cleanup().await;
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_owners_demoting_each_other_keep_one_owner() {
    let fx = Fixture::new().await;
    let co_owner = fx.second_owner().await;

    let (a, b) = tokio::join!(
        change_member_role(&fx.pool, fx.organization_id, co_owner, MemberRole::Admin),
        change_member_role(&fx.pool, fx.organization_id, fx.user_id, MemberRole::Admin),
    );

    let err = match (a, b) {
        (Ok(Some(_)), Err(e)) | (Err(e), Ok(Some(_))) => e,
        other => panic!("expected exactly one demotion, got {other:?}"),
    };
    assert!(matches!(err, AuthzError::LastOwner));
    assert_eq!(fx.owner_ids().await.len(), 1);

    fx.delete_user(co_owner).await;
    fx.cleanup().await;
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_oversized_invoice_is_rejected_before_insert() {
    let fx = Fixture::new().await;

    let result = Invoice::create(
        &fx.pool,
        fx.organization_id,
        fx.user_id,
        CreateInvoice {
            client_id: fx.client_id,
            project_id: None,
            invoice_number: None,
            status: None,
            issue_date: None,
            due_date: None,
            items: vec![line_item(1_000_000.0, MAX_UNIT_PRICE_CENTS); 100],
            tax_rate_bps: 0,
            notes: None,
        },
    )
    .await;
    assert!(matches!(result, Err(BillingError::AmountTooLarge)));

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE organization_id = $1")
        .bind(fx.organization_id)
        .fetch_one(&fx.pool)
        .await
        .expect("count");
    assert_eq!(stored, 0);

    fx.cleanup().await;
}
