use cucumber::World;
use log::*;
use settlement_engine::{
    test_utils::{
        fixtures::{seed_marketplace, test_secrets, Marketplace},
        prepare_env::{prepare_test_env, random_db_path},
    },
    NotificationQueue,
    SettlementApi,
    SettlementError,
    SqliteDatabase,
    WebhookOutcome,
};

#[derive(Default, Debug, World)]
pub struct SettlementWorld {
    pub system: Option<SettlementSystem>,
    pub last_outcome: Option<Result<WebhookOutcome, SettlementError>>,
}

pub struct SettlementSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub queue: NotificationQueue,
    pub market: Marketplace,
    pub api: SettlementApi<SqliteDatabase>,
}

impl std::fmt::Debug for SettlementSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementSystem ({})", self.db_path)
    }
}

impl SettlementWorld {
    pub fn system(&self) -> &SettlementSystem {
        self.system.as_ref().expect("Settlement system not initialised")
    }

    pub fn api(&self) -> &SettlementApi<SqliteDatabase> {
        &self.system().api
    }

    pub fn take_outcome(&mut self) -> Result<WebhookOutcome, SettlementError> {
        self.last_outcome.take().expect("No gateway callback has been processed")
    }
}

impl SettlementSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let market = seed_marketplace(&db).await;
        let queue = NotificationQueue::default();
        let api = SettlementApi::new(db.clone(), queue.clone(), test_secrets());
        Self { db_path: url, db, queue, market, api }
    }
}
