use crate::store::{
    EVALUATIONS_COLLECTION, QUESTIONS_COLLECTION, SUMMARIZED_EVALUATIONS_COLLECTION,
    USERS_COLLECTION,
};
use mongodb::{Client, Collection, Database};
use std::error::Error;

const DEFAULT_DATABASE_NAME: &str = "peer_evaluation";

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        // Connection pool
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        let db_name = database_name_from_uri(uri);
        let db = client.database(&db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { client, db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the indexes the evaluation queries rely on.
    /// None of them are unique: the store is trusted as-is.
    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        use mongodb::bson::{doc, Document};
        use mongodb::IndexModel;

        log::info!("🔧 Creating database indexes...");

        let indexes: [(&str, Document, &str); 4] = [
            (USERS_COLLECTION, doc! { "code": 1 }, "users(code)"),
            (
                QUESTIONS_COLLECTION,
                doc! { "type": 1, "categoryCode": 1, "id": 1 },
                "questions(type, categoryCode, id)",
            ),
            (
                EVALUATIONS_COLLECTION,
                doc! { "evaluatorId": 1 },
                "evaluations(evaluatorId)",
            ),
            (
                SUMMARIZED_EVALUATIONS_COLLECTION,
                doc! { "evaluatorId": 1, "evaluatedPeerId": 1, "evaluationPeriodId": 1 },
                "summarized_evaluations(evaluatorId, evaluatedPeerId, evaluationPeriodId)",
            ),
        ];

        for (collection_name, keys, label) in indexes {
            let collection = self.database().collection::<Document>(collection_name);
            let index = IndexModel::builder().keys(keys).build();
            match collection.create_index(index).await {
                Ok(_) => log::info!("   ✅ Index created: {}", label),
                Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
            }
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Check if the connection is healthy
    pub async fn health_check(&self) -> bool {
        self.db.list_collection_names().await.is_ok()
    }
}

/// Takes the path segment of the URI as database name, e.g.
/// `mongodb://host:27017/peer_evaluation?retryWrites=true`.
fn database_name_from_uri(uri: &str) -> String {
    let without_scheme = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
    without_scheme
        .split_once('/')
        .map(|(_, path)| path.split('?').next().unwrap_or(""))
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_DATABASE_NAME)
        .to_string()
}
