//! Routers over fake collaborators.

use std::sync::Arc;
use std::time::Duration;

use axum_test_helper::TestClient;

use staff_search::routes;
use staff_search::state::State;

use crate::deployment::static_schema;
use crate::model::ScriptedModel;
use crate::store::MemoryStore;

pub const TRANSLATION_TIMEOUT: Duration = Duration::from_secs(5);
pub const EXECUTION_TIMEOUT: Duration = Duration::from_secs(5);

/// A client for a router over the static schema, with handles on its fakes.
pub struct TestApp {
    pub client: TestClient,
    pub model: Arc<ScriptedModel>,
    pub store: MemoryStore,
}

/// Build a state over the static schema, the given model and the given store.
pub async fn create_state(
    model: Arc<ScriptedModel>,
    store: MemoryStore,
    translation_timeout: Duration,
) -> State {
    let _ = env_logger::builder().is_test(true).try_init();

    State::new(
        model,
        Arc::new(store),
        static_schema().await,
        translation_timeout,
        EXECUTION_TIMEOUT,
    )
    .expect("State::new")
}

pub async fn create_app(model: ScriptedModel, store: MemoryStore) -> TestApp {
    create_app_with_translation_timeout(model, store, TRANSLATION_TIMEOUT).await
}

/// Like [`create_app`], but giving up on the model after `translation_timeout`.
pub async fn create_app_with_translation_timeout(
    model: ScriptedModel,
    store: MemoryStore,
    translation_timeout: Duration,
) -> TestApp {
    let model = Arc::new(model);
    let state = create_state(model.clone(), store.clone(), translation_timeout).await;
    let client = TestClient::new(routes::create_router(Arc::new(state)));
    TestApp {
        client,
        model,
        store,
    }
}
