use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use port_portal::adapters::firestore::FirestoreStore;
use port_portal::api::vessels::get_vessels;
use port_portal::api::{ApiRequest, ApiResponse};
use port_portal::utils::{logger, validation::Validate};
use port_portal::LambdaConfig;
use std::sync::Arc;

struct Handler {
    store: FirestoreStore,
    api_key: String,
}

async fn function_handler(
    handler: Arc<Handler>,
    event: LambdaEvent<ApiRequest>,
) -> Result<ApiResponse, Error> {
    tracing::info!(
        request_id = %event.context.request_id,
        method = %event.payload.http_method,
        "getVessels invoked"
    );
    Ok(get_vessels(&handler.store, &handler.api_key, &event.payload).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    // 建立 Lambda 配置
    let config = LambdaConfig::from_env()?;
    config.validate()?;

    let handler = Arc::new(Handler {
        store: config.document_store(),
        api_key: config.vessels_api_key.clone(),
    });

    run(service_fn(move |event: LambdaEvent<ApiRequest>| {
        let handler = Arc::clone(&handler);
        async move { function_handler(handler, event).await }
    }))
    .await
}
