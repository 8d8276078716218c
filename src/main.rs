use std::sync::Arc;

use anyhow::Result;
use digisign::{
    config::Config,
    http::{router, AppState},
    pipeline::{sign_pipeline, validate_pipeline},
    services::{EditorApi, EditorClient, SignatureApi, SignatureClient},
};
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_env()?;
    tokio::fs::create_dir_all(&config.tmp_dir).await?;

    let editor: Arc<dyn EditorApi> = Arc::new(EditorClient::new(
        config.editor_base_url.clone(),
        config.request_timeout,
    )?);
    let signature: Arc<dyn SignatureApi> = Arc::new(SignatureClient::new(
        config.sign_base_url.clone(),
        config.request_timeout,
    )?);

    let state = AppState {
        sign: Arc::new(sign_pipeline(
            config.tmp_dir.clone(),
            editor.clone(),
            signature.clone(),
            config.keys.clone(),
        )),
        validate: Arc::new(validate_pipeline(
            config.tmp_dir.clone(),
            editor,
            signature,
            config.keys.public_key.clone(),
        )),
    };

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("digisign listening on {}", config.listen_addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
