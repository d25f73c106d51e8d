use std::sync::Arc;

use crate::{
    auth::{JwtService, PasswordService},
    config::Config,
    database::{create_repository, Repository},
    errors::Result,
    middleware::TrustedProxies,
    services::{BackgroundRemover, ProcessingPipeline},
    storage::{create_storage, BlobStore},
};

pub mod auth;
pub mod health;
pub mod images;
pub mod user;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repository: Arc<dyn Repository>,
    pub blobs: Arc<dyn BlobStore>,
    pub pipeline: Arc<ProcessingPipeline>,
    pub jwt: Arc<JwtService>,
    pub passwords: PasswordService,
    pub trusted_proxies: Arc<TrustedProxies>,
}

impl AppState {
    /// Picks the storage and repository backends named in `config`.
    pub async fn from_config(config: Config) -> Result<Self> {
        let blobs = create_storage(&config)?;
        let repository = create_repository(&config).await?;
        Self::new(config, repository, blobs)
    }

    pub fn new(
        config: Config,
        repository: Arc<dyn Repository>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self> {
        let remover = BackgroundRemover::from_config(&config)?;
        let pipeline = ProcessingPipeline::new(&config, repository.clone(), blobs.clone(), remover);

        Ok(Self {
            jwt: Arc::new(JwtService::new(&config.jwt_secret)),
            passwords: PasswordService::new(config.bcrypt_cost),
            trusted_proxies: Arc::new(TrustedProxies::from_config(&config.trusted_proxies)),
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
            repository,
            blobs,
        })
    }
}
