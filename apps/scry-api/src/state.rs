use std::sync::Arc;

use scry_config::Config;
use scry_service::{ScryService, store::Stores};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ScryService>,
	pub cors_allow_origin: Arc<str>,
	pub default_client_ip: Arc<str>,
	pub admin_auth_token: Option<Arc<str>>,
}
impl AppState {
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let stores = Stores::open(&config).await?;
		let service = ScryService::new(config, stores)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: ScryService) -> Self {
		let cors_allow_origin = Arc::from(service.cfg.service.cors_allow_origin.as_str());
		let default_client_ip = Arc::from(service.cfg.service.default_client_ip.as_str());
		let admin_auth_token = service.cfg.security.admin_auth_token.as_deref().map(Arc::from);

		Self { service: Arc::new(service), cors_allow_origin, default_client_ip, admin_auth_token }
	}
}
