use crate::{Corners, Proxy};
use errors::ProxyError;
use serde::Deserialize;
use serde_yaml::Value;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CornersSettings {
    #[serde(default)]
    n_dim: Option<usize>,
    mu: f64,
    sigma: f64
}

/// Build the proxy described by a `proxy` configuration node. The proxy
/// still needs [`Proxy::setup`] unless the node sets `n_dim`.
pub fn build_proxy(config: &Value) -> Result<Box<dyn Proxy>, ProxyError> {
    let target = config
        .get("_target_")
        .and_then(Value::as_str)
        .ok_or_else(|| ProxyError::InvalidConfig {
            reason: "missing '_target_'".to_string()
        })?;

    info!("Building proxy {}", target);
    match target.rsplit('.').next().unwrap_or(target) {
        "Corners" => {
            let settings: CornersSettings =
                serde_yaml::from_value(config.clone()).map_err(|e| ProxyError::InvalidConfig {
                    reason: e.to_string()
                })?;
            Ok(Box::new(Corners::new(
                settings.n_dim,
                settings.mu,
                settings.sigma
            )?))
        }
        _ => Err(ProxyError::UnknownTarget {
            target: target.to_string()
        })
    }
}
