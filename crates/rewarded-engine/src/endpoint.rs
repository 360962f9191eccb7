use url::Url;

use crate::error::EngineError;
use crate::types::RequestParameters;

/// Backend API version sent with every ad request.
pub const API_VERSION: u32 = 1;

const AD_HANDLER_PATH: &str = "/m/ad";

/// Builds the request endpoint for a unit. Must be pure.
pub trait EndpointBuilder: Send + Sync {
    fn build(&self, unit_id: &str, params: &RequestParameters) -> String;
}

impl<F> EndpointBuilder for F
where
    F: Fn(&str, &RequestParameters) -> String + Send + Sync,
{
    fn build(&self, unit_id: &str, params: &RequestParameters) -> String {
        (self)(unit_id, params)
    }
}

/// Query-string endpoint on the configured ad host.
#[derive(Debug, Clone)]
pub struct DefaultEndpointBuilder {
    base: Url,
}

impl DefaultEndpointBuilder {
    pub fn new(host: &str) -> Result<Self, EngineError> {
        let with_scheme = if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        let mut base = Url::parse(&with_scheme).map_err(|_| EngineError::InvalidConfig {
            key: "ad_host",
            value: host.to_string(),
        })?;
        base.set_path(AD_HANDLER_PATH);
        base.set_query(None);
        Ok(Self { base })
    }
}

impl EndpointBuilder for DefaultEndpointBuilder {
    fn build(&self, unit_id: &str, params: &RequestParameters) -> String {
        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("v", &API_VERSION.to_string());
            query.append_pair("id", unit_id);
            if let Some(keywords) = params.keywords.as_deref().filter(|k| !k.is_empty()) {
                query.append_pair("q", keywords);
            }
            if let Some(location) = params.location {
                query.append_pair(
                    "ll",
                    &format!("{},{}", location.latitude, location.longitude),
                );
                if let Some(accuracy) = location.accuracy_meters {
                    query.append_pair("lla", &accuracy.to_string());
                }
            }
            if let Some(customer_id) = params.customer_id.as_deref().filter(|c| !c.is_empty()) {
                query.append_pair("cid", customer_id);
            }
        }
        url.into()
    }
}
