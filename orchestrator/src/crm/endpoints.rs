// CRM endpoint construction

use url::{ParseError, Url};

use crate::models::requests::SObjectKind;

/// Parse `base` as a directory URL so relative joins append instead of replacing.
fn base_url(base: &str) -> Result<Url, ParseError> {
    Url::parse(&format!("{}/", base.trim().trim_end_matches('/')))
}

/// `POST {login_url}/services/oauth2/token`
pub fn token_url(login_url: &str) -> Result<Url, ParseError> {
    base_url(login_url)?.join("services/oauth2/token")
}

/// Custom lead resource, used for both creation and partial updates.
pub fn lead_resource_url(instance_url: &str) -> Result<Url, ParseError> {
    base_url(instance_url)?.join("services/apexrest/core/lead/")
}

/// `PATCH {instance_url}/services/data/v{api_version}/sobjects/{object}/{id}`
pub fn sobject_url(
    instance_url: &str,
    api_version: &str,
    object: SObjectKind,
    id: &str,
) -> Result<Url, ParseError> {
    let mut url = base_url(instance_url)?.join(&format!(
        "services/data/v{}/sobjects/{}/",
        api_version.trim().trim_start_matches('v'),
        object.as_str()
    ))?;
    url.path_segments_mut()
        .map_err(|_| ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .push(id.trim());
    Ok(url)
}
