use crate::error::RelayError;
use crate::types::google::{
    BusinessAccount, BusinessLocation, ListAccountsResponse, ListLocationsResponse,
    ListReviewsResponse, LocationOption,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

/// Base URLs of the three Business Profile APIs this service talks to.
#[derive(Debug, Clone)]
pub struct BusinessProfileEndpoints {
    pub account_api: Url,
    pub business_info_api: Url,
    pub reviews_api: Url,
}

/// Stateless Business Profile calls; the access token is passed per call.
pub struct BusinessProfileApi;

impl BusinessProfileApi {
    /// First page of reviews for `location_id` (`accounts/{a}/locations/{l}`).
    /// Later pages are not followed.
    pub async fn list_reviews(
        endpoints: &BusinessProfileEndpoints,
        client: reqwest::Client,
        access_token: impl AsRef<str>,
        location_id: &str,
    ) -> Result<ListReviewsResponse, RelayError> {
        let url = join(&endpoints.reviews_api, &format!("{location_id}/reviews"))?;
        let page: ListReviewsResponse = get_json(client, url, access_token.as_ref()).await?;
        if page.next_page_token.is_some() {
            debug!(
                location = location_id,
                total = ?page.total_review_count,
                "more review pages available; only the first page is ingested"
            );
        }
        info!(
            location = location_id,
            count = page.reviews.len(),
            "fetched provider reviews"
        );
        Ok(page)
    }

    pub async fn list_accounts(
        endpoints: &BusinessProfileEndpoints,
        client: reqwest::Client,
        access_token: impl AsRef<str>,
    ) -> Result<Vec<BusinessAccount>, RelayError> {
        let url = join(&endpoints.account_api, "accounts")?;
        let resp: ListAccountsResponse = get_json(client, url, access_token.as_ref()).await?;
        Ok(resp.accounts)
    }

    pub async fn list_locations(
        endpoints: &BusinessProfileEndpoints,
        client: reqwest::Client,
        access_token: impl AsRef<str>,
        account_name: &str,
    ) -> Result<Vec<BusinessLocation>, RelayError> {
        let mut url = join(
            &endpoints.business_info_api,
            &format!("{account_name}/locations"),
        )?;
        url.query_pairs_mut()
            .append_pair("readMask", "name,title")
            .append_pair("pageSize", "100");
        let resp: ListLocationsResponse = get_json(client, url, access_token.as_ref()).await?;
        Ok(resp.locations)
    }

    /// Every location across every account the token can see, flattened into
    /// the ids the reviews API expects.
    pub async fn list_location_options(
        endpoints: &BusinessProfileEndpoints,
        client: reqwest::Client,
        access_token: impl AsRef<str>,
    ) -> Result<Vec<LocationOption>, RelayError> {
        let token = access_token.as_ref();
        let accounts = Self::list_accounts(endpoints, client.clone(), token).await?;
        let mut options = Vec::new();
        for account in accounts {
            let locations =
                Self::list_locations(endpoints, client.clone(), token, &account.name).await?;
            options.extend(locations.into_iter().map(|loc| LocationOption {
                location_name: loc.title.clone().unwrap_or_else(|| loc.name.clone()),
                location_id: format!("{}/{}", account.name, loc.name),
                account_name: account.account_name.clone(),
            }));
        }
        Ok(options)
    }
}

async fn get_json<T: DeserializeOwned>(
    client: reqwest::Client,
    url: Url,
    token: &str,
) -> Result<T, RelayError> {
    let resp = client
        .get(url.clone())
        .bearer_auth(token)
        .header("Accept", "application/json")
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        warn!(url = %url.path(), %status, "Business Profile API returned an error");
        return Err(RelayError::UpstreamStatus(status));
    }
    Ok(resp.json::<T>().await?)
}

fn join(base: &Url, path: &str) -> Result<Url, RelayError> {
    Ok(Url::parse(&format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    ))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn endpoints_for(base: &str) -> BusinessProfileEndpoints {
        BusinessProfileEndpoints {
            account_api: Url::parse(&format!("{base}/acct/v1")).unwrap(),
            business_info_api: Url::parse(&format!("{base}/info/v1")).unwrap(),
            reviews_api: Url::parse(&format!("{base}/v4")).unwrap(),
        }
    }

    #[tokio::test]
    async fn list_reviews_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v4/accounts/1/locations/2/reviews")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"reviews":[{"reviewId":"r1","starRating":"FIVE","comment":"Great"}]}"#)
            .create_async()
            .await;

        let page = BusinessProfileApi::list_reviews(
            &endpoints_for(&server.url()),
            reqwest::Client::new(),
            "tok",
            "accounts/1/locations/2",
        )
        .await
        .unwrap();
        mock.assert_async().await;
        assert_eq!(page.reviews.len(), 1);
        assert_eq!(page.reviews[0].star_rating, 5);
    }

    #[tokio::test]
    async fn upstream_failure_is_a_single_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v4/accounts/1/locations/2/reviews")
            .with_status(503)
            .create_async()
            .await;

        let err = BusinessProfileApi::list_reviews(
            &endpoints_for(&server.url()),
            reqwest::Client::new(),
            "tok",
            "accounts/1/locations/2",
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            RelayError::UpstreamStatus(s) if s == reqwest::StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[tokio::test]
    async fn location_options_combine_account_and_location_names() {
        let mut server = mockito::Server::new_async().await;
        let _accounts = server
            .mock("GET", "/acct/v1/accounts")
            .with_header("content-type", "application/json")
            .with_body(r#"{"accounts":[{"name":"accounts/7","accountName":"Owner"}]}"#)
            .create_async()
            .await;
        let _locations = server
            .mock("GET", "/info/v1/accounts/7/locations")
            .match_query(Matcher::UrlEncoded("readMask".into(), "name,title".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"locations":[{"name":"locations/9","title":"Blue Door Cafe"}]}"#)
            .create_async()
            .await;

        let options = BusinessProfileApi::list_location_options(
            &endpoints_for(&server.url()),
            reqwest::Client::new(),
            "tok",
        )
        .await
        .unwrap();
        assert_eq!(
            options,
            vec![LocationOption {
                location_id: "accounts/7/locations/9".to_string(),
                location_name: "Blue Door Cafe".to_string(),
                account_name: Some("Owner".to_string()),
            }]
        );
    }
}
