use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::{
    Category, CategoryData, CategoryId, DateRange, Error, Profile, Transaction, TransactionData,
    TransactionId,
    api::{
        API_KEY_HEADER, AuthSession, EmailRequest, ErrorBody, PasswordGrant, RefreshGrant,
        SignUpRequest, SignUpResponse, TransactionQuery,
    },
    backend::{AuthBackend, DataBackend, Ledger, SignUpOutcome},
    service::endpoints::{self, format_endpoint},
    user::{NewProfile, ProfileUpdate},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A client for the hosted service.
///
/// Cloning is cheap, clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RemoteBackend {
    /// Create a client for the service at `base_url`, e.g. "http://127.0.0.1:3000".
    ///
    /// # Errors
    ///
    /// Returns [Error::Network] if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| Error::Network(error.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
    }

    fn authorized(&self, method: Method, path: &str, access_token: &str) -> RequestBuilder {
        self.request(method, path).bearer_auth(access_token)
    }
}

async fn send(request: RequestBuilder) -> Result<Response, Error> {
    let response = request
        .send()
        .await
        .map_err(|error| Error::Network(error.to_string()))?;

    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from_response(response).await)
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, Error> {
    send(request)
        .await?
        .json()
        .await
        .map_err(|error| Error::JSONSerializationError(error.to_string()))
}

async fn error_from_response(response: Response) -> Error {
    let status = response.status();

    match response.json::<ErrorBody>().await {
        Ok(body) => Error::from_response(status.as_u16(), body),
        Err(_) => Error::Backend {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_owned(),
        },
    }
}

#[async_trait]
impl AuthBackend for RemoteBackend {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, Error> {
        let response: SignUpResponse =
            send_json(self.request(Method::POST, endpoints::SIGN_UP).json(request)).await?;

        Ok(match response.session {
            Some(session) => SignUpOutcome::SignedIn(session),
            None => SignUpOutcome::ConfirmationPending(response.user),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, Error> {
        let grant = PasswordGrant {
            email: email.to_owned(),
            password: password.to_owned(),
        };

        send_json(self.request(Method::POST, endpoints::TOKEN).json(&grant)).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, Error> {
        let grant = RefreshGrant {
            refresh_token: refresh_token.to_owned(),
        };

        send_json(self.request(Method::POST, endpoints::REFRESH).json(&grant)).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), Error> {
        send(self.authorized(Method::POST, endpoints::LOG_OUT, access_token))
            .await
            .map(|_| ())
    }

    async fn resend_confirmation(&self, email: &str) -> Result<(), Error> {
        let request = EmailRequest {
            email: email.to_owned(),
        };

        send(self.request(Method::POST, endpoints::RESEND_CONFIRMATION).json(&request))
            .await
            .map(|_| ())
    }

    async fn get_profile(&self, access_token: &str) -> Result<Option<Profile>, Error> {
        match send_json(self.authorized(Method::GET, endpoints::PROFILE, access_token)).await {
            Ok(profile) => Ok(Some(profile)),
            Err(Error::NotFound) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn create_profile(
        &self,
        access_token: &str,
        profile: &NewProfile,
    ) -> Result<Profile, Error> {
        send_json(
            self.authorized(Method::POST, endpoints::PROFILE, access_token)
                .json(profile),
        )
        .await
    }

    async fn update_profile(
        &self,
        access_token: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, Error> {
        send_json(
            self.authorized(Method::PATCH, endpoints::PROFILE, access_token)
                .json(update),
        )
        .await
    }
}

impl DataBackend for RemoteBackend {
    fn ledger(&self, access_token: &str) -> Box<dyn Ledger> {
        Box::new(RemoteLedger {
            backend: self.clone(),
            access_token: access_token.to_owned(),
        })
    }
}

/// The categories and transactions of the user an access token belongs to.
#[derive(Debug, Clone)]
pub struct RemoteLedger {
    backend: RemoteBackend,
    access_token: String,
}

impl RemoteLedger {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.backend.authorized(method, path, &self.access_token)
    }
}

#[async_trait]
impl Ledger for RemoteLedger {
    async fn categories(&self) -> Result<Vec<Category>, Error> {
        send_json(self.request(Method::GET, endpoints::CATEGORIES)).await
    }

    async fn create_category(&self, data: CategoryData) -> Result<Category, Error> {
        send_json(self.request(Method::POST, endpoints::CATEGORIES).json(&data)).await
    }

    async fn update_category(&self, id: CategoryId, data: CategoryData) -> Result<Category, Error> {
        send_json(
            self.request(Method::PUT, &format_endpoint(endpoints::CATEGORY, id))
                .json(&data),
        )
        .await
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), Error> {
        send(self.request(Method::DELETE, &format_endpoint(endpoints::CATEGORY, id)))
            .await
            .map(|_| ())
    }

    async fn transactions(&self, range: Option<DateRange>) -> Result<Vec<Transaction>, Error> {
        let query = range.map(TransactionQuery::from_range).unwrap_or_default();

        send_json(
            self.request(Method::GET, endpoints::TRANSACTIONS)
                .query(&query),
        )
        .await
    }

    async fn create_transaction(&self, data: TransactionData) -> Result<Transaction, Error> {
        send_json(self.request(Method::POST, endpoints::TRANSACTIONS).json(&data)).await
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        data: TransactionData,
    ) -> Result<Transaction, Error> {
        send_json(
            self.request(Method::PUT, &format_endpoint(endpoints::TRANSACTION, id))
                .json(&data),
        )
        .await
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<(), Error> {
        send(self.request(Method::DELETE, &format_endpoint(endpoints::TRANSACTION, id)))
            .await
            .map(|_| ())
    }
}
