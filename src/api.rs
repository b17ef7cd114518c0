use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{Session, SessionAction};
use crate::backend::Backend;
use crate::error::{ApiError, Result};
use crate::members::NewProgramMember;
use crate::models::{MemberStatus, OrganizationType, ProgramMember, ShiftDay, ShiftMutation};

/// REST client for the program API.
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Session) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("testing-admin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::from)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&mut self, builder: RequestBuilder) -> std::result::Result<String, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let err = ApiError::from_response(status.as_u16(), &body);
        tracing::warn!(status = status.as_u16(), error = %err, "api request failed");
        if err.clears_credentials() {
            self.session.reduce(SessionAction::CredentialsRejected);
        }
        Err(err)
    }

    async fn get_json<T: DeserializeOwned>(&mut self, path: &str) -> Result<T> {
        tracing::debug!(path, "GET");
        let builder = self.request(Method::GET, path);
        let body = self.send(builder).await?;
        Ok(serde_json::from_str(&body).map_err(ApiError::from)?)
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn program_members(&mut self) -> Result<Vec<ProgramMember>> {
        self.get_json("/program-members").await
    }

    async fn organization_types(&mut self) -> Result<Vec<OrganizationType>> {
        self.get_json("/organization-types").await
    }

    async fn register_member(&mut self, member: &NewProgramMember) -> Result<ProgramMember> {
        let builder = self.request(Method::POST, "/program-members").json(member);
        let body = self.send(builder).await?;
        Ok(serde_json::from_str(&body).map_err(ApiError::from)?)
    }

    async fn set_member_status(&mut self, id: Uuid, status: MemberStatus) -> Result<()> {
        let builder = self
            .request(Method::PATCH, &format!("/program-members/{id}"))
            .json(&json!({ "status": status }));
        self.send(builder).await?;
        Ok(())
    }

    async fn shift_day(&mut self, date: NaiveDate) -> Result<ShiftDay> {
        self.get_json(&format!("/capacity/{}", date.format("%Y-%m-%d")))
            .await
    }

    async fn apply_shift_mutation(
        &mut self,
        date: NaiveDate,
        mutation: &ShiftMutation,
    ) -> Result<()> {
        let path = format!("/capacity/{}/mutations", date.format("%Y-%m-%d"));
        let builder = self.request(Method::POST, &path).json(mutation);
        self.send(builder).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::error::Error;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers a single request with a canned response.
    async fn serve_once(status: &'static str, body: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                let read = socket.read(&mut buf).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        addr
    }

    fn local_client(addr: SocketAddr, token: &str) -> ApiClient {
        ApiClient {
            http: Client::builder().no_proxy().build().unwrap(),
            base_url: format!("http://{addr}"),
            session: Session::new(Role::UniversityAdmin, Some(token.to_string())),
        }
    }

    #[tokio::test]
    async fn unauthorized_response_clears_stored_token() {
        let addr = serve_once("401 Unauthorized", r#"{"message":"token expired"}"#).await;
        let mut client = local_client(addr, "stale");

        let err = client.program_members().await.unwrap_err();

        assert!(matches!(err, Error::Api(ApiError::Unauthorized)));
        assert!(!client.session().is_signed_in());
        let request = client.request(Method::GET, "/program-members").build().unwrap();
        assert!(request.headers().get("authorization").is_none());
    }

    #[tokio::test]
    async fn not_found_keeps_stored_token() {
        let addr = serve_once("404 Not Found", r#"{"message":"No capacity for day"}"#).await;
        let mut client = local_client(addr, "valid");

        let err = client
            .shift_day(NaiveDate::from_ymd_opt(2026, 3, 18).unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.notification().as_deref(), Some("No capacity for day"));
        assert_eq!(client.session().token(), Some("valid"));
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let client = ApiClient::new(
            "https://api.example.org/v1/",
            Session::new(Role::UniversityAdmin, None),
        )
        .unwrap();
        let request = client
            .request(Method::GET, "/program-members")
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "https://api.example.org/v1/program-members");
        assert!(request.headers().get("authorization").is_none());
    }

    #[test]
    fn attaches_bearer_token() {
        let client = ApiClient::new(
            "https://api.example.org",
            Session::new(Role::LaboratoryAdmin, Some("secret".to_string())),
        )
        .unwrap();
        let request = client.request(Method::GET, "/capacity/2026-03-18").build().unwrap();
        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer secret"
        );
    }
}
