use crate::document::StatusDocument;
use crate::error::{Result, SourceError};
use crate::source::{ConnectionConfig, StatusConnection, StatusConnector, FETCH_TIMEOUT};
use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, Credential};
use mongodb::Client;

const APP_NAME: &str = "mongomon";

/// Connects through the official MongoDB driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct MongoConnector;

pub struct MongoConnection {
    client: Client,
}

#[async_trait]
impl StatusConnector for MongoConnector {
    type Connection = MongoConnection;

    async fn connect(&self, config: &ConnectionConfig) -> Result<MongoConnection> {
        let mut options = ClientOptions::parse(config.uri())
            .await
            .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;
        options.app_name = Some(APP_NAME.to_string());
        options.direct_connection = Some(true);
        options.max_pool_size = Some(1);
        options.connect_timeout = Some(FETCH_TIMEOUT);
        options.server_selection_timeout = Some(FETCH_TIMEOUT);
        options.credential = credential(config);

        let client =
            Client::with_options(options).map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;
        tracing::debug!(endpoint = %config.endpoint(), "MongoDB client created");
        Ok(MongoConnection { client })
    }
}

#[async_trait]
impl StatusConnection for MongoConnection {
    async fn server_status(&mut self) -> Result<StatusDocument> {
        let reply = self
            .client
            .database("admin")
            .run_command(doc! { "serverStatus": 1 })
            .await
            .map_err(classify)?;
        Ok(StatusDocument::from(reply))
    }

    async fn close(self) -> Result<()> {
        self.client.shutdown().await;
        Ok(())
    }
}

// No username means an anonymous connection.
fn credential(config: &ConnectionConfig) -> Option<Credential> {
    if config.username.is_empty() {
        return None;
    }
    let mut credential = Credential::default();
    credential.username = Some(config.username.clone());
    credential.password = Some(config.password.clone());
    if !config.auth_source.is_empty() {
        credential.source = Some(config.auth_source.clone());
    }
    Some(credential)
}

fn classify(err: mongodb::error::Error) -> SourceError {
    match err.kind.as_ref() {
        ErrorKind::Command(_) => SourceError::CommandFailed(err.to_string()),
        ErrorKind::BsonDeserialization(_) | ErrorKind::InvalidResponse { .. } => {
            SourceError::DecodeFailed(err.to_string())
        }
        _ => SourceError::ConnectionFailed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_when_username_is_empty() {
        let config = ConnectionConfig {
            password: "ignored".into(),
            ..ConnectionConfig::default()
        };
        assert!(credential(&config).is_none());
    }

    #[test]
    fn credential_carries_auth_source() {
        let config = ConnectionConfig {
            username: "monitor".into(),
            password: "secret".into(),
            auth_source: "admin".into(),
            ..ConnectionConfig::default()
        };
        let auth = credential(&config).unwrap();
        assert_eq!(auth.username.as_deref(), Some("monitor"));
        assert_eq!(auth.password.as_deref(), Some("secret"));
        assert_eq!(auth.source.as_deref(), Some("admin"));

        let config = ConnectionConfig {
            auth_source: String::new(),
            ..config
        };
        assert!(credential(&config).unwrap().source.is_none());
    }

    #[tokio::test]
    async fn invalid_port_is_a_connection_failure() {
        let config = ConnectionConfig {
            port: "not-a-port".into(),
            ..ConnectionConfig::default()
        };
        let err = MongoConnector.connect(&config).await.err().unwrap();
        assert!(matches!(err, SourceError::ConnectionFailed(_)));
    }
}
