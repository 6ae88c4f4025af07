/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! HTTP dispatch gateway for ThingSpeak and Phant channels.

use crate::config::{ChannelKind, RemoteChannel};
use async_trait::async_trait;
use chrono::SecondsFormat;
use mq_streamer::{ComposedUpdate, DispatchError, DispatchGateway};
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const PHANT_PRIVATE_KEY_HEADER: &str = "Phant-Private-Key";

/// Sends composed updates to the remote channel they belong to.
pub struct HttpDispatchGateway {
    client: reqwest::Client,
    remotes: BTreeMap<String, RemoteChannel>,
}

impl HttpDispatchGateway {
    pub fn new(
        remotes: BTreeMap<String, RemoteChannel>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, remotes })
    }

    async fn send_thingspeak(
        &self,
        remote: &RemoteChannel,
        update: &ComposedUpdate,
    ) -> Result<(), DispatchError> {
        let mut form: Vec<(&str, String)> = Vec::with_capacity(update.fields.len() + 2);
        form.push(("api_key", remote.key.clone()));
        form.extend(
            update
                .fields
                .iter()
                .map(|(field, value)| (field.as_str(), value.clone())),
        );
        form.push((
            "created_at",
            update.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));

        let response = self
            .client
            .post(format!("{}/update", remote.base_url))
            .form(&form)
            .send()
            .await
            .map_err(|err| DispatchError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| DispatchError::Transport(err.to_string()))?;
        // ThingSpeak answers 200 with entry id "0" when it drops an update.
        if status == StatusCode::OK && body.trim() != "0" {
            debug!(channel = update.channel.as_str(), entry = body.trim(), "thingspeak accepted update");
            Ok(())
        } else {
            Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn send_phant(
        &self,
        remote: &RemoteChannel,
        update: &ComposedUpdate,
    ) -> Result<(), DispatchError> {
        let id = remote.id.as_deref().unwrap_or_default();
        let response = self
            .client
            .post(format!("{}/input/{id}", remote.base_url))
            .header(PHANT_PRIVATE_KEY_HEADER, remote.key.as_str())
            .form(&update.fields)
            .send()
            .await
            .map_err(|err| DispatchError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl DispatchGateway for HttpDispatchGateway {
    async fn send(&self, update: &ComposedUpdate) -> Result<(), DispatchError> {
        let Some(remote) = self.remotes.get(&update.channel) else {
            return Err(DispatchError::Transport(format!(
                "no remote configured for channel {}",
                update.channel
            )));
        };

        match remote.kind {
            ChannelKind::ThingSpeak => self.send_thingspeak(remote, update).await,
            ChannelKind::Phant => self.send_phant(remote, update).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpDispatchGateway, DEFAULT_REQUEST_TIMEOUT};
    use crate::config::{ChannelKind, RemoteChannel};
    use chrono::{TimeZone, Utc};
    use mockito::{Matcher, Server};
    use mq_streamer::{ComposedUpdate, DispatchError, DispatchGateway};
    use std::collections::BTreeMap;

    fn update(channel: &str, fields: &[(&str, &str)]) -> ComposedUpdate {
        ComposedUpdate {
            channel: channel.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 15).unwrap(),
            fields: fields
                .iter()
                .map(|(field, value)| (field.to_string(), value.to_string()))
                .collect(),
        }
    }

    fn gateway(channel: &str, kind: ChannelKind, base_url: String) -> HttpDispatchGateway {
        let remote = RemoteChannel {
            kind,
            id: Some("public-key".to_string()),
            key: "secret".to_string(),
            base_url,
        };
        HttpDispatchGateway::new(
            BTreeMap::from([(channel.to_string(), remote)]),
            DEFAULT_REQUEST_TIMEOUT,
        )
        .expect("client should build")
    }

    #[tokio::test]
    async fn thingspeak_update_posts_form_with_api_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/update")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("api_key".into(), "secret".into()),
                Matcher::UrlEncoded("field1".into(), "21.5".into()),
                Matcher::UrlEncoded("field2".into(), "40".into()),
                Matcher::UrlEncoded("created_at".into(), "2024-05-01T12:00:15Z".into()),
            ]))
            .with_status(200)
            .with_body("17")
            .expect(1)
            .create_async()
            .await;

        let gateway = gateway("living-room", ChannelKind::ThingSpeak, server.url());
        let result = gateway
            .send(&update("living-room", &[("field1", "21.5"), ("field2", "40")]))
            .await;

        assert_eq!(result, Ok(()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn thingspeak_zero_entry_is_a_rejection() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/update")
            .with_status(200)
            .with_body("0")
            .expect(1)
            .create_async()
            .await;

        let gateway = gateway("living-room", ChannelKind::ThingSpeak, server.url());
        let result = gateway.send(&update("living-room", &[("field1", "1")])).await;

        assert_eq!(
            result,
            Err(DispatchError::Rejected {
                status: 200,
                body: "0".to_string()
            })
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn thingspeak_error_status_is_a_rejection() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/update")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let gateway = gateway("living-room", ChannelKind::ThingSpeak, server.url());
        let result = gateway.send(&update("living-room", &[("field1", "1")])).await;

        assert!(matches!(
            result,
            Err(DispatchError::Rejected { status: 500, .. })
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn phant_update_posts_to_input_with_private_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/input/public-key")
            .match_header("phant-private-key", "secret")
            .match_body(Matcher::UrlEncoded("door".into(), "open".into()))
            .with_status(200)
            .with_body("1 success")
            .expect(1)
            .create_async()
            .await;

        let gateway = gateway("garage", ChannelKind::Phant, server.url());
        let result = gateway.send(&update("garage", &[("door", "open")])).await;

        assert_eq!(result, Ok(()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn phant_rejection_carries_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/input/public-key")
            .with_status(400)
            .with_body("0 invalid field")
            .create_async()
            .await;

        let gateway = gateway("garage", ChannelKind::Phant, server.url());
        let result = gateway.send(&update("garage", &[("window", "1")])).await;

        assert_eq!(
            result,
            Err(DispatchError::Rejected {
                status: 400,
                body: "0 invalid field".to_string()
            })
        );
    }

    #[tokio::test]
    async fn unknown_channel_fails_without_request() {
        let gateway = gateway(
            "garage",
            ChannelKind::Phant,
            "http://127.0.0.1:9".to_string(),
        );
        let result = gateway.send(&update("attic", &[("field1", "1")])).await;
        assert!(matches!(result, Err(DispatchError::Transport(_))));
    }

    #[tokio::test]
    async fn unreachable_remote_is_a_transport_failure() {
        let gateway = gateway(
            "living-room",
            ChannelKind::ThingSpeak,
            "http://127.0.0.1:9".to_string(),
        );
        let result = gateway.send(&update("living-room", &[("field1", "1")])).await;
        assert!(matches!(result, Err(DispatchError::Transport(_))));
    }
}
