use std::{path::PathBuf, sync::Arc};

use tracing::{debug, error, info};

use crate::{
    rewrite, Dispatcher, DispatchConfig, EmailMessage, FileDispatcher, FileMessageStore,
    ForwardError, ForwardResult, ForwarderConfig, InboundNotification, MappingConfig,
    MappingStore, MemoryMappingStore, MessageStore, Resolver, SmtpDispatcher,
    SqliteMappingStore, StorageConfig,
};

/// Result of a successfully forwarded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardOutcome {
    /// Identifier assigned by the mail submission service.
    pub message_id: String,

    /// Destinations the message was submitted to.
    pub destinations: Vec<String>,

    /// Original recipient used as the new effective sender.
    pub resolved_origin: String,
}

/// Sequences the handling of one inbound notification.
///
/// Processing runs validate, resolve, fetch, rewrite and dispatch in that
/// order, the first failure aborts the remaining steps. Nothing is retried
/// and no state is kept between invocations, the collaborator handles are
/// shared read-only and can be reused concurrently.
pub struct Forwarder {
    resolver: Resolver,
    messages: Arc<dyn MessageStore>,
    dispatcher: Arc<dyn Dispatcher>,
    location_prefix: String,
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("resolver", &self.resolver)
            .field("messages", &self.messages.name())
            .field("dispatcher", &self.dispatcher.name())
            .field("location_prefix", &self.location_prefix)
            .finish()
    }
}

impl Forwarder {
    pub fn new(
        resolver: Resolver,
        messages: Arc<dyn MessageStore>,
        dispatcher: Arc<dyn Dispatcher>,
        location_prefix: &str,
    ) -> Self {
        Self {
            resolver,
            messages,
            dispatcher,
            location_prefix: location_prefix.to_string(),
        }
    }

    /// Builds a [`Forwarder`] and its collaborators from configuration.
    pub fn from_config(config: &ForwarderConfig) -> ForwardResult<Self> {
        let store = build_mapping_store(config)?;
        let resolver =
            Resolver::with_wildcard_marker(store, config.key_schema, &config.wildcard_marker);

        let messages: Arc<dyn MessageStore> = match &config.storage {
            StorageConfig::File { path } => Arc::new(FileMessageStore::new(PathBuf::from(path))),
        };

        let dispatcher: Arc<dyn Dispatcher> = match &config.dispatch {
            DispatchConfig::Smtp {
                host,
                port,
                tls,
                username,
                password,
            } => {
                let credentials = username
                    .clone()
                    .map(|username| (username, password.clone().unwrap_or_default()));
                Arc::new(SmtpDispatcher::new(host, *port, *tls, credentials)?)
            }
            DispatchConfig::File { path } => Arc::new(FileDispatcher::new(PathBuf::from(path))),
        };

        Ok(Self::new(
            resolver,
            messages,
            dispatcher,
            &config.message_store_location_prefix,
        ))
    }

    /// Parses the raw notification and processes it.
    pub async fn process_event(&self, raw: &[u8]) -> ForwardResult<ForwardOutcome> {
        let notification = InboundNotification::from_json(raw)?;
        self.process(&notification).await
    }

    /// Forwards the message announced by `notification`.
    pub async fn process(&self, notification: &InboundNotification) -> ForwardResult<ForwardOutcome> {
        if notification.recipients().is_empty() || notification.message_id().is_empty() {
            return Err(ForwardError::InvalidEventFormat(
                "notification without recipients or message identifier".to_string(),
            ));
        }

        info!(
            message_id = %notification.message_id(),
            recipients = ?notification
                .recipients()
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>(),
            "Processing inbound notification"
        );

        let routing = self.resolver.resolve(notification.recipients()).await?;

        debug!(
            store = self.messages.name(),
            prefix = %self.location_prefix,
            message_id = %notification.message_id(),
            "Loading raw message"
        );
        let raw = self
            .messages
            .get(&self.location_prefix, notification.message_id())
            .await?;

        let message = EmailMessage::parse(&raw);
        let rewritten = rewrite(&message, &routing.resolved_origin, &routing.destinations)?;

        let message_id = self
            .dispatcher
            .send(&rewritten.to_bytes(), &routing.destinations)
            .await
            .inspect_err(|e| {
                error!(
                    message_id = %notification.message_id(),
                    dispatcher = self.dispatcher.name(),
                    error = %e,
                    "Dispatch failed, delivery status unknown"
                );
            })?;

        info!(
            message_id = %notification.message_id(),
            dispatch_id = %message_id,
            resolved_origin = %routing.resolved_origin,
            destinations = ?routing.destinations,
            "Forwarded message"
        );

        Ok(ForwardOutcome {
            message_id,
            destinations: routing.destinations,
            resolved_origin: routing.resolved_origin.to_string(),
        })
    }
}

fn build_mapping_store(config: &ForwarderConfig) -> ForwardResult<Arc<dyn MappingStore>> {
    let store: Arc<dyn MappingStore> = match &config.mapping {
        MappingConfig::Memory { entries } => Arc::new(MemoryMappingStore::from_entries(
            config.key_schema,
            entries,
        )),
        MappingConfig::Sqlite { path } => Arc::new(SqliteMappingStore::new(
            PathBuf::from(path),
            &config.mapping_table_name,
        )),
        #[cfg(feature = "redis")]
        MappingConfig::Redis { url } => Arc::new(crate::RedisMappingStore::new(
            url,
            &config.mapping_table_name,
        )?),
        #[cfg(not(feature = "redis"))]
        MappingConfig::Redis { .. } => {
            return Err(crate::UpstreamError::Mapping(
                "Redis mapping store requires the `redis` feature".to_string(),
            )
            .into())
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        DispatchFuture, ErrorKind, KeySchema, MappingEntryConfig, MemoryMessageStore,
        UpstreamError,
    };

    const PREFIX: &str = "nekura-org/";

    const RAW: &str = "Return-Path: <bob@y.com>\r\n\
        Message-ID: <orig-1@y.com>\r\n\
        From: Bob <bob@y.com>\r\n\
        To: a@x.com\r\n\
        Subject: Hello\r\n\
        \r\n\
        Hi there\r\n";

    /// Dispatcher recording every submission, optionally failing.
    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<(Vec<u8>, Vec<String>)>>,
        fail: bool,
    }

    impl RecordingDispatcher {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<(Vec<u8>, Vec<String>)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Dispatcher for RecordingDispatcher {
        fn send<'a>(&'a self, raw: &'a [u8], destinations: &'a [String]) -> DispatchFuture<'a> {
            Box::pin(async move {
                self.sent
                    .lock()
                    .unwrap()
                    .push((raw.to_vec(), destinations.to_vec()));
                if self.fail {
                    Err(UpstreamError::Dispatch("throttled".to_string()))
                } else {
                    Ok(format!("sent-{}", self.sent.lock().unwrap().len()))
                }
            })
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn forwarder(
        mappings: MemoryMappingStore,
        dispatcher: Arc<RecordingDispatcher>,
    ) -> Forwarder {
        let messages = MemoryMessageStore::new();
        messages.insert(PREFIX, "msg-1", RAW.as_bytes());
        Forwarder::new(
            Resolver::new(Arc::new(mappings), KeySchema::Composite),
            Arc::new(messages),
            dispatcher,
            PREFIX,
        )
    }

    fn notification(recipients: &[&str]) -> InboundNotification {
        InboundNotification::new(recipients, "msg-1").unwrap()
    }

    #[tokio::test]
    async fn test_scenario_exact_match() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let mappings = MemoryMappingStore::new()
            .with_entry(KeySchema::Composite.key("a", "x.com"), &["b@y.com", "c@y.com"]);
        let forwarder = forwarder(mappings, dispatcher.clone());

        let outcome = forwarder.process(&notification(&["a@x.com"])).await.unwrap();

        assert_eq!(
            outcome,
            ForwardOutcome {
                message_id: "sent-1".to_string(),
                destinations: vec!["b@y.com".to_string(), "c@y.com".to_string()],
                resolved_origin: "a@x.com".to_string(),
            }
        );

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        let (raw, destinations) = &sent[0];
        assert_eq!(destinations, &vec!["b@y.com", "c@y.com"]);

        let message = EmailMessage::parse(raw);
        assert_eq!(message.header("To"), Some("b@y.com, c@y.com"));
        assert_eq!(message.header("From"), Some("Bob -bob@y.com- <a@x.com>"));
        assert_eq!(message.header("Reply-To"), Some("Bob <bob@y.com>"));
        assert!(!message.has_header("Return-Path"));
        assert!(!message.has_header("Message-ID"));
        assert_eq!(message.body(), b"Hi there\r\n");
    }

    #[tokio::test]
    async fn test_scenario_shared_wildcard() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let mappings = MemoryMappingStore::new()
            .with_entry(KeySchema::Composite.key("*", "x.com"), &["z@w.com"]);
        let forwarder = forwarder(mappings, dispatcher.clone());

        let outcome = forwarder
            .process(&notification(&["a@x.com", "b@x.com"]))
            .await
            .unwrap();

        assert_eq!(outcome.destinations, vec!["z@w.com", "z@w.com"]);
        assert_eq!(outcome.resolved_origin, "b@x.com");

        let (raw, _) = &dispatcher.sent()[0];
        let message = EmailMessage::parse(raw);
        assert_eq!(message.header("To"), Some("z@w.com, z@w.com"));
        assert_eq!(message.header("From"), Some("Bob -bob@y.com- <b@x.com>"));
    }

    #[tokio::test]
    async fn test_scenario_wildcard_miss_aborts() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let mappings = MemoryMappingStore::new()
            .with_entry(KeySchema::Composite.key("*", "x.com"), &["z@w.com"]);
        let forwarder = forwarder(mappings, dispatcher.clone());

        let result = forwarder
            .process(&notification(&["a@x.com", "b@other.com"]))
            .await;

        assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::NoMappingFound));
        assert!(dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_process_event_invalid_format() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let forwarder = forwarder(MemoryMappingStore::new(), dispatcher.clone());

        let result = forwarder.process_event(br#"{"Records": []}"#).await;

        assert_eq!(
            result.map_err(|e| e.kind()),
            Err(ErrorKind::InvalidEventFormat)
        );
        assert!(dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_process_event_receipt_shape() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let mappings = MemoryMappingStore::new()
            .with_entry(KeySchema::Composite.key("a", "x.com"), &["b@y.com"]);
        let forwarder = forwarder(mappings, dispatcher.clone());

        let outcome = forwarder
            .process_event(
                br#"{"Records": [{"ses": {"receipt": {"recipients": ["a@x.com"]}, "mail": {"messageId": "msg-1"}}}]}"#,
            )
            .await
            .unwrap();

        assert_eq!(outcome.destinations, vec!["b@y.com"]);
        assert_eq!(dispatcher.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_message_is_upstream_failure() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let mappings = MemoryMappingStore::new()
            .with_entry(KeySchema::Composite.key("a", "x.com"), &["b@y.com"]);
        let forwarder = forwarder(mappings, dispatcher.clone());
        let notification = InboundNotification::new(&["a@x.com"], "unknown").unwrap();

        let result = forwarder.process(&notification).await;

        assert_eq!(
            result,
            Err(ForwardError::Upstream(UpstreamError::Storage(
                "Message not found: nekura-org/unknown".to_string()
            )))
        );
        assert!(dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_not_retried() {
        let dispatcher = Arc::new(RecordingDispatcher::failing());
        let mappings = MemoryMappingStore::new()
            .with_entry(KeySchema::Composite.key("a", "x.com"), &["b@y.com"]);
        let forwarder = forwarder(mappings, dispatcher.clone());

        let result = forwarder.process(&notification(&["a@x.com"])).await;

        assert_eq!(
            result,
            Err(ForwardError::Upstream(UpstreamError::Dispatch(
                "throttled".to_string()
            )))
        );
        assert_eq!(dispatcher.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_message_without_from() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let messages = MemoryMessageStore::new();
        messages.insert(PREFIX, "msg-1", b"Subject: no sender\r\n\r\nBody");
        let mappings = MemoryMappingStore::new()
            .with_entry(KeySchema::Composite.key("a", "x.com"), &["b@y.com"]);
        let forwarder = Forwarder::new(
            Resolver::new(Arc::new(mappings), KeySchema::Composite),
            Arc::new(messages),
            dispatcher.clone(),
            PREFIX,
        );

        let result = forwarder.process(&notification(&["a@x.com"])).await;

        assert_eq!(result, Err(ForwardError::MissingHeader("From")));
        assert!(dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_from_config_with_file_backends() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mailstore = temp_dir.path().join("mailstore");
        std::fs::create_dir_all(mailstore.join("incoming")).unwrap();
        std::fs::write(mailstore.join("incoming/msg-1"), RAW).unwrap();
        let outbox = temp_dir.path().join("outbox");

        let config = ForwarderConfig {
            mapping_table_name: "mapping".to_string(),
            message_store_location_prefix: "incoming/".to_string(),
            key_schema: KeySchema::Address,
            wildcard_marker: "*".to_string(),
            mapping: MappingConfig::Memory {
                entries: vec![MappingEntryConfig {
                    local_part: "*".to_string(),
                    domain: "x.com".to_string(),
                    destinations: vec!["z@w.com".to_string()],
                }],
            },
            storage: StorageConfig::File {
                path: mailstore.to_string_lossy().to_string(),
            },
            dispatch: DispatchConfig::File {
                path: outbox.to_string_lossy().to_string(),
            },
        };
        let forwarder = Forwarder::from_config(&config).unwrap();

        let outcome = forwarder
            .process_event(br#"{"recipients": ["a@x.com"], "messageId": "msg-1"}"#)
            .await
            .unwrap();

        let spooled = std::fs::read(outbox.join(format!("{}.eml", outcome.message_id))).unwrap();
        let message = EmailMessage::parse(&spooled);
        assert_eq!(message.header("To"), Some("z@w.com"));
        assert_eq!(message.header("From"), Some("Bob -bob@y.com- <a@x.com>"));
    }

    #[tokio::test]
    async fn test_from_config_with_sqlite_mapping() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db = temp_dir.path().join("mapping.db");
        let store = SqliteMappingStore::new(db.clone(), "SesForwarder.mapping");
        store.create_table(KeySchema::Composite).await.unwrap();
        store
            .insert(&KeySchema::Composite.key("a", "x.com"), "b@y.com")
            .await
            .unwrap();

        let config = ForwarderConfig {
            mapping_table_name: "SesForwarder.mapping".to_string(),
            message_store_location_prefix: PREFIX.to_string(),
            key_schema: KeySchema::Composite,
            wildcard_marker: "*".to_string(),
            mapping: MappingConfig::Sqlite {
                path: db.to_string_lossy().to_string(),
            },
            storage: StorageConfig::default(),
            dispatch: DispatchConfig::default(),
        };
        let store = build_mapping_store(&config).unwrap();

        assert_eq!(store.name(), "sqlite");
        assert_eq!(
            store.get(&KeySchema::Composite.key("a", "x.com")).await,
            Ok(Some(vec!["b@y.com".to_string()]))
        );
    }
}
