use {
    serde::{Serialize, Deserialize},
    thiserror::Error,
};

pub use crate::api::{InvocationRequest, HttpRequest, EventEnvelope, ResponseFrame};

pub mod api;

/// One deployed function and the single source it is invoked from.
///
/// Definitions are loaded from the functions manifest and never change afterwards: a reload
/// replaces the whole catalog instead of mutating entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TriggerDefinitionConfig", into = "TriggerDefinitionConfig")]
pub struct TriggerDefinition {
    pub id: String,
    pub platform: Platform,
    pub entry_point: String,
    pub region: Option<String>,
    pub kind: TriggerKind,
}

impl TriggerDefinition {
    pub fn new(id: impl Into<String>, entry_point: impl Into<String>, kind: TriggerKind) -> Self {
        Self {
            id: id.into(),
            platform: Platform::default(),
            entry_point: entry_point.into(),
            region: None,
            kind,
        }
    }

    pub fn https(id: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self::new(id, entry_point, TriggerKind::Https(HttpsTrigger {}))
    }

    pub fn event(id: impl Into<String>, entry_point: impl Into<String>, trigger: EventTrigger) -> Self {
        Self::new(id, entry_point, TriggerKind::Event(trigger))
    }

    pub fn blocking(id: impl Into<String>, entry_point: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self::new(id, entry_point, TriggerKind::Blocking(BlockingTrigger { event_type: event_type.into() }))
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn https_trigger(&self) -> Option<&HttpsTrigger> {
        match &self.kind {
            TriggerKind::Https(v) => Some(v),
            _ => None,
        }
    }

    pub fn event_trigger(&self) -> Option<&EventTrigger> {
        match &self.kind {
            TriggerKind::Event(v) => Some(v),
            _ => None,
        }
    }

    pub fn blocking_trigger(&self) -> Option<&BlockingTrigger> {
        match &self.kind {
            TriggerKind::Blocking(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Gcfv1,
    Gcfv2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerKind {
    Https(HttpsTrigger),
    Event(EventTrigger),
    Blocking(BlockingTrigger),
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Https(_) => "https",
            Self::Event(_) => "event",
            Self::Blocking(_) => "blocking",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpsTrigger {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTrigger {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl EventTrigger {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            resource: None,
            channel: None,
            service: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Path template events are matched against. Channel-based triggers have no resource and
    /// are addressed by their channel name instead.
    pub fn resource_template(&self) -> Option<&str> {
        self.resource.as_deref().or(self.channel.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingTrigger {
    pub event_type: String,
}

#[derive(Error, Debug, Eq, PartialEq)]
pub enum TriggerDefinitionError {
    #[error("function {id:?} does not define a trigger")]
    MissingTrigger { id: String },

    #[error("function {id:?} defines more than one trigger")]
    MultipleTriggers { id: String },

    #[error("event trigger of function {id:?} has neither resource nor channel")]
    MissingResource { id: String },
}

// manifest shape: trigger kinds are sibling optional keys
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerDefinitionConfig {
    id: String,
    #[serde(default)]
    platform: Platform,
    entry_point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    https_trigger: Option<HttpsTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_trigger: Option<EventTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blocking_trigger: Option<BlockingTrigger>,
}

impl TryFrom<TriggerDefinitionConfig> for TriggerDefinition {
    type Error = TriggerDefinitionError;

    fn try_from(config: TriggerDefinitionConfig) -> Result<Self, Self::Error> {
        let kind = match (config.https_trigger, config.event_trigger, config.blocking_trigger) {
            (Some(https), None, None) => TriggerKind::Https(https),
            (None, Some(event), None) => {
                if event.resource_template().is_none() {
                    return Err(TriggerDefinitionError::MissingResource { id: config.id });
                }
                TriggerKind::Event(event)
            },
            (None, None, Some(blocking)) => TriggerKind::Blocking(blocking),
            (None, None, None) => return Err(TriggerDefinitionError::MissingTrigger { id: config.id }),
            _ => return Err(TriggerDefinitionError::MultipleTriggers { id: config.id }),
        };

        Ok(Self {
            id: config.id,
            platform: config.platform,
            entry_point: config.entry_point,
            region: config.region,
            kind,
        })
    }
}

impl From<TriggerDefinition> for TriggerDefinitionConfig {
    fn from(definition: TriggerDefinition) -> Self {
        let (https_trigger, event_trigger, blocking_trigger) = match definition.kind {
            TriggerKind::Https(v) => (Some(v), None, None),
            TriggerKind::Event(v) => (None, Some(v), None),
            TriggerKind::Blocking(v) => (None, None, Some(v)),
        };

        Self {
            id: definition.id,
            platform: definition.platform,
            entry_point: definition.entry_point,
            region: definition.region,
            https_trigger,
            event_trigger,
            blocking_trigger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_trigger_manifest() {
        let definition: TriggerDefinition = serde_json::from_str(r#"{
            "id": "us-central1-onUserWrite",
            "platform": "gcfv2",
            "entryPoint": "onUserWrite",
            "eventTrigger": {
                "eventType": "google.cloud.firestore.document.v1.written",
                "resource": "users/{uid}"
            }
        }"#).unwrap();

        assert_eq!(Platform::Gcfv2, definition.platform);
        assert_eq!("onUserWrite", definition.entry_point);
        let trigger = definition.event_trigger().unwrap();
        assert_eq!(Some("users/{uid}"), trigger.resource_template());
        assert!(trigger.service.is_none());
        assert!(definition.https_trigger().is_none());
    }

    #[test]
    fn platform_defaults_to_first_generation() {
        let definition: TriggerDefinition = serde_json::from_str(r#"{
            "id": "api",
            "entryPoint": "api",
            "httpsTrigger": {}
        }"#).unwrap();

        assert_eq!(Platform::Gcfv1, definition.platform);
        assert!(definition.https_trigger().is_some());
    }

    #[test]
    fn rejects_definition_without_trigger() {
        let err = serde_json::from_str::<TriggerDefinition>(r#"{"id": "lonely", "entryPoint": "lonely"}"#)
            .err()
            .unwrap();
        assert!(err.to_string().contains("does not define a trigger"));
    }

    #[test]
    fn rejects_definition_with_two_triggers() {
        let err = serde_json::from_str::<TriggerDefinition>(r#"{
            "id": "greedy",
            "entryPoint": "greedy",
            "httpsTrigger": {},
            "blockingTrigger": { "eventType": "providers/cloud.auth/eventTypes/user.beforeCreate" }
        }"#).err().unwrap();
        assert!(err.to_string().contains("more than one trigger"));
    }

    #[test]
    fn rejects_event_trigger_without_resource() {
        let err = serde_json::from_str::<TriggerDefinition>(r#"{
            "id": "nowhere",
            "entryPoint": "nowhere",
            "eventTrigger": { "eventType": "google.pubsub.topic.publish" }
        }"#).err().unwrap();
        assert!(err.to_string().contains("neither resource nor channel"));
    }

    #[test]
    fn serializes_back_to_manifest_shape() {
        let definition = TriggerDefinition::event(
            "onPublish",
            "onPublish",
            EventTrigger::new("google.pubsub.topic.publish").with_resource("projects/demo/topics/jobs"),
        );

        let value = serde_json::to_value(&definition).unwrap();
        assert_eq!("google.pubsub.topic.publish", value["eventTrigger"]["eventType"]);
        assert!(value.get("httpsTrigger").is_none());

        let parsed: TriggerDefinition = serde_json::from_value(value).unwrap();
        assert_eq!(definition, parsed);
    }
}
