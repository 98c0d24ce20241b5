use {
    std::fmt,
    fx_core::{TriggerDefinition, TriggerKind},
};

pub const SERVICE_HTTPS: &str = "https";
pub const SERVICE_PUBSUB: &str = "pubsub.googleapis.com";
pub const SERVICE_FIRESTORE: &str = "firestore.googleapis.com";
pub const SERVICE_REALTIME_DATABASE: &str = "firebaseio.com";
pub const SERVICE_STORAGE: &str = "storage.googleapis.com";
pub const SERVICE_AUTH: &str = "firebaseauth.googleapis.com";

/// Logical service that emits invocations for a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Service {
    Https,
    PubSub,
    Firestore,
    RealtimeDatabase,
    Storage,
    Auth,
    /// Explicitly configured service this emulator has no dedicated handling for.
    Other(String),
}

impl Service {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Https => SERVICE_HTTPS,
            Self::PubSub => SERVICE_PUBSUB,
            Self::Firestore => SERVICE_FIRESTORE,
            Self::RealtimeDatabase => SERVICE_REALTIME_DATABASE,
            Self::Storage => SERVICE_STORAGE,
            Self::Auth => SERVICE_AUTH,
            Self::Other(v) => v,
        }
    }
}

impl From<&str> for Service {
    fn from(service: &str) -> Self {
        match service {
            SERVICE_HTTPS => Self::Https,
            SERVICE_PUBSUB => Self::PubSub,
            SERVICE_FIRESTORE => Self::Firestore,
            SERVICE_REALTIME_DATABASE => Self::RealtimeDatabase,
            SERVICE_STORAGE => Self::Storage,
            SERVICE_AUTH => Self::Auth,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const EVENT_TYPES: &[(&str, Service)] = &[
    // pub/sub
    ("google.pubsub.topic.publish", Service::PubSub),
    ("google.cloud.pubsub.topic.v1.messagePublished", Service::PubSub),
    // firestore
    ("providers/cloud.firestore/eventTypes/document.write", Service::Firestore),
    ("providers/cloud.firestore/eventTypes/document.create", Service::Firestore),
    ("providers/cloud.firestore/eventTypes/document.update", Service::Firestore),
    ("providers/cloud.firestore/eventTypes/document.delete", Service::Firestore),
    ("google.cloud.firestore.document.v1.written", Service::Firestore),
    ("google.cloud.firestore.document.v1.created", Service::Firestore),
    ("google.cloud.firestore.document.v1.updated", Service::Firestore),
    ("google.cloud.firestore.document.v1.deleted", Service::Firestore),
    // realtime database
    ("providers/google.firebase.database/eventTypes/ref.write", Service::RealtimeDatabase),
    ("providers/google.firebase.database/eventTypes/ref.create", Service::RealtimeDatabase),
    ("providers/google.firebase.database/eventTypes/ref.update", Service::RealtimeDatabase),
    ("providers/google.firebase.database/eventTypes/ref.delete", Service::RealtimeDatabase),
    ("google.firebase.database.ref.v1.written", Service::RealtimeDatabase),
    ("google.firebase.database.ref.v1.created", Service::RealtimeDatabase),
    ("google.firebase.database.ref.v1.updated", Service::RealtimeDatabase),
    ("google.firebase.database.ref.v1.deleted", Service::RealtimeDatabase),
    // storage
    ("google.storage.object.finalize", Service::Storage),
    ("google.storage.object.delete", Service::Storage),
    ("google.storage.object.archive", Service::Storage),
    ("google.storage.object.metadataUpdate", Service::Storage),
    ("google.cloud.storage.object.v1.finalized", Service::Storage),
    ("google.cloud.storage.object.v1.deleted", Service::Storage),
    ("google.cloud.storage.object.v1.archived", Service::Storage),
    ("google.cloud.storage.object.v1.metadataUpdated", Service::Storage),
    // auth
    ("providers/firebase.auth/eventTypes/user.create", Service::Auth),
    ("providers/firebase.auth/eventTypes/user.delete", Service::Auth),
    ("providers/cloud.auth/eventTypes/user.beforeCreate", Service::Auth),
    ("providers/cloud.auth/eventTypes/user.beforeSignIn", Service::Auth),
];

/// Maps a trigger to the service that emits its invocations.
///
/// `None` means the service is unknown; callers report it as a diagnostic and keep going.
pub fn classify(trigger: &TriggerDefinition) -> Option<Service> {
    match &trigger.kind {
        TriggerKind::Https(_) => Some(Service::Https),
        TriggerKind::Event(event) => match &event.service {
            Some(service) => Some(Service::from(service.as_str())),
            None => classify_event_type(&event.event_type),
        },
        TriggerKind::Blocking(blocking) => classify_event_type(&blocking.event_type),
    }
}

pub fn classify_event_type(event_type: &str) -> Option<Service> {
    EVENT_TYPES.iter()
        .find(|(known, _)| *known == event_type)
        .map(|(_, service)| service.clone())
}
