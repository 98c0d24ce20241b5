use {
    std::{collections::HashMap, sync::Arc},
    tracing::{debug, warn},
    fx_core::{EventEnvelope, HttpRequest, InvocationRequest, TriggerDefinition, TriggerKind},
    crate::{
        catalog::TriggerCatalog,
        classifier::{self, Service},
        error::DispatchError,
        matcher,
    },
};

/// Trigger an invocation resolved to, with the wildcard values captured from its resource.
#[derive(Debug, Clone)]
pub struct Route {
    pub trigger: Arc<TriggerDefinition>,
    pub params: HashMap<String, String>,
}

/// Resolves invocations to trigger definitions from a catalog.
pub struct Router {
    catalog: Arc<dyn TriggerCatalog>,
}

impl Router {
    pub fn new(catalog: Arc<dyn TriggerCatalog>) -> Self {
        Self {
            catalog,
        }
    }

    pub fn resolve(&self, request: &InvocationRequest) -> Result<Route, DispatchError> {
        let route = match request {
            InvocationRequest::Http(request) => self.resolve_http(request),
            InvocationRequest::Event(event) => self.resolve_event(event),
        };

        route.ok_or_else(|| DispatchError::RoutingNotFound { target: request.target() })
    }

    fn resolve_http(&self, request: &HttpRequest) -> Option<Route> {
        let trigger = self.catalog.get(&request.trigger_id)?;
        match trigger.kind {
            TriggerKind::Https(_) | TriggerKind::Blocking(_) => Some(Route {
                trigger,
                params: HashMap::new(),
            }),
            TriggerKind::Event(_) => {
                debug!(trigger_id = trigger.id.as_str(), "event trigger cannot be invoked over http");
                None
            },
        }
    }

    fn resolve_event(&self, event: &EventEnvelope) -> Option<Route> {
        let event_service = match &event.service {
            Some(service) => Some(Service::from(service.as_str())),
            None => classifier::classify_event_type(&event.event_type),
        };

        for trigger in self.catalog.triggers() {
            let template = match trigger.event_trigger() {
                Some(v) if v.event_type == event.event_type => match v.resource_template() {
                    Some(template) => template.to_owned(),
                    None => continue,
                },
                _ => continue,
            };

            if !matcher::is_valid_match(&template, &event.resource) {
                continue;
            }

            match (classifier::classify(&trigger), &event_service) {
                (None, _) => {
                    warn!(
                        trigger_id = trigger.id.as_str(),
                        event_type = event.event_type.as_str(),
                        "unable to determine service for trigger, it may not be emulated"
                    );
                },
                (Some(trigger_service), Some(event_service)) if &trigger_service != event_service => continue,
                _ => {},
            }

            let params = matcher::extract_params(&template, &event.resource);
            return Some(Route {
                trigger,
                params,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        http::{Method, Uri},
        fx_core::EventTrigger,
        crate::catalog::InMemoryCatalog,
    };

    const FIRESTORE_WRITTEN: &str = "google.cloud.firestore.document.v1.written";

    fn router(triggers: Vec<TriggerDefinition>) -> Router {
        Router::new(Arc::new(InMemoryCatalog::new(triggers)))
    }

    #[test]
    fn resolves_http_by_trigger_id() {
        let router = router(vec![
            TriggerDefinition::https("api", "api"),
            TriggerDefinition::blocking("beforeCreate", "beforeCreate", "providers/cloud.auth/eventTypes/user.beforeCreate"),
        ]);

        let request = InvocationRequest::Http(HttpRequest::new("api", Method::GET, Uri::from_static("/hello")));
        assert_eq!("api", router.resolve(&request).unwrap().trigger.id);

        let request = InvocationRequest::Http(HttpRequest::new("beforeCreate", Method::POST, Uri::from_static("/")));
        assert_eq!("beforeCreate", router.resolve(&request).unwrap().trigger.id);
    }

    #[test]
    fn event_triggers_are_not_http_routable() {
        let router = router(vec![TriggerDefinition::event(
            "onWrite",
            "onWrite",
            EventTrigger::new(FIRESTORE_WRITTEN).with_resource("users/{uid}"),
        )]);

        let request = InvocationRequest::Http(HttpRequest::new("onWrite", Method::GET, Uri::from_static("/")));
        assert_eq!(
            DispatchError::RoutingNotFound { target: "onWrite".to_owned() },
            router.resolve(&request).unwrap_err(),
        );
    }

    #[test]
    fn resolves_event_and_captures_params() {
        let router = router(vec![
            TriggerDefinition::https("api", "api"),
            TriggerDefinition::event("onWrite", "onWrite", EventTrigger::new(FIRESTORE_WRITTEN).with_resource("users/{uid}")),
        ]);

        let route = router.resolve(&InvocationRequest::Event(EventEnvelope::new(FIRESTORE_WRITTEN, "/users/abe"))).unwrap();
        assert_eq!("onWrite", route.trigger.id);
        assert_eq!("abe", route.params["uid"]);
    }

    #[test]
    fn event_with_unmatched_resource_is_not_found() {
        let router = router(vec![
            TriggerDefinition::event("onWrite", "onWrite", EventTrigger::new(FIRESTORE_WRITTEN).with_resource("users/{uid}")),
        ]);

        let err = router.resolve(&InvocationRequest::Event(EventEnvelope::new(FIRESTORE_WRITTEN, "users/abe/posts/1"))).unwrap_err();
        assert_eq!(
            DispatchError::RoutingNotFound { target: format!("{FIRESTORE_WRITTEN} on users/abe/posts/1") },
            err,
        );
    }

    #[test]
    fn service_disambiguates_shared_resource_pattern() {
        let router = router(vec![
            TriggerDefinition::event(
                "onPublish",
                "onPublish",
                EventTrigger::new("google.pubsub.topic.publish").with_resource("projects/demo/topics/{topic}"),
            ),
            TriggerDefinition::event(
                "onCustomPublish",
                "onCustomPublish",
                EventTrigger::new("google.pubsub.topic.publish")
                    .with_resource("projects/demo/topics/{topic}")
                    .with_service("custom.googleapis.com"),
            ),
        ]);

        let event = EventEnvelope::new("google.pubsub.topic.publish", "projects/demo/topics/jobs");
        assert_eq!("onPublish", router.resolve(&InvocationRequest::Event(event.clone())).unwrap().trigger.id);

        let event = event.with_service("custom.googleapis.com");
        let route = router.resolve(&InvocationRequest::Event(event)).unwrap();
        assert_eq!("onCustomPublish", route.trigger.id);
        assert_eq!("jobs", route.params["topic"]);
    }

    #[test]
    fn unclassified_trigger_is_still_routable() {
        let router = router(vec![TriggerDefinition::event(
            "onMystery",
            "onMystery",
            EventTrigger::new("google.cloud.mystery.v1.happened").with_resource("things/{thing}"),
        )]);

        let route = router.resolve(&InvocationRequest::Event(EventEnvelope::new("google.cloud.mystery.v1.happened", "things/42"))).unwrap();
        assert_eq!("onMystery", route.trigger.id);
        assert_eq!("42", route.params["thing"]);
    }

    #[test]
    fn channel_triggers_match_by_channel_name() {
        let router = router(vec![TriggerDefinition::event(
            "onCustomEvent",
            "onCustomEvent",
            EventTrigger::new("com.example.order.v1.placed")
                .with_channel("projects/demo/locations/us-central1/channels/firebase"),
        )]);

        let event = EventEnvelope::new("com.example.order.v1.placed", "projects/demo/locations/us-central1/channels/firebase");
        assert_eq!("onCustomEvent", router.resolve(&InvocationRequest::Event(event)).unwrap().trigger.id);
    }
}
