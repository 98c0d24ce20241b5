use {
    std::collections::HashMap,
    serde::{Serialize, Deserialize},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
};

/// What a worker process is asked to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InvocationRequest {
    Http(HttpRequest),
    Event(EventEnvelope),
}

impl InvocationRequest {
    /// Human-readable routing target, used in "not found" responses and logs.
    pub fn target(&self) -> String {
        match self {
            Self::Http(request) => request.trigger_id.clone(),
            Self::Event(event) => format!("{} on {}", event.event_type, event.resource),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    pub trigger_id: String,
    #[serde(with = "http_serde::method")]
    pub method: Method,
    #[serde(with = "http_serde::uri")]
    pub uri: Uri,
    #[serde(with = "http_serde::header_map")]
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(trigger_id: impl Into<String>, method: Method, uri: Uri) -> Self {
        Self {
            trigger_id: trigger_id.into(),
            method,
            uri,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_type: String,
    pub resource: String,
    #[serde(default)]
    pub service: Option<String>,
    // filled in by the dispatcher from the matched resource template
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            resource: resource.into(),
            service: None,
            params: HashMap::new(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Unit of a response streamed back from a worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseFrame {
    Head {
        #[serde(with = "http_serde::status_code")]
        status: StatusCode,
        #[serde(with = "http_serde::header_map")]
        headers: HeaderMap,
    },
    Body(Vec<u8>),
}

impl ResponseFrame {
    pub fn status(status: StatusCode) -> Self {
        Self::Head {
            status,
            headers: HeaderMap::new(),
        }
    }
}
