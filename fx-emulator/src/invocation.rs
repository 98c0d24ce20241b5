use {
    tokio::sync::mpsc,
    http::{HeaderMap, StatusCode},
    fx_core::{InvocationRequest, ResponseFrame},
    crate::error::DispatchError,
};

pub struct Invocation {
    pub request: InvocationRequest,
    pub sink: ResponseSink,
}

impl Invocation {
    pub fn new(request: InvocationRequest, sink: ResponseSink) -> Self {
        Self {
            request,
            sink,
        }
    }

    /// Creates an invocation together with the receiving end of its response.
    pub fn with_receiver(request: InvocationRequest) -> (Self, ResponseReceiver) {
        let (sink, receiver) = ResponseSink::channel();
        (Self::new(request, sink), receiver)
    }
}

type SinkMessage = Result<ResponseFrame, DispatchError>;

/// Where a worker's output for one invocation is proxied to.
pub struct ResponseSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
    responded: bool,
}

impl ResponseSink {
    pub fn channel() -> (Self, ResponseReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                responded: false,
            },
            ResponseReceiver { rx },
        )
    }

    pub fn send(&mut self, frame: ResponseFrame) {
        self.responded = true;
        // receiver going away means the caller no longer cares about the response
        let _ = self.tx.send(Ok(frame));
    }

    pub fn fail(&mut self, error: DispatchError) {
        let _ = self.tx.send(Err(error));
    }

    /// Whether any frame was already delivered. Once true, failures can no longer be reported
    /// as a synthesized response.
    pub fn has_responded(&self) -> bool {
        self.responded
    }
}

pub struct ResponseReceiver {
    rx: mpsc::UnboundedReceiver<SinkMessage>,
}

impl ResponseReceiver {
    pub async fn next(&mut self) -> Option<SinkMessage> {
        self.rx.recv().await
    }

    /// Waits for the sink to be dropped and folds everything it received into one response.
    pub async fn collect(mut self) -> Result<InvocationResponse, DispatchError> {
        let mut response = InvocationResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        };

        while let Some(message) = self.rx.recv().await {
            match message? {
                ResponseFrame::Head { status, headers } => {
                    response.status = status;
                    response.headers = headers;
                },
                ResponseFrame::Body(chunk) => response.body.extend_from_slice(&chunk),
            }
        }

        Ok(response)
    }
}

#[derive(Debug, Clone)]
pub struct InvocationResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collects_frames_into_response() {
        let (mut sink, receiver) = ResponseSink::channel();
        assert!(!sink.has_responded());

        sink.send(ResponseFrame::status(StatusCode::CREATED));
        sink.send(ResponseFrame::Body(b"hello ".to_vec()));
        sink.send(ResponseFrame::Body(b"fx".to_vec()));
        assert!(sink.has_responded());
        drop(sink);

        let response = receiver.collect().await.unwrap();
        assert_eq!(StatusCode::CREATED, response.status);
        assert_eq!(b"hello fx".to_vec(), response.body);
    }

    #[tokio::test]
    async fn failure_is_returned_from_collect() {
        let (mut sink, receiver) = ResponseSink::channel();
        sink.fail(DispatchError::WorkerKilled);
        assert!(!sink.has_responded());
        drop(sink);

        assert_eq!(DispatchError::WorkerKilled, receiver.collect().await.unwrap_err());
    }
}
