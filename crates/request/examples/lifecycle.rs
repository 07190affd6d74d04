use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::StatusCode;
use micro_request::config::NetworkConfig;
use micro_request::request::{Request, RequestOptions};
use micro_request::transport::{
    OutgoingRequest, PageSubmission, Transport, TransportCallbacks, TransportHandle, TransportResponse,
};
use tokio::task::AbortHandle;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Pretends to be a server that needs 100ms per request.
#[derive(Default)]
struct SlowServer {
    in_flight: Mutex<Vec<AbortHandle>>,
}

struct TaskHandle(AbortHandle);

impl TransportHandle for TaskHandle {
    fn abort(&self) {
        self.0.abort();
    }
}

impl Transport for SlowServer {
    fn send(&self, request: OutgoingRequest, callbacks: TransportCallbacks) -> Box<dyn TransportHandle> {
        info!(method = %request.method, url = request.url, headers = ?request.headers, "sending");
        let task = tokio::spawn(async move {
            let answer = tokio::time::sleep(Duration::from_millis(100));
            let timeout = request.timeout.unwrap_or(Duration::MAX);
            if tokio::time::timeout(timeout, answer).await.is_err() {
                callbacks.on_timeout();
                return;
            }

            let status = if request.url.starts_with("/missing") { StatusCode::NOT_FOUND } else { StatusCode::OK };
            callbacks.on_load(TransportResponse::new(status, format!("<main>{}</main>", request.url)));
        });

        let handle = task.abort_handle();
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.push(handle.clone());
        }
        Box::new(TaskHandle(handle))
    }

    fn navigate(&self, submission: PageSubmission) {
        info!(method = %submission.method, url = submission.url, fields = ?submission.fields, "navigating");
    }

    fn abort_in_flight(&self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.drain(..).for_each(|handle| handle.abort());
        }
    }
}

async fn report(request: Request) {
    match request.clone().await {
        Ok(response) => info!(state = %request.state(), "{}", response.description()),
        Err(e) => warn!(state = %request.state(), kind = e.name(), "{e}"),
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Arc::new(
        NetworkConfig::builder()
            .location("https://app.test/")
            .csrf_token("t0ken")
            .build()
            .expect("valid network config"),
    );
    let server = SlowServer::default();

    let found = Request::new(RequestOptions::new("/users").target(".users"), Arc::clone(&config)).unwrap();
    let missing = Request::new(RequestOptions::new("/missing"), Arc::clone(&config)).unwrap();
    let aborted = Request::new(RequestOptions::new("/users/1").method("delete"), Arc::clone(&config)).unwrap();
    let timed_out =
        Request::new(RequestOptions::new("/reports").timeout(Duration::from_millis(10)), Arc::clone(&config)).unwrap();

    for request in [&found, &missing, &aborted, &timed_out] {
        request.load(&server);
    }
    aborted.abort();

    tokio::join!(report(found), report(missing), report(aborted), report(timed_out));

    let logout = Request::new(RequestOptions::new("/session").method("delete"), config).unwrap();
    logout.load_page(&server);
}
