use std::thread;

/// A request the stub received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub api_version: Option<String>,
    pub body: String,
}

/// Local HTTP server answering a fixed script of `(status, body)` responses,
/// one per request, in order.
pub struct GithubStub {
    pub base_url: String,
    handle: thread::JoinHandle<Vec<Recorded>>,
}

impl GithubStub {
    pub fn spawn(script: Vec<(u16, String)>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start github stub server");
        let base_url = format!("http://{}", server.server_addr());

        let handle = thread::spawn(move || {
            let mut recorded = Vec::new();
            for (status, body) in script {
                let mut request = server.recv().expect("receive request");

                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv(name))
                        .map(|h| h.value.as_str().to_owned())
                };
                let authorization = header("Authorization");
                let api_version = header("X-GitHub-Api-Version");

                let mut request_body = String::new();
                request
                    .as_reader()
                    .read_to_string(&mut request_body)
                    .expect("read request body");

                recorded.push(Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_owned(),
                    authorization,
                    api_version,
                    body: request_body,
                });

                request
                    .respond(tiny_http::Response::from_string(body).with_status_code(status))
                    .expect("send stub response");
            }
            recorded
        });

        Self { base_url, handle }
    }

    /// Wait for every scripted request and return what was received.
    pub fn finish(self) -> Vec<Recorded> {
        self.handle.join().expect("github stub thread")
    }
}
