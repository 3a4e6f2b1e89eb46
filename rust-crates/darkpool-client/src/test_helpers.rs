use crate::{
    config::ClientConfig,
    transactions::TransitionCall,
    types::{
        Address,
        TransactionId,
    },
    wallet::{
        ProviderError,
        WalletProvider,
    },
};
use actix_web::{
    App,
    HttpRequest,
    HttpResponse,
    HttpServer,
    dev::ServerHandle,
    http::StatusCode,
    web,
};
use std::{
    collections::HashMap,
    net::TcpListener,
    sync::{
        Arc,
        Mutex,
        atomic::{
            AtomicBool,
            AtomicUsize,
            Ordering,
        },
    },
    thread::JoinHandle,
};

pub const TEST_ADDRESS: &str =
    "aleo1rhgdu77hgyqd3xjj8ucu3jj9r2krwz6mnzyd80gncr5fxcwlh5rsvzp9px";

struct Routes {
    table: HashMap<String, (u16, String)>,
    requests: Mutex<Vec<String>>,
}

/// In-process stand-in for an Aleo node's REST API. Unrouted paths answer 404.
pub struct StubNode {
    base_url: String,
    routes: Arc<Routes>,
    server_handle: ServerHandle,
    server_thread: Option<JoinHandle<()>>,
}

impl StubNode {
    pub async fn start(routes: Vec<(String, u16, String)>) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let routes = Arc::new(Routes {
            table: routes
                .into_iter()
                .map(|(path, status, body)| (path, (status, body)))
                .collect(),
            requests: Mutex::new(Vec::new()),
        });

        let server_routes = web::Data::from(routes.clone());
        let server = HttpServer::new(move || {
            App::new()
                .app_data(server_routes.clone())
                .default_service(web::to(answer))
        })
        .workers(1)
        .disable_signals()
        .shutdown_timeout(1)
        .listen(listener)
        .unwrap()
        .run();

        let server_handle = server.handle();
        let server_thread = std::thread::spawn(move || {
            let sys = actix_web::rt::System::new();
            let _ = sys.block_on(server);
        });

        Self {
            base_url,
            routes,
            server_handle,
            server_thread: Some(server_thread),
        }
    }

    /// Testnet config for the default program, pointed at this stub.
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            rpc_url: self.base_url.clone(),
            ..ClientConfig::default()
        }
    }

    /// Every request seen so far, path plus query string.
    pub fn requests(&self) -> Vec<String> {
        self.routes.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests().iter().filter(|seen| *seen == path).count()
    }
}

impl Drop for StubNode {
    fn drop(&mut self) {
        let _ = self.server_handle.stop(false);
        if let Some(thread) = self.server_thread.take() {
            let _ = thread.join();
        }
    }
}

async fn answer(req: HttpRequest, routes: web::Data<Routes>) -> HttpResponse {
    routes.requests.lock().unwrap().push(req.uri().to_string());

    let Some((status, body)) = routes.table.get(req.path()) else {
        return HttpResponse::NotFound().body("Not Found");
    };
    let status =
        StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status)
        .content_type("application/json")
        .body(body.clone())
}

/// An address nothing listens on.
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[derive(Clone, Debug)]
pub enum Reply<T> {
    Ok(T),
    Err(ProviderError),
    /// Never resolves.
    Pending,
}

impl<T: Clone> Reply<T> {
    async fn resolve(&self) -> Result<T, ProviderError> {
        match self {
            Reply::Ok(value) => Ok(value.clone()),
            Reply::Err(error) => Err(error.clone()),
            Reply::Pending => std::future::pending().await,
        }
    }
}

struct FakeState {
    connect: Mutex<Reply<Address>>,
    transaction: Mutex<Reply<TransactionId>>,
    requests: Mutex<Vec<TransitionCall>>,
    ready: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

/// Scripted wallet provider. Clones share their script and call log.
#[derive(Clone)]
pub struct FakeProvider {
    name: String,
    state: Arc<FakeState>,
}

impl FakeProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            state: Arc::new(FakeState {
                connect: Mutex::new(Reply::Ok(TEST_ADDRESS.parse().unwrap())),
                transaction: Mutex::new(Reply::Ok(TransactionId::new(
                    "at1qyqszqgpqyqszqgpqyqszqgpqyqszqgpqyqszqgpqyqszqgpqyqsxf4q2k",
                ))),
                requests: Mutex::new(Vec::new()),
                ready: AtomicBool::new(true),
                connects: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
            }),
        }
    }

    pub fn on_connect(&self, reply: Reply<Address>) {
        *self.state.connect.lock().unwrap() = reply;
    }

    /// Whether the wallet reports itself installed and unlocked.
    pub fn set_ready(&self, ready: bool) {
        self.state.ready.store(ready, Ordering::SeqCst);
    }

    pub fn on_transaction(&self, reply: Reply<TransactionId>) {
        *self.state.transaction.lock().unwrap() = reply;
    }

    pub fn requests(&self) -> Vec<TransitionCall> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }
}

impl WalletProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn ready(&self) -> bool {
        self.state.ready.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<Address, ProviderError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let reply = self.state.connect.lock().unwrap().clone();
        reply.resolve().await
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn request_transaction(
        &self,
        call: &TransitionCall,
    ) -> Result<TransactionId, ProviderError> {
        self.state.requests.lock().unwrap().push(call.clone());
        let reply = self.state.transaction.lock().unwrap().clone();
        reply.resolve().await
    }
}
