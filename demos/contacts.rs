//! Contact-management backend wired from courier parts.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example contacts
//!
//! Try:
//!   TOKEN=$(curl -s -X POST http://localhost:3000/auth/login \
//!        -H 'content-type: application/json' \
//!        -d '{"email":"alice@example.com","password":"secret"}' | jq -r .token)
//!   curl -X POST http://localhost:3000/contacts \
//!        -H "authorization: Bearer $TOKEN" \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"Bob","email":"bob@example.com"}'
//!   curl http://localhost:3000/contacts -H "authorization: Bearer $TOKEN"

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use courier::auth::{BearerAuth, Identity};
use courier::broker::MessageBroker;
use courier::jwt::JwtTokenService;
use courier::memory::MemoryTransport;
use courier::pubsub::DurablePubSub;
use courier::{Method, Request, Response, Router, Server, Status, health};

/// In-memory contact store standing in for the document-store repository.
#[derive(Clone, Default)]
struct ContactRepo {
    contacts: Arc<Mutex<HashMap<String, Value>>>,
    next_id: Arc<AtomicU64>,
}

impl ContactRepo {
    fn insert(&self, mut contact: Value) -> Value {
        let id = format!("c-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        contact["id"] = json!(id);
        self.contacts.lock().unwrap().insert(id, contact.clone());
        contact
    }

    fn get(&self, id: &str) -> Option<Value> {
        self.contacts.lock().unwrap().get(id).cloned()
    }

    fn list(&self) -> Vec<Value> {
        self.contacts.lock().unwrap().values().cloned().collect()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_owned());
    let broker_url = std::env::var("BROKER_URL").unwrap_or_else(|_| "mem://local".to_owned());
    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_owned()
    });

    let tokens = Arc::new(JwtTokenService::new(jwt_secret.as_bytes(), 3600));
    let guard: courier::Chain = vec![Arc::new(BearerAuth::new(Arc::clone(&tokens) as Arc<_>))];

    let broker: Arc<dyn MessageBroker> = Arc::new(DurablePubSub::new(
        broker_url,
        Arc::new(MemoryTransport::new()) as Arc<_>,
    ));

    // Audit every contact.created event — any number of other subscribers
    // could bind here and each would get its own copy.
    broker
        .subscribe(
            "contact.created",
            Arc::new(|payload: Value| async move {
                tracing::info!(contact = %payload, "contact created");
                anyhow::Ok(())
            }) as Arc<_>,
        )
        .await?;

    let repo = ContactRepo::default();

    let login = {
        let tokens = Arc::clone(&tokens);
        move |req: Request| {
            let tokens = Arc::clone(&tokens);
            async move {
                let Some(email) = req.body()["email"].as_str() else {
                    return Ok(Response::error(Status::BadRequest, "email is required"));
                };
                // A real deployment authenticates against the customer
                // repository here; the demo trusts anyone who shows up.
                let token = tokens.issue(&Identity::new(format!("user-{email}"), email))?;
                anyhow::Ok(Response::ok(json!({ "token": token, "expiresIn": 3600 })))
            }
        }
    };

    let create_contact = {
        let (repo, broker) = (repo.clone(), Arc::clone(&broker));
        move |req: Request| {
            let (repo, broker) = (repo.clone(), Arc::clone(&broker));
            async move {
                if req.body()["name"].as_str().is_none() {
                    return Ok(Response::error(Status::BadRequest, "name is required"));
                }
                let contact = repo.insert(req.body().clone());
                broker.publish("contact.created", contact.clone()).await?;
                anyhow::Ok(Response::json(Status::Created, contact))
            }
        }
    };

    let find_contact = {
        let repo = repo.clone();
        move |req: Request| {
            let repo = repo.clone();
            async move {
                let id = req.param("id").unwrap_or_default();
                match repo.get(id) {
                    Some(contact) => anyhow::Ok(Response::ok(contact)),
                    None => Ok(Response::error(Status::NotFound, "contact not found")),
                }
            }
        }
    };

    let list_contacts = {
        let repo = repo.clone();
        move |_req: Request| {
            let repo = repo.clone();
            async move { anyhow::Ok(Response::ok(json!(repo.list()))) }
        }
    };

    let app = Router::new()
        .route(Method::Post, "/auth/login", login)?
        .route_with(Method::Post, "/contacts", create_contact, guard.clone())?
        .route_with(Method::Get, "/contacts/:id", find_contact, guard.clone())?
        .route_with(Method::Get, "/contacts", list_contacts, guard)?
        .route(Method::Get, "/healthz", health::liveness)?
        .route(Method::Get, "/readyz", health::readiness)?;

    Server::bind(&format!("0.0.0.0:{port}")).serve(app).await?;
    Ok(())
}
