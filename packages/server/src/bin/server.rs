//! Real-time conversation hub server for the Shoudan marketplace chat.
//!
//! Tracks which participants are connected to which conversations and fans
//! out message, read-receipt, typing, reaction, and presence events.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin shoudan-server
//! cargo run --bin shoudan-server -- --host 0.0.0.0 --port 3000 \
//!     --seed conv-1:buyer-1:seller-1
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use shoudan_server::{
    config::HubConfig,
    domain::{ConversationId, ConversationParticipants, UserId},
    infrastructure::{
        pusher::WebSocketEventPusher,
        registry::{InMemoryConnectionRegistry, InMemoryMembershipIndex},
        repository::{InMemoryConversationStore, InMemoryTypingStore},
    },
    ui::{Server, state::AppState},
    usecase::{
        AuthenticateUseCase, DisconnectUseCase, JoinConversationUseCase,
        LeaveConversationUseCase, NotifyConversationUseCase, ReapStaleConnectionsUseCase,
        SetTypingUseCase,
    },
};
use shoudan_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Real-time conversation hub for the Shoudan marketplace chat", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Seconds a connection may stay silent before the liveness sweep evicts it
    #[arg(long, default_value = "300")]
    heartbeat_timeout_secs: u64,

    /// Period of the liveness and typing-purge sweeps, in seconds
    #[arg(long, default_value = "60")]
    sweep_interval_secs: u64,

    /// Seed conversations for local runs (repeatable).
    /// In production the conversation store is backed by the marketplace
    /// database instead.
    #[arg(long = "seed", value_name = "CONVERSATION:BUYER:SELLER")]
    seeds: Vec<String>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();
    let config = HubConfig {
        heartbeat_timeout: Duration::from_secs(args.heartbeat_timeout_secs),
        sweep_interval: Duration::from_secs(args.sweep_interval_secs),
    };

    // Initialize dependencies in order:
    // 1. Registry & membership index (shared in-memory state)
    // 2. Persistence collaborators (conversation store, typing mirror)
    // 3. EventPusher
    // 4. UseCases
    // 5. AppState & Server

    // 1. Create the connection registry and room membership index
    let registry = Arc::new(InMemoryConnectionRegistry::new());
    let membership = Arc::new(InMemoryMembershipIndex::new());

    // 2. Create the persistence collaborators (in-memory implementations)
    let conversation_store = Arc::new(InMemoryConversationStore::new());
    seed_conversations(&conversation_store, &args.seeds).await;
    let typing_store = Arc::new(InMemoryTypingStore::new(Arc::new(SystemClock)));

    // 3. Create the EventPusher (WebSocket implementation)
    let pusher = Arc::new(WebSocketEventPusher::new(registry.clone()));

    // 4. Create UseCases
    let authenticate_usecase = Arc::new(AuthenticateUseCase::new(registry.clone()));
    let join_conversation_usecase = Arc::new(JoinConversationUseCase::new(
        conversation_store.clone(),
        membership.clone(),
        pusher.clone(),
    ));
    let leave_conversation_usecase = Arc::new(LeaveConversationUseCase::new(
        membership.clone(),
        typing_store.clone(),
        pusher.clone(),
    ));
    let set_typing_usecase = Arc::new(SetTypingUseCase::new(
        typing_store.clone(),
        membership.clone(),
        pusher.clone(),
    ));
    let notify_conversation_usecase = Arc::new(NotifyConversationUseCase::new(
        membership.clone(),
        pusher.clone(),
    ));
    let disconnect_usecase = Arc::new(DisconnectUseCase::new(registry.clone()));
    let reap_usecase = Arc::new(ReapStaleConnectionsUseCase::new(registry.clone()));

    // 5. Create AppState and run the server
    let app_state = Arc::new(AppState {
        authenticate_usecase,
        join_conversation_usecase,
        leave_conversation_usecase,
        set_typing_usecase,
        notify_conversation_usecase,
        disconnect_usecase,
        registry: registry.clone(),
        membership: membership.clone(),
    });

    let server = Server::new(app_state, reap_usecase, config);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Register `--seed` conversations into the in-memory store.
async fn seed_conversations(store: &InMemoryConversationStore, seeds: &[String]) {
    for seed in seeds {
        let parts: Vec<&str> = seed.splitn(3, ':').collect();
        match parts.as_slice() {
            [conversation, buyer, seller] => {
                match (
                    ConversationId::new(conversation.to_string()),
                    UserId::new(buyer.to_string()),
                    UserId::new(seller.to_string()),
                ) {
                    (Ok(conversation_id), Ok(buyer_id), Ok(seller_id)) => {
                        tracing::info!(
                            "Seeded conversation '{}' (buyer '{}', seller '{}')",
                            conversation_id.as_str(),
                            buyer_id.as_str(),
                            seller_id.as_str()
                        );
                        store
                            .insert(
                                conversation_id,
                                ConversationParticipants::new(buyer_id, seller_id),
                            )
                            .await;
                    }
                    _ => {
                        tracing::warn!("Ignoring invalid --seed value: '{}'", seed);
                    }
                }
            }
            _ => {
                tracing::warn!(
                    "Ignoring malformed --seed value '{}' (expected CONVERSATION:BUYER:SELLER)",
                    seed
                );
            }
        }
    }
}
