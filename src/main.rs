use fgame::config::ServerConfig;
use fgame::game::questions::QuestionDeck;
use fgame::{routes, services, state};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env().expect("invalid server config");

    let questions = match &config.questions_file {
        Some(path) => match QuestionDeck::from_file(path) {
            Ok(deck) => {
                tracing::info!(path = %path.display(), count = deck.len(), "question deck loaded");
                deck
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "question file unusable: using built-in deck");
                QuestionDeck::builtin()
            }
        },
        None => QuestionDeck::builtin(),
    };

    let addr = config.addr;
    let state = state::AppState::new(config, questions);

    // Spawn background housekeeping tasks.
    let _gc = services::room::spawn_room_gc(state.clone());
    let _status = services::room::spawn_status_broadcaster(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "fgame listening");
    routes::serve(listener, state).await.expect("server failed");
}
