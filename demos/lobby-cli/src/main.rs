use std::sync::Arc;

use spyfall_client::prelude::*;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Create { username: String },
    Join { game_id: String, username: String },
}

const USAGE: &str = "usage: lobby-cli create <username> | lobby-cli join <game-id> <username>";

fn parse_args(args: &[String]) -> Result<Command, String> {
    match args {
        [cmd, username] if cmd == "create" => Ok(Command::Create {
            username: username.clone(),
        }),
        [cmd, game_id, username] if cmd == "join" => Ok(Command::Join {
            game_id: game_id.clone(),
            username: username.clone(),
        }),
        _ => Err(USAGE.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional; API_URL may come from the shell instead.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let client = ClientBuilder::new()
        .config(ClientConfig::from_env())
        .build(WebSocketConnector);

    let store = Arc::new(Store::new());
    bind_store(&client, Arc::clone(&store));
    client.subscribe(message_type::JOIN_GAME, |message: &WireMessage| {
        if let Ok(Reply::Accepted(joined)) = message.join_reply() {
            tracing::info!(game = %joined.game_id, user = %joined.username, "joined game");
        }
    });

    let mut events = client.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ClientEvent::Rejected { msg_type, error } => {
                    tracing::warn!(%msg_type, code = %error.code, "server refused request");
                }
                ClientEvent::Closed => tracing::warn!("connection to lobby closed"),
                other => tracing::debug!(event = ?other, "client event"),
            }
        }
    });

    client.open_configured().await?;
    match command {
        Command::Create { username } => client.create_game(&username).await?,
        Command::Join { game_id, username } => client.join_game(game_id, &username).await?,
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!(state = ?store.snapshot(), "shutting down");
    client.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_create() {
        assert_eq!(
            parse_args(&args(&["create", "bob"])),
            Ok(Command::Create {
                username: "bob".into()
            })
        );
    }

    #[test]
    fn test_parse_join() {
        assert_eq!(
            parse_args(&args(&["join", "abc123", "alice"])),
            Ok(Command::Join {
                game_id: "abc123".into(),
                username: "alice".into()
            })
        );
    }

    #[test]
    fn test_parse_rejects_anything_else() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["join", "abc123"])).is_err());
        assert!(parse_args(&args(&["start", "bob"])).is_err());
    }
}
