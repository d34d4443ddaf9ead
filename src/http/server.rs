use tokio::net::TcpListener;
use tracing::{error, info};

use super::handler::handle_client;
use crate::config::manager::RoutesHandle;

pub async fn run(
    address: &str,
    routes: RoutesHandle,
    cors: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(address).await?;
    info!("Server listening on {}", address);
    serve(listener, routes, cors).await
}

/// Accept loop over an already bound listener.
pub async fn serve(
    listener: TcpListener,
    routes: RoutesHandle,
    cors: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let (stream, _) = listener.accept().await?;
        let snapshot = match routes.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, snapshot, cors).await {
                error!("Error handling client: {}", e);
            }
        });
    }
}

