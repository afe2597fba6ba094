/// TCP accept loop
///
/// Each accepted connection gets its own OS thread running a [`Connection`]
/// until the peer disconnects. Workers share only the handler and are
/// detached: shutdown never waits for them.

use std::sync::Arc;
use std::thread;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::connection::{Connection, MessageHandler};
use crate::error::Result;

/// Accept connections on `listener` forever
///
/// Returns only when accepting fails. Errors on a single connection are
/// logged and never stop the loop.
pub async fn serve<H>(listener: TcpListener, handler: Arc<H>) -> Result<()>
where
    H: MessageHandler + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "🌐 Listening for HTTP connections");
    }

    let mut next_id: u64 = 0;
    loop {
        let (stream, peer) = listener.accept().await?;
        next_id += 1;
        let id = next_id;

        // Workers block on their socket; hand them a blocking std stream
        let stream = stream.into_std()?;
        stream.set_nonblocking(false)?;

        let handler = Arc::clone(&handler);
        let spawned = thread::Builder::new()
            .name(format!("imgfs-conn-{}", id))
            .spawn(move || {
                debug!(connection = id, %peer, "Connection accepted");
                let mut connection = Connection::new(id, stream);
                match connection.run(handler.as_ref()) {
                    Ok(()) => debug!(connection = id, "Connection closed by peer"),
                    Err(err) => warn!(connection = id, %peer, error = %err, "Connection closed with error"),
                }
            });
        if let Err(err) = spawned {
            warn!(connection = id, %peer, error = %err, "Failed to start connection worker");
        }
    }
}
