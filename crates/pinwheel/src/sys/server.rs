use crate::events::AppEvent;
use async_channel::Sender;
use spinctl::protocol::Command;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;

/// Forwards one line to the wheel. Returns `false` once the wheel is gone.
async fn dispatch_line(tx: &Sender<AppEvent>, line: &str) -> bool {
    if line.trim().is_empty() {
        return true;
    }
    match Command::parse_line(line) {
        Ok(command) => tx.send(AppEvent::Command(command)).await.is_ok(),
        Err(e) => {
            log::warn!("Ignoring control line {:?}: {}", line, e);
            true
        }
    }
}

fn bind(socket_path: &Path) -> std::io::Result<UnixListener> {
    // Cleanup old socket if it exists
    if fs_err::metadata(socket_path).is_ok() {
        let _ = fs_err::remove_file(socket_path);
    }
    if let Some(parent) = socket_path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    UnixListener::bind(socket_path)
}

pub async fn run_server(tx: Sender<AppEvent>, socket_path: PathBuf) {
    let listener = match bind(&socket_path) {
        Ok(l) => l,
        Err(e) => {
            log::error!("Failed to bind unix socket {}: {}", socket_path.display(), e);
            return;
        }
    };
    log::info!("Listening on {}", socket_path.display());

    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let reader = BufReader::new(&mut stream);
                    let mut lines = reader.lines();

                    while let Ok(Some(line)) = lines.next_line().await {
                        if !dispatch_line(&tx, &line).await {
                            break;
                        }
                    }
                });
            }
            Err(e) => {
                log::error!("Failed to accept connection: {}", e);
            }
        }
    }
}
