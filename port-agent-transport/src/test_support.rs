//! Loopback peers for transport tests

use std::net::TcpListener;
use std::thread;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Start a TCP echo server for a single client
///
/// Every chunk received is written back after `delay`. The server runs on a
/// current-thread runtime on its own thread and exits when the client goes
/// away.
///
/// # Returns
/// The loopback port the server is bound to.
pub(crate) fn spawn_echo_peer(delay: Duration) -> u16 {
    let std_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = std_listener.local_addr().unwrap().port();
    std_listener.set_nonblocking(true).unwrap();

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };

            let mut buf = [0u8; 4096];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        tokio::time::sleep(delay).await;
                        if stream.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    });

    port
}

/// A loopback port with nothing listening on it
pub(crate) fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
