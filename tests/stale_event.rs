//! S4: closing connections abruptly, while the dispatch thread may still
//! observe events for their fds, never panics the dispatch thread and
//! never wedges the manager for later connections (`unsetConn` is
//! idempotent and fd removal tolerates already-unregistered fds).

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use blocktcp::Listener;

#[test]
fn abrupt_close_does_not_panic_or_wedge_the_manager() {
    let _ = env_logger::try_init();
    let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr();

    let server = thread::spawn(move || {
        for _ in 0..20 {
            let mut conn = listener.accept().unwrap();
            // Read whatever arrives (may be nothing if the peer already
            // vanished), then let `Connection::drop` tear the fd down.
            let mut buf = [0u8; 64];
            let _ = conn.read(&mut buf);
        }
        // One final connection, proving the manager still accepts and
        // services new fds after the earlier aborts.
        let mut conn = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        conn.read_exact(&mut buf).unwrap();
        conn.write_all(&buf).unwrap();
    });

    for _ in 0..20 {
        let client = TcpStream::connect(addr).unwrap();
        // Drop immediately: races the manager's read/write phases against
        // teardown, and may leave a stale event queued for this fd.
        drop(client);
        thread::sleep(Duration::from_millis(2));
    }

    let mut last_client = TcpStream::connect(addr).unwrap();
    last_client.write_all(b"still").unwrap();
    let mut reply = [0u8; 5];
    last_client.read_exact(&mut reply).unwrap();
    assert_eq!(&reply, b"still");

    server.join().unwrap();
}
