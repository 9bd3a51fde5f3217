//! A `read` parked with no deadline must return `Ok(0)` once the peer
//! closes its write half, rather than blocking forever: teardown has to
//! wake any thread waiting on the connection's inbound signal.

use std::io::Read;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use blocktcp::Listener;

#[test]
fn blocked_read_returns_eof_after_peer_closes() {
    let _ = env_logger::try_init();

    let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr();

    let server = thread::spawn(move || {
        let mut conn = listener.accept().unwrap();
        let mut buf = [0u8; 16];
        conn.read(&mut buf)
    });

    let client = TcpStream::connect(addr).unwrap();
    // Give the manager a moment to register the accepted fd before closing
    // it out from under a parked read.
    thread::sleep(Duration::from_millis(20));
    drop(client);

    let result = server
        .join()
        .expect("server thread must not hang or panic");
    assert_eq!(result.unwrap(), 0);
}
