//! S5: multiple listeners on distinct ports accept concurrently, and no
//! bytes cross between connections.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;

use blocktcp::Listener;

const CONNS_PER_LISTENER: usize = 100;

fn run_listener(tag: u8) -> thread::JoinHandle<()> {
    let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr();

    let server = thread::spawn(move || {
        let mut handles = Vec::with_capacity(CONNS_PER_LISTENER);
        for _ in 0..CONNS_PER_LISTENER {
            let mut conn = listener.accept().unwrap();
            handles.push(thread::spawn(move || {
                let mut buf = [0u8; 16];
                conn.read_exact(&mut buf).unwrap();
                conn.write_all(&buf).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    });

    thread::spawn(move || {
        let mut handles = Vec::with_capacity(CONNS_PER_LISTENER);
        for i in 0..CONNS_PER_LISTENER {
            handles.push(thread::spawn(move || {
                let mut client = TcpStream::connect(addr).unwrap();
                // Tag each payload with the listener and the connection
                // index so a cross-talk bug (wrong bytes on wrong socket)
                // is detectable.
                let mut payload = [0u8; 16];
                payload[0] = tag;
                payload[1..3].copy_from_slice(&(i as u16).to_be_bytes());
                client.write_all(&payload).unwrap();
                let mut reply = [0u8; 16];
                client.read_exact(&mut reply).unwrap();
                assert_eq!(reply, payload);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        server.join().unwrap();
    })
}

#[test]
fn two_listeners_handle_concurrent_connections_without_cross_talk() {
    let _ = env_logger::try_init();
    let a = run_listener(0xAA);
    let b = run_listener(0xBB);
    a.join().unwrap();
    b.join().unwrap();
}
