//! Echo Pair
//!
//! Opens a shared memory channel, runs an echoer on a second thread and
//! sends a few messages through it.

use rendezvous_ipc::{echo, Endpoint, ShmMedium};
use std::thread;

fn main() -> rendezvous_ipc::Result<()> {
    let medium = ShmMedium::create(256)?;
    println!("[Demo] Created segment {}", medium.name());

    let mut echoer = Endpoint::attach(ShmMedium::attach(medium.name())?, 2)?;
    let mut requester = Endpoint::create(medium, 1)?;

    let peer = thread::spawn(move || echo(&mut echoer));

    let mut buf = [0u8; 256];
    for msg in ["ping", "hello", "rendezvous"] {
        requester.write_bytes(msg.as_bytes())?;
        let len = requester.read_bytes(&mut buf)?;
        println!("[Demo] Sent {:?}, got back {:?}", msg, String::from_utf8_lossy(&buf[..len]));
    }

    requester.close()?;
    match peer.join() {
        Ok(result) => println!("[Demo] Echoer handled {} messages", result?),
        Err(_) => eprintln!("[Demo] Echoer panicked"),
    }
    Ok(())
}
