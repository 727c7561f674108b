use std::io::{Read, Write};
#[cfg(unix)]
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;

const NAME_SUFFIX_LEN: usize = 20;
const ACCEPT_POLL: Duration = Duration::from_millis(5);

/// Byte stream to a connected consumer.
pub trait Stream: Read + Write + Send {}

impl<T: Read + Write + Send> Stream for T {}

/// One accepted (or dialed) connection.
pub struct Connection(Box<dyn Stream>);

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Connection")
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

/// A private local listener with a randomized name, removed again on drop.
///
/// Unix domain sockets live in the temp directory; other platforms listen on loopback TCP.
#[derive(Debug)]
pub struct LocalEndpoint {
    inner: Listener,
}

#[derive(Debug)]
enum Listener {
    #[cfg(unix)]
    Unix {
        listener: std::os::unix::net::UnixListener,
        path: PathBuf,
    },
    #[cfg_attr(unix, allow(dead_code))]
    Tcp(std::net::TcpListener),
}

impl LocalEndpoint {
    /// Listen on a fresh endpoint named `prefix` plus a random lowercase suffix.
    pub fn bind(prefix: &str) -> std::io::Result<Self> {
        let name = random_name(prefix);
        #[cfg(unix)]
        {
            let path = std::env::temp_dir().join(name);
            // a stale file with the same name would make bind fail
            let _ = std::fs::remove_file(&path);
            let listener = std::os::unix::net::UnixListener::bind(&path)?;
            listener.set_nonblocking(true)?;
            tracing::debug!(path = %path.display(), "endpoint listening");
            Ok(Self {
                inner: Listener::Unix { listener, path },
            })
        }
        #[cfg(not(unix))]
        {
            let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
            listener.set_nonblocking(true)?;
            tracing::debug!(name, addr = ?listener.local_addr(), "endpoint listening");
            Ok(Self {
                inner: Listener::Tcp(listener),
            })
        }
    }

    /// Address in the form ffmpeg accepts as an input url.
    pub fn url(&self) -> String {
        match &self.inner {
            #[cfg(unix)]
            Listener::Unix { path, .. } => format!("unix:{}", path.display()),
            Listener::Tcp(listener) => match listener.local_addr() {
                Ok(addr) => format!("tcp://{addr}"),
                Err(_) => "tcp://127.0.0.1:0".to_owned(),
            },
        }
    }

    /// Wait for one consumer, polling `abort`. `Ok(None)` means aborted before anyone connected.
    pub fn accept(&self, abort: &AtomicBool) -> std::io::Result<Option<Connection>> {
        loop {
            let accepted = match &self.inner {
                #[cfg(unix)]
                Listener::Unix { listener, .. } => listener.accept().and_then(|(s, _)| {
                    s.set_nonblocking(false)?;
                    Ok(Connection(Box::new(s)))
                }),
                Listener::Tcp(listener) => listener.accept().and_then(|(s, _)| {
                    s.set_nonblocking(false)?;
                    s.set_nodelay(true)?;
                    Ok(Connection(Box::new(s)))
                }),
            };
            match accepted {
                Ok(conn) => return Ok(Some(conn)),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if abort.load(Ordering::Acquire) {
                        return Ok(None);
                    }
                    std::thread::sleep(ACCEPT_POLL);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

impl Drop for LocalEndpoint {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Listener::Unix { path, .. } = &self.inner
            && let Err(e) = std::fs::remove_file(path)
        {
            tracing::debug!(path = %path.display(), error = %e, "endpoint cleanup failed");
        }
    }
}

/// Dial an endpoint by the url returned from [`LocalEndpoint::url`].
pub fn connect(url: &str) -> std::io::Result<Connection> {
    #[cfg(unix)]
    if let Some(path) = url.strip_prefix("unix:") {
        let stream = std::os::unix::net::UnixStream::connect(path)?;
        return Ok(Connection(Box::new(stream)));
    }
    if let Some(addr) = url.strip_prefix("tcp://") {
        let stream = std::net::TcpStream::connect(addr)?;
        return Ok(Connection(Box::new(stream)));
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("unsupported endpoint url '{url}'"),
    ))
}

fn random_name(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let mut name = String::with_capacity(prefix.len() + NAME_SUFFIX_LEN);
    name.push_str(prefix);
    name.extend((0..NAME_SUFFIX_LEN).map(|_| char::from(rng.gen_range(b'a'..=b'z'))));
    name
}
