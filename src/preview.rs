//! A minimal live-preview sink (spec.md §6.2, §4.9 [AMBIENT]). After each
//! finished iteration the render driver ([`crate::renderer::render`]) can
//! forward one progress line to an external monitor. Grounded in the
//! teacher's OpenGL texture preview (`pt_renderer::PTRenderer::render`,
//! which re-uploads the traced image to a GL texture after every batch of
//! worker results lands) but reworked as a line-oriented protocol over
//! `std::net::TcpStream`, since this crate owns no windowing surface of its
//! own (spec.md §1 Non-goals) and §6.2 only asks for a "name/update message
//! to a local TCP sink".

use std::fs::File;
use std::io::{self, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use crate::frame_buffer::FrameBuffer;

/// Receives one line of monitoring output per iteration. What a collaborator
/// does with it (log it, forward it to a GUI, ignore it) is outside this
/// crate's concern.
pub trait PreviewSink: Send {
    /// Sent once, before the first iteration, announcing the render.
    fn send_name(&mut self, name: &str) -> io::Result<()>;

    /// Sent once per finished iteration (spec.md §4.9).
    fn send_update(&mut self, iteration: u32, elapsed: Duration, frame: &FrameBuffer) -> io::Result<()>;
}

fn mean_luma(frame: &FrameBuffer) -> f64 {
    let mut total = 0.0;
    let mut count = 0u64;
    for y in 0..frame.height() {
        for x in 0..frame.width() {
            total += frame.mean((x, y)).luma();
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

fn write_update<W: Write>(mut w: W, iteration: u32, elapsed: Duration, frame: &FrameBuffer) -> io::Result<()> {
    writeln!(w, "UPDATE {} {} {} {:.3} {:.6}", iteration, frame.width(), frame.height(), elapsed.as_secs_f64(), mean_luma(frame))
}

/// Writes the line protocol to a TCP connection. The caller owns the
/// connection's lifetime; a write failure (e.g. the peer disconnected) is
/// returned rather than panicking the render loop.
pub struct TcpPreviewSink {
    stream: TcpStream,
}

impl TcpPreviewSink {
    pub fn connect(addr: &str) -> io::Result<Self> {
        Ok(Self { stream: TcpStream::connect(addr)? })
    }
}

impl PreviewSink for TcpPreviewSink {
    fn send_name(&mut self, name: &str) -> io::Result<()> {
        writeln!(self.stream, "NAME {}", name)
    }

    fn send_update(&mut self, iteration: u32, elapsed: Duration, frame: &FrameBuffer) -> io::Result<()> {
        write_update(&mut self.stream, iteration, elapsed, frame)
    }
}

/// Same line protocol, appended to a local file. Useful for tests and for
/// offline inspection without standing up a listener.
pub struct FilePreviewSink {
    file: File,
}

impl FilePreviewSink {
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self { file: File::create(path)? })
    }
}

impl PreviewSink for FilePreviewSink {
    fn send_name(&mut self, name: &str) -> io::Result<()> {
        writeln!(self.file, "NAME {}", name)
    }

    fn send_update(&mut self, iteration: u32, elapsed: Duration, frame: &FrameBuffer) -> io::Result<()> {
        write_update(&mut self.file, iteration, elapsed, frame)
    }
}
